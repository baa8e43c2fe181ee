//! Shared integration-test fakes: an in-memory `Store` and `Signer`, kept
//! separate from the crate's unit tests since every integration test in
//! this directory needs the same fakes wired the same way.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use tharsis_auth::model::{
    AsymSigningKey, Job, Namespace, NamespaceMembership, Role, Run, ScimToken, SigningKeyStatus, Team, User,
    UserSession, VcsWorkspaceLink,
};
use tharsis_auth::signing::{CreatedKey, PrivateKeyHandle, PublicJwk, Signer, SigningKeyManager, SigningKeyManagerConfig};
use tharsis_auth::{AuthError, Result, Store};

pub struct FakeSigner {
    pub rotation: bool,
}

#[async_trait]
impl Signer for FakeSigner {
    fn plugin_type(&self) -> &str {
        "fake"
    }
    fn supports_key_rotation(&self) -> bool {
        self.rotation
    }
    async fn create_key(&self) -> Result<CreatedKey> {
        Ok(CreatedKey {
            public_jwk: serde_json::json!({"n": "nval", "e": "AQAB"}),
            private_handle: b"secret".to_vec(),
            algorithm: "RS256".to_string(),
        })
    }
    async fn sign(&self, _handle: &PrivateKeyHandle, payload: &[u8]) -> Result<Vec<u8>> {
        Ok(payload.to_vec())
    }
    async fn verify(&self, _jwk: &PublicJwk, payload: &[u8], signature: &[u8]) -> Result<bool> {
        Ok(payload == signature)
    }
    async fn delete_key(&self, _handle: &PrivateKeyHandle) -> Result<()> {
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeStore {
    pub users: Mutex<HashMap<String, User>>,
    pub sessions: Mutex<HashMap<String, UserSession>>,
    pub namespaces: Mutex<HashMap<String, Namespace>>,
    pub memberships: Mutex<Vec<NamespaceMembership>>,
    pub roles: Mutex<HashMap<String, Role>>,
    pub signing_keys: Mutex<HashMap<String, AsymSigningKey>>,
    pub jobs: Mutex<HashMap<String, Job>>,
    pub runs: Mutex<HashMap<String, Run>>,
}

#[async_trait]
impl Store for FakeStore {
    async fn get_user_by_id(&self, id: &str) -> Result<Option<User>> {
        Ok(self.users.lock().unwrap().get(id).cloned())
    }
    async fn get_user_by_external_identity(&self, _issuer: &str, _subject: &str) -> Result<Option<User>> {
        Ok(None)
    }
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        Ok(self.users.lock().unwrap().values().find(|u| u.username == username).cloned())
    }
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.users.lock().unwrap().values().find(|u| u.email == email).cloned())
    }
    async fn create_user(&self, user: User) -> Result<User> {
        self.users.lock().unwrap().insert(user.id.clone(), user.clone());
        Ok(user)
    }
    async fn update_user(&self, user: User) -> Result<User> {
        self.users.lock().unwrap().insert(user.id.clone(), user.clone());
        Ok(user)
    }
    async fn verify_user_password(&self, user_id: &str, password: &str) -> Result<bool> {
        Ok(self.users.lock().unwrap().contains_key(user_id) && password == "correct horse battery staple")
    }
    async fn create_session(&self, session: UserSession) -> Result<UserSession> {
        self.sessions.lock().unwrap().insert(session.id.clone(), session.clone());
        Ok(session)
    }
    async fn get_session(&self, id: &str) -> Result<Option<UserSession>> {
        Ok(self.sessions.lock().unwrap().get(id).cloned())
    }
    async fn get_session_by_oauth_code(&self, code: &str) -> Result<Option<UserSession>> {
        Ok(self.sessions.lock().unwrap().values().find(|s| s.oauth_code.as_deref() == Some(code)).cloned())
    }
    async fn update_session(&self, session: UserSession) -> Result<UserSession> {
        self.sessions.lock().unwrap().insert(session.id.clone(), session.clone());
        Ok(session)
    }
    async fn delete_session(&self, id: &str) -> Result<()> {
        self.sessions.lock().unwrap().remove(id);
        Ok(())
    }
    async fn list_sessions_for_user(&self, user_id: &str) -> Result<Vec<UserSession>> {
        Ok(self.sessions.lock().unwrap().values().filter(|s| s.user_id == user_id).cloned().collect())
    }
    async fn count_sessions_for_user(&self, user_id: &str) -> Result<usize> {
        Ok(self.sessions.lock().unwrap().values().filter(|s| s.user_id == user_id).count())
    }
    async fn get_group_namespace(&self, group_id: &str) -> Result<Option<Namespace>> {
        Ok(self.namespaces.lock().unwrap().get(group_id).cloned())
    }
    async fn get_workspace_namespace(&self, workspace_id: &str) -> Result<Option<Namespace>> {
        Ok(self.namespaces.lock().unwrap().get(workspace_id).cloned())
    }
    async fn get_namespace_by_path(&self, path: &str) -> Result<Option<Namespace>> {
        Ok(self.namespaces.lock().unwrap().values().find(|n| n.full_path == path).cloned())
    }
    async fn get_memberships_at_paths(&self, subject: &str, paths: &[String]) -> Result<Vec<NamespaceMembership>> {
        Ok(self
            .memberships
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.subject_ref == subject && paths.contains(&m.namespace_path))
            .cloned()
            .collect())
    }
    async fn get_memberships_under_root(&self, subject: &str, root_path: &str) -> Result<Vec<NamespaceMembership>> {
        Ok(self
            .memberships
            .lock()
            .unwrap()
            .iter()
            .filter(|m| {
                m.subject_ref == subject
                    && (m.namespace_path == root_path || m.namespace_path.starts_with(&format!("{root_path}/")))
            })
            .cloned()
            .collect())
    }
    async fn get_all_memberships(&self, subject: &str) -> Result<Vec<NamespaceMembership>> {
        Ok(self.memberships.lock().unwrap().iter().filter(|m| m.subject_ref == subject).cloned().collect())
    }
    async fn get_role(&self, id: &str) -> Result<Option<Role>> {
        Ok(self.roles.lock().unwrap().get(id).cloned())
    }
    async fn get_team_by_id(&self, _id: &str) -> Result<Option<Team>> {
        Ok(None)
    }
    async fn is_team_maintainer(&self, _user_id: &str, _team_id: &str) -> Result<bool> {
        Ok(false)
    }
    async fn create_signing_key(&self, key: AsymSigningKey) -> Result<AsymSigningKey> {
        self.signing_keys.lock().unwrap().insert(key.id.clone(), key.clone());
        Ok(key)
    }
    async fn update_signing_key(&self, key: AsymSigningKey) -> Result<AsymSigningKey> {
        self.signing_keys.lock().unwrap().insert(key.id.clone(), key.clone());
        Ok(key)
    }
    async fn delete_signing_key(&self, id: &str) -> Result<()> {
        self.signing_keys.lock().unwrap().remove(id);
        Ok(())
    }
    async fn get_active_signing_key(&self) -> Result<Option<AsymSigningKey>> {
        Ok(self.signing_keys.lock().unwrap().values().find(|k| k.status == SigningKeyStatus::Active).cloned())
    }
    async fn list_signing_keys(&self) -> Result<Vec<AsymSigningKey>> {
        Ok(self.signing_keys.lock().unwrap().values().cloned().collect())
    }
    async fn list_creating_signing_keys_older_than(&self, _age_secs: u64) -> Result<Vec<AsymSigningKey>> {
        Ok(self
            .signing_keys
            .lock()
            .unwrap()
            .values()
            .filter(|k| k.status == SigningKeyStatus::Creating)
            .cloned()
            .collect())
    }
    async fn list_decommissioning_signing_keys_older_than(&self, _age_secs: u64) -> Result<Vec<AsymSigningKey>> {
        Ok(self
            .signing_keys
            .lock()
            .unwrap()
            .values()
            .filter(|k| k.status == SigningKeyStatus::Decommissioning)
            .cloned()
            .collect())
    }
    async fn get_job(&self, id: &str) -> Result<Option<Job>> {
        Ok(self.jobs.lock().unwrap().get(id).cloned())
    }
    async fn get_run(&self, id: &str) -> Result<Option<Run>> {
        Ok(self.runs.lock().unwrap().get(id).cloned())
    }
    async fn get_latest_job_by_type(&self, run_id: &str, job_type: &str) -> Result<Option<Job>> {
        Ok(self.jobs.lock().unwrap().values().find(|j| j.run_id == run_id && j.job_type == job_type).cloned())
    }
    async fn get_vcs_workspace_link(&self, _id: &str) -> Result<Option<VcsWorkspaceLink>> {
        Ok(None)
    }
    async fn get_scim_token(&self, _jti: &str) -> Result<Option<ScimToken>> {
        Ok(None)
    }
    async fn is_maintenance_mode(&self) -> Result<bool> {
        Ok(false)
    }
}

pub fn membership(subject: &str, path: &str, role_id: &str) -> NamespaceMembership {
    NamespaceMembership { subject_ref: subject.to_string(), namespace_path: path.to_string(), role_id: role_id.to_string() }
}

pub async fn bootstrapped_key_manager(store: std::sync::Arc<FakeStore>) -> std::sync::Arc<SigningKeyManager> {
    let signer = std::sync::Arc::new(FakeSigner { rotation: true });
    let manager = std::sync::Arc::new(
        SigningKeyManager::new(
            store,
            signer,
            SigningKeyManagerConfig {
                issuer: "https://tharsis.example.com".to_string(),
                rotation_period: Duration::from_secs(0),
                decommission_period: Duration::from_secs(3600),
                creating_grace_period: Duration::from_secs(300),
            },
        )
        .unwrap(),
    );
    manager.bootstrap().await.unwrap();
    manager
}

#[allow(dead_code)]
pub fn assert_unauthorized_containing(result: Result<()>, needle: &str) {
    match result {
        Err(AuthError::Unauthorized(msg)) => assert!(msg.contains(needle), "expected {msg:?} to contain {needle:?}"),
        other => panic!("expected Unauthorized, got {other:?}"),
    }
}
