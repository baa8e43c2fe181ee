//! Signing-key fleet lifecycle and in-memory JWKS (`spec.md` §4.3,
//! "SigningKeyManager").
//!
//! Composes `TokenCodec` (claim shape) with the external `Signer` plugin
//! (actual cryptographic material) — the manager never sees raw private
//! key bytes, only the plugin's opaque handle.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use base64::Engine;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{AuthError, Result};
use crate::jwks::{DiscoveryDocument, Jwk, JwkSet};
use crate::model::{AsymSigningKey, SigningKeyStatus};
use crate::signing::plugin::Signer;
use crate::store::Store;
use crate::token::{TokenCodec, TokenInput, VerifiedToken};

fn now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

#[derive(Debug, Clone)]
pub struct SigningKeyManagerConfig {
    pub issuer: String,
    pub rotation_period: Duration,
    pub decommission_period: Duration,
    pub creating_grace_period: Duration,
}

pub struct SigningKeyManager {
    store: Arc<dyn Store>,
    signer: Arc<dyn Signer>,
    codec: TokenCodec,
    config: SigningKeyManagerConfig,
    jwks: RwLock<JwkSet>,
}

impl SigningKeyManager {
    /// Fails at startup if rotation is configured and the plugin can't
    /// rotate keys without manual intervention (`spec.md` §4.3, §7).
    pub fn new(store: Arc<dyn Store>, signer: Arc<dyn Signer>, config: SigningKeyManagerConfig) -> Result<Self> {
        if config.rotation_period > Duration::ZERO && !signer.supports_key_rotation() {
            return Err(AuthError::internal(format!(
                "signer plugin {} does not support key rotation but rotation_period is set",
                signer.plugin_type()
            )));
        }
        let codec = TokenCodec::new(config.issuer.clone());
        Ok(Self { store, signer, codec, config, jwks: RwLock::new(JwkSet::default()) })
    }

    /// Startup sweep: reap stale `Creating` rows, then create an `Active`
    /// key if none exists and nothing is currently being created.
    pub async fn bootstrap(&self) -> Result<()> {
        let stale = self
            .store
            .list_creating_signing_keys_older_than(self.config.creating_grace_period.as_secs())
            .await?;
        for key in stale {
            self.store.delete_signing_key(&key.id).await?;
        }

        if self.store.get_active_signing_key().await?.is_some() {
            self.sync_key_set().await?;
            return Ok(());
        }

        let remaining_creating =
            self.store.list_creating_signing_keys_older_than(0).await?;
        if remaining_creating.is_empty() {
            self.create_key().await?;
        }
        self.sync_key_set().await
    }

    /// Inserts a `Creating` row, asks the plugin for key material, then
    /// activates it. A crash between insert and activation leaves the row
    /// `Creating`, to be reaped by a later `bootstrap` sweep.
    async fn create_key(&self) -> Result<AsymSigningKey> {
        let created_at = now();
        let row = AsymSigningKey {
            id: Uuid::new_v4().to_string(),
            status: SigningKeyStatus::Creating,
            public_jwk: None,
            private_handle: None,
            algorithm: "RS256".to_string(),
            plugin_type: self.signer.plugin_type().to_string(),
            created_at,
            last_status_change: created_at,
        };
        let row = self.store.create_signing_key(row).await?;

        let created = self.signer.create_key().await?;
        let activated = AsymSigningKey {
            status: SigningKeyStatus::Active,
            public_jwk: Some(created.public_jwk),
            private_handle: Some(created.private_handle),
            algorithm: created.algorithm,
            last_status_change: now(),
            ..row
        };
        let activated = self.store.update_signing_key(activated).await?;
        self.sync_key_set().await?;
        Ok(activated)
    }

    /// Periodic background rotation: marks the current `Active` key
    /// `Decommissioning` and activates a fresh one.
    pub async fn rotate(&self) -> Result<()> {
        if !self.signer.supports_key_rotation() {
            return Err(AuthError::internal("signer plugin does not support key rotation"));
        }
        if let Some(active) = self.store.get_active_signing_key().await? {
            let decommissioning = AsymSigningKey {
                status: SigningKeyStatus::Decommissioning,
                last_status_change: now(),
                ..active
            };
            self.store.update_signing_key(decommissioning).await?;
        }
        self.create_key().await?;
        Ok(())
    }

    /// Periodic background GC: deletes `Decommissioning` keys past their
    /// retention window, via the plugin, then the store.
    pub async fn decommission_gc(&self) -> Result<()> {
        let stale = self
            .store
            .list_decommissioning_signing_keys_older_than(self.config.decommission_period.as_secs())
            .await?;
        for key in stale {
            if let Some(handle) = &key.private_handle {
                self.signer.delete_key(handle).await?;
            }
            self.store.delete_signing_key(&key.id).await?;
        }
        self.sync_key_set().await
    }

    /// Republishes the in-memory JWKS as the union of public keys across
    /// every row (`spec.md` §4.3 "JWKS sync").
    pub async fn sync_key_set(&self) -> Result<()> {
        let rows = self.store.list_signing_keys().await?;
        let keys = rows
            .into_iter()
            .filter_map(|row| {
                let jwk = row.public_jwk?;
                Some(Jwk {
                    kty: "RSA".to_string(),
                    kid: row.id,
                    alg: Some(row.algorithm),
                    key_use: Some("sig".to_string()),
                    n: jwk.get("n")?.as_str()?.to_string(),
                    e: jwk.get("e")?.as_str()?.to_string(),
                })
            })
            .collect();
        *self.jwks.write().await = JwkSet { keys };
        Ok(())
    }

    /// Signs `input` with the fleet's `Active` key.
    pub async fn sign(&self, input: &TokenInput) -> Result<String> {
        let active = self.store.get_active_signing_key().await?.ok_or_else(|| AuthError::internal("no active signing key"))?;
        let private_handle = active.private_handle.ok_or_else(|| AuthError::internal("active key has no private handle"))?;

        let algorithm = jsonwebtoken::Algorithm::RS256;
        let mut header = jsonwebtoken::Header::new(algorithm);
        header.kid = Some(active.id);

        let signing_input = self.codec.build_signing_input(input, &header)?;
        let signature = self.signer.sign(&private_handle, signing_input.as_bytes()).await?;
        Ok(TokenCodec::finish_signed_token(&signing_input, &signature))
    }

    /// Verifies `token` against the in-memory JWKS, dispatching by `kid`.
    /// `use_cache = false` forces a `sync_key_set` before dispatch.
    pub async fn verify(&self, token: &str, required_audience: Option<&str>, use_cache: bool) -> Result<VerifiedToken> {
        let (signing_input, signature) = TokenCodec::split_signed_token(token)?;
        let kid = header_kid(signing_input)?;

        if !use_cache {
            self.sync_key_set().await?;
        }

        let jwk = {
            let guard = self.jwks.read().await;
            guard.find(&kid).cloned()
        };
        let jwk = match jwk {
            Some(jwk) => jwk,
            None => {
                self.sync_key_set().await?;
                let guard = self.jwks.read().await;
                guard.find(&kid).cloned().ok_or_else(|| AuthError::unauthorized(format!("unknown signing key {kid}")))?
            }
        };

        let public_jwk = serde_json::json!({ "n": jwk.n, "e": jwk.e, "kty": jwk.kty });
        let valid = self.signer.verify(&public_jwk, signing_input.as_bytes(), &signature).await?;
        if !valid {
            return Err(AuthError::unauthorized("invalid token signature"));
        }

        self.codec.verify_claims(signing_input, required_audience)
    }

    pub fn issuer(&self) -> &str {
        &self.config.issuer
    }

    /// `spec.md` §4.3 `GetOpenIDConfig`.
    pub fn open_id_config(&self) -> DiscoveryDocument {
        DiscoveryDocument {
            issuer: self.config.issuer.clone(),
            jwks_uri: format!("{}/oauth/discovery/keys", self.config.issuer),
            response_types_supported: vec!["id_token".to_string()],
            subject_types_supported: Vec::new(),
            id_token_signing_alg_values_supported: vec!["RS256".to_string()],
        }
    }

    pub async fn jwk_set(&self) -> JwkSet {
        self.jwks.read().await.clone()
    }
}

fn header_kid(signing_input: &str) -> Result<String> {
    let header_b64 = signing_input.split('.').next().ok_or_else(|| AuthError::unauthorized("malformed token"))?;
    let bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(header_b64)
        .map_err(|_| AuthError::unauthorized("malformed token header"))?;
    let value: serde_json::Value =
        serde_json::from_slice(&bytes).map_err(|_| AuthError::unauthorized("malformed token header"))?;
    value
        .get("kid")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| AuthError::unauthorized("token header missing kid"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Job, Namespace, NamespaceMembership, Role, ScimToken, Team, User, UserSession, VcsWorkspaceLink, Run};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeSigner {
        rotation: bool,
    }

    #[async_trait]
    impl Signer for FakeSigner {
        fn plugin_type(&self) -> &str {
            "fake"
        }
        fn supports_key_rotation(&self) -> bool {
            self.rotation
        }
        async fn create_key(&self) -> Result<crate::signing::plugin::CreatedKey> {
            Ok(crate::signing::plugin::CreatedKey {
                public_jwk: serde_json::json!({"n": "nval", "e": "AQAB"}),
                private_handle: b"secret".to_vec(),
                algorithm: "RS256".to_string(),
            })
        }
        async fn sign(&self, _private_handle: &Vec<u8>, payload: &[u8]) -> Result<Vec<u8>> {
            Ok(payload.to_vec())
        }
        async fn verify(&self, _public_jwk: &serde_json::Value, payload: &[u8], signature: &[u8]) -> Result<bool> {
            Ok(payload == signature)
        }
        async fn delete_key(&self, _private_handle: &Vec<u8>) -> Result<()> {
            Ok(())
        }
    }

    struct FakeStore {
        keys: Mutex<HashMap<String, AsymSigningKey>>,
    }

    #[async_trait]
    impl Store for FakeStore {
        async fn get_user_by_id(&self, _id: &str) -> Result<Option<User>> {
            unimplemented!()
        }
        async fn get_user_by_external_identity(&self, _i: &str, _s: &str) -> Result<Option<User>> {
            unimplemented!()
        }
        async fn get_user_by_username(&self, _u: &str) -> Result<Option<User>> {
            unimplemented!()
        }
        async fn get_user_by_email(&self, _e: &str) -> Result<Option<User>> {
            unimplemented!()
        }
        async fn create_user(&self, _u: User) -> Result<User> {
            unimplemented!()
        }
        async fn update_user(&self, _u: User) -> Result<User> {
            unimplemented!()
        }
        async fn verify_user_password(&self, _user_id: &str, _password: &str) -> Result<bool> {
            unimplemented!()
        }
        async fn create_session(&self, _s: UserSession) -> Result<UserSession> {
            unimplemented!()
        }
        async fn get_session(&self, _id: &str) -> Result<Option<UserSession>> {
            unimplemented!()
        }
        async fn get_session_by_oauth_code(&self, _c: &str) -> Result<Option<UserSession>> {
            unimplemented!()
        }
        async fn update_session(&self, _s: UserSession) -> Result<UserSession> {
            unimplemented!()
        }
        async fn delete_session(&self, _id: &str) -> Result<()> {
            unimplemented!()
        }
        async fn list_sessions_for_user(&self, _u: &str) -> Result<Vec<UserSession>> {
            unimplemented!()
        }
        async fn count_sessions_for_user(&self, _u: &str) -> Result<usize> {
            unimplemented!()
        }
        async fn get_group_namespace(&self, _id: &str) -> Result<Option<Namespace>> {
            unimplemented!()
        }
        async fn get_workspace_namespace(&self, _id: &str) -> Result<Option<Namespace>> {
            unimplemented!()
        }
        async fn get_namespace_by_path(&self, _p: &str) -> Result<Option<Namespace>> {
            unimplemented!()
        }
        async fn get_memberships_at_paths(&self, _s: &str, _p: &[String]) -> Result<Vec<NamespaceMembership>> {
            unimplemented!()
        }
        async fn get_memberships_under_root(&self, _s: &str, _r: &str) -> Result<Vec<NamespaceMembership>> {
            unimplemented!()
        }
        async fn get_all_memberships(&self, _s: &str) -> Result<Vec<NamespaceMembership>> {
            unimplemented!()
        }
        async fn get_role(&self, _id: &str) -> Result<Option<Role>> {
            unimplemented!()
        }
        async fn get_team_by_id(&self, _id: &str) -> Result<Option<Team>> {
            unimplemented!()
        }
        async fn is_team_maintainer(&self, _u: &str, _t: &str) -> Result<bool> {
            unimplemented!()
        }
        async fn create_signing_key(&self, key: AsymSigningKey) -> Result<AsymSigningKey> {
            self.keys.lock().unwrap().insert(key.id.clone(), key.clone());
            Ok(key)
        }
        async fn update_signing_key(&self, key: AsymSigningKey) -> Result<AsymSigningKey> {
            self.keys.lock().unwrap().insert(key.id.clone(), key.clone());
            Ok(key)
        }
        async fn delete_signing_key(&self, id: &str) -> Result<()> {
            self.keys.lock().unwrap().remove(id);
            Ok(())
        }
        async fn get_active_signing_key(&self) -> Result<Option<AsymSigningKey>> {
            Ok(self.keys.lock().unwrap().values().find(|k| k.status == SigningKeyStatus::Active).cloned())
        }
        async fn list_signing_keys(&self) -> Result<Vec<AsymSigningKey>> {
            Ok(self.keys.lock().unwrap().values().cloned().collect())
        }
        async fn list_creating_signing_keys_older_than(&self, _age: u64) -> Result<Vec<AsymSigningKey>> {
            Ok(self
                .keys
                .lock()
                .unwrap()
                .values()
                .filter(|k| k.status == SigningKeyStatus::Creating)
                .cloned()
                .collect())
        }
        async fn list_decommissioning_signing_keys_older_than(&self, _age: u64) -> Result<Vec<AsymSigningKey>> {
            Ok(Vec::new())
        }
        async fn get_job(&self, _id: &str) -> Result<Option<Job>> {
            unimplemented!()
        }
        async fn get_run(&self, _id: &str) -> Result<Option<Run>> {
            unimplemented!()
        }
        async fn get_latest_job_by_type(&self, _r: &str, _t: &str) -> Result<Option<Job>> {
            unimplemented!()
        }
        async fn get_vcs_workspace_link(&self, _id: &str) -> Result<Option<VcsWorkspaceLink>> {
            unimplemented!()
        }
        async fn get_scim_token(&self, _jti: &str) -> Result<Option<ScimToken>> {
            unimplemented!()
        }
        async fn is_maintenance_mode(&self) -> Result<bool> {
            Ok(false)
        }
    }

    fn config() -> SigningKeyManagerConfig {
        SigningKeyManagerConfig {
            issuer: "https://tharsis.example.com".to_string(),
            rotation_period: Duration::from_secs(0),
            decommission_period: Duration::from_secs(3600),
            creating_grace_period: Duration::from_secs(300),
        }
    }

    #[tokio::test]
    async fn bootstrap_creates_an_active_key_when_none_exists() {
        let store = Arc::new(FakeStore { keys: Mutex::new(HashMap::new()) });
        let signer = Arc::new(FakeSigner { rotation: false });
        let manager = SigningKeyManager::new(store.clone(), signer, config()).unwrap();

        manager.bootstrap().await.unwrap();

        let active = store.get_active_signing_key().await.unwrap();
        assert!(active.is_some());
        assert_eq!(manager.jwk_set().await.keys.len(), 1);
    }

    #[tokio::test]
    async fn sign_then_verify_round_trips() {
        let store = Arc::new(FakeStore { keys: Mutex::new(HashMap::new()) });
        let signer = Arc::new(FakeSigner { rotation: false });
        let manager = SigningKeyManager::new(store, signer, config()).unwrap();
        manager.bootstrap().await.unwrap();

        let input = TokenInput::new("u1").with_expiration(now() + 3600);
        let token = manager.sign(&input).await.unwrap();
        let verified = manager.verify(&token, None, true).await.unwrap();
        assert_eq!(verified.subject, "u1");
    }

    #[tokio::test]
    async fn rotation_requires_plugin_support() {
        let store = Arc::new(FakeStore { keys: Mutex::new(HashMap::new()) });
        let signer = Arc::new(FakeSigner { rotation: false });
        let mut cfg = config();
        cfg.rotation_period = Duration::from_secs(60);
        assert!(SigningKeyManager::new(store, signer, cfg).is_err());
    }
}
