//! The `Store` collaborator (`spec.md` §1, §6): the kernel's only view of
//! persistence. Named read/write operations only — no SQL, no schema, no
//! transaction API leaks into this trait. A production binary backs this
//! with Postgres (or whatever); tests back it with an in-memory fake.

use async_trait::async_trait;

use crate::error::Result;
use crate::model::{
    AsymSigningKey, Job, Namespace, NamespaceMembership, Role, Run, ScimToken, Team, User,
    UserSession, VcsWorkspaceLink,
};

#[async_trait]
pub trait Store: Send + Sync {
    // -- Users --------------------------------------------------------
    async fn get_user_by_id(&self, id: &str) -> Result<Option<User>>;
    async fn get_user_by_external_identity(&self, issuer: &str, subject: &str) -> Result<Option<User>>;
    async fn get_user_by_username(&self, username: &str) -> Result<Option<User>>;
    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>>;
    async fn create_user(&self, user: User) -> Result<User>;
    async fn update_user(&self, user: User) -> Result<User>;
    /// Credential-login path only (`userCredentialLoginEnabled`); `false`
    /// on any mismatch, never an error for wrong passwords.
    async fn verify_user_password(&self, user_id: &str, password: &str) -> Result<bool>;

    // -- Sessions -------------------------------------------------------
    async fn create_session(&self, session: UserSession) -> Result<UserSession>;
    async fn get_session(&self, id: &str) -> Result<Option<UserSession>>;
    async fn get_session_by_oauth_code(&self, code: &str) -> Result<Option<UserSession>>;
    async fn update_session(&self, session: UserSession) -> Result<UserSession>;
    async fn delete_session(&self, id: &str) -> Result<()>;
    async fn list_sessions_for_user(&self, user_id: &str) -> Result<Vec<UserSession>>;
    async fn count_sessions_for_user(&self, user_id: &str) -> Result<usize>;

    // -- Namespaces -------------------------------------------------------
    async fn get_group_namespace(&self, group_id: &str) -> Result<Option<Namespace>>;
    async fn get_workspace_namespace(&self, workspace_id: &str) -> Result<Option<Namespace>>;
    async fn get_namespace_by_path(&self, path: &str) -> Result<Option<Namespace>>;

    // -- Memberships ----------------------------------------------------
    /// Memberships for `subject` whose `namespace_path` is exactly one of
    /// `paths` (the ancestor chain, inclusive).
    async fn get_memberships_at_paths(
        &self,
        subject: &str,
        paths: &[String],
    ) -> Result<Vec<NamespaceMembership>>;

    /// Memberships for `subject` whose `namespace_path` starts with
    /// `root_path` (single round trip, used for inherited-resource checks).
    async fn get_memberships_under_root(
        &self,
        subject: &str,
        root_path: &str,
    ) -> Result<Vec<NamespaceMembership>>;

    /// All memberships for `subject`, used to compute root namespaces.
    async fn get_all_memberships(&self, subject: &str) -> Result<Vec<NamespaceMembership>>;

    // -- Roles ------------------------------------------------------------
    async fn get_role(&self, id: &str) -> Result<Option<Role>>;

    // -- Teams ------------------------------------------------------------
    async fn get_team_by_id(&self, id: &str) -> Result<Option<Team>>;
    async fn is_team_maintainer(&self, user_id: &str, team_id: &str) -> Result<bool>;

    // -- Signing keys -----------------------------------------------------
    async fn create_signing_key(&self, key: AsymSigningKey) -> Result<AsymSigningKey>;
    async fn update_signing_key(&self, key: AsymSigningKey) -> Result<AsymSigningKey>;
    async fn delete_signing_key(&self, id: &str) -> Result<()>;
    async fn get_active_signing_key(&self) -> Result<Option<AsymSigningKey>>;
    async fn list_signing_keys(&self) -> Result<Vec<AsymSigningKey>>;
    async fn list_creating_signing_keys_older_than(&self, age_secs: u64) -> Result<Vec<AsymSigningKey>>;
    async fn list_decommissioning_signing_keys_older_than(
        &self,
        age_secs: u64,
    ) -> Result<Vec<AsymSigningKey>>;

    // -- Jobs / Runs ------------------------------------------------------
    async fn get_job(&self, id: &str) -> Result<Option<Job>>;
    async fn get_run(&self, id: &str) -> Result<Option<Run>>;
    /// Most recent job of `job_type` for `run_id` (used by
    /// `UpdatePlan`/`UpdateApply` checks).
    async fn get_latest_job_by_type(&self, run_id: &str, job_type: &str) -> Result<Option<Job>>;

    // -- VCS / SCIM ------------------------------------------------------
    async fn get_vcs_workspace_link(&self, link_id: &str) -> Result<Option<VcsWorkspaceLink>>;
    async fn get_scim_token(&self, jti: &str) -> Result<Option<ScimToken>>;

    // -- System -----------------------------------------------------------
    async fn is_maintenance_mode(&self) -> Result<bool>;
}
