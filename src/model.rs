//! Data model (`spec.md` §3). Plain types; persistence and cascade rules
//! live in the `Store` collaborator, not here.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::authz::permissions::Permission;

/// Status of an asymmetric signing key across its lifecycle
/// (`spec.md` §3, §4.3). No backward transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SigningKeyStatus {
    Creating,
    Active,
    Decommissioning,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsymSigningKey {
    pub id: String,
    pub status: SigningKeyStatus,
    /// Serialized public JWK; absent while still `Creating` and not yet
    /// activated.
    pub public_jwk: Option<serde_json::Value>,
    /// Plugin-specific private-key handle; absent until activation.
    pub private_handle: Option<Vec<u8>>,
    pub algorithm: String,
    pub plugin_type: String,
    pub created_at: u64,
    pub last_status_change: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserSession {
    pub id: String,
    pub user_id: String,
    /// `jti` of the current refresh token; rotated on each refresh.
    pub refresh_token_id: String,
    pub expiration: u64,
    pub user_agent: String,
    pub oauth_code: Option<String>,
    pub oauth_code_challenge: Option<String>,
    /// Always `S256` when present.
    pub oauth_code_challenge_method: Option<String>,
    pub oauth_code_expiration: Option<u64>,
    pub oauth_redirect_uri: Option<String>,
}

impl UserSession {
    pub fn is_expired(&self, now: u64) -> bool {
        self.expiration <= now
    }

    pub fn oauth_code_is_expired(&self, now: u64) -> bool {
        match self.oauth_code_expiration {
            Some(exp) => exp <= now,
            None => true,
        }
    }

    pub fn clear_oauth_fields(&mut self) {
        self.oauth_code = None;
        self.oauth_code_challenge = None;
        self.oauth_code_challenge_method = None;
        self.oauth_code_expiration = None;
        self.oauth_redirect_uri = None;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalIdentity {
    pub issuer: String,
    pub subject: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    pub active: bool,
    pub admin: bool,
    pub external_identity: Option<ExternalIdentity>,
    pub scim_external_id: Option<String>,
}

/// A node in the path-based namespace tree. Workspaces always have
/// `depth >= 2` (`<group-path>/<workspace-name>`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NamespaceKind {
    Group,
    Workspace,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Namespace {
    pub id: String,
    pub full_path: String,
    pub kind: NamespaceKind,
}

impl Namespace {
    pub fn depth(&self) -> usize {
        self.full_path.split('/').count()
    }

    /// The root ancestor's path (first path segment).
    pub fn root_path(&self) -> &str {
        self.full_path.split('/').next().unwrap_or(&self.full_path)
    }
}

/// A subject (user or service account) holding a role at a namespace path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NamespaceMembership {
    pub subject_ref: String,
    pub namespace_path: String,
    pub role_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub id: String,
    pub name: String,
    pub permissions: HashSet<Permission>,
}

/// Returned by every `Caller::namespace_access_policy`.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NamespaceAccessPolicy {
    pub allow_all: bool,
    pub root_namespace_ids: Vec<String>,
}

impl NamespaceAccessPolicy {
    pub fn allow_all() -> Self {
        Self { allow_all: true, root_namespace_ids: Vec::new() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub job_type: String,
    pub workspace_id: String,
    pub run_id: String,
    pub job_trn: Option<String>,
    pub properties: std::collections::HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Run {
    pub id: String,
    pub workspace_id: String,
    pub plan_id: Option<String>,
    pub apply_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VcsWorkspaceLink {
    pub id: String,
    pub workspace_id: String,
    pub provider_id: String,
    /// Compared against the `jti` of the presented token.
    pub token_nonce: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScimToken {
    pub jti: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    pub id: String,
    pub name: String,
    pub scim_external_id: Option<String>,
}
