//! Token kinds and the private-claim namespacing contract.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Prefix every private claim is namespaced with on the wire; stripped on
/// read, added on write.
pub const PRIVATE_CLAIM_PREFIX: &str = "tharsis_";

/// Default audience for internally-minted tokens.
pub const DEFAULT_AUDIENCE: &str = "tharsis";

/// The closed set of token kinds this system mints and verifies. Tagged by
/// the mandatory `type` private claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenType {
    ServiceAccount,
    Job,
    UserSessionAccess,
    UserSessionCsrf,
    UserSessionRefresh,
    Scim,
    VcsWorkspaceLink,
    FederatedRegistry,
}

impl TokenType {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenType::ServiceAccount => "service_account",
            TokenType::Job => "job",
            TokenType::UserSessionAccess => "user_session_access",
            TokenType::UserSessionCsrf => "user_session_csrf",
            TokenType::UserSessionRefresh => "user_session_refresh",
            TokenType::Scim => "scim",
            TokenType::VcsWorkspaceLink => "vcs_workspace_link",
            TokenType::FederatedRegistry => "federated_registry",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "service_account" => TokenType::ServiceAccount,
            "job" => TokenType::Job,
            "user_session_access" => TokenType::UserSessionAccess,
            "user_session_csrf" => TokenType::UserSessionCsrf,
            "user_session_refresh" => TokenType::UserSessionRefresh,
            "scim" => TokenType::Scim,
            "vcs_workspace_link" => TokenType::VcsWorkspaceLink,
            "federated_registry" => TokenType::FederatedRegistry,
            _ => return None,
        })
    }
}

/// Input to `TokenCodec::generate`. `nbf`/`iat` are always set to "now" by
/// the codec; `iss` is always the configured issuer. Callers only specify
/// what varies per token.
#[derive(Debug, Clone)]
pub struct TokenInput {
    pub subject: String,
    pub audience: String,
    /// Absolute expiration (Unix seconds). `None` means no `exp` claim is
    /// set — only used for tokens whose caller enforces expiry elsewhere.
    pub expiration: Option<u64>,
    pub jwt_id: Option<String>,
    /// Unprefixed claim names; the codec adds `PRIVATE_CLAIM_PREFIX`.
    pub claims: HashMap<String, String>,
}

impl TokenInput {
    pub fn new(subject: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            audience: DEFAULT_AUDIENCE.to_string(),
            expiration: None,
            jwt_id: None,
            claims: HashMap::new(),
        }
    }

    pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = audience.into();
        self
    }

    pub fn with_expiration(mut self, expiration: u64) -> Self {
        self.expiration = Some(expiration);
        self
    }

    pub fn with_jwt_id(mut self, jwt_id: impl Into<String>) -> Self {
        self.jwt_id = Some(jwt_id.into());
        self
    }

    pub fn with_claim(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.claims.insert(key.into(), value.into());
        self
    }

    pub fn with_type(self, token_type: TokenType) -> Self {
        self.with_claim("type", token_type.as_str())
    }
}

/// Standard claims as they appear on the wire, plus the demangled private
/// claims (string values only — `spec.md` §4.1: non-string values are
/// dropped on read).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedToken {
    pub subject: String,
    pub issuer: String,
    pub audience: Vec<String>,
    pub issued_at: u64,
    pub not_before: u64,
    pub expiration: Option<u64>,
    pub jwt_id: Option<String>,
    pub private_claims: HashMap<String, String>,
}

impl VerifiedToken {
    pub fn claim(&self, key: &str) -> Option<&str> {
        self.private_claims.get(key).map(String::as_str)
    }

    pub fn token_type(&self) -> Option<TokenType> {
        self.claim("type").and_then(TokenType::parse)
    }
}

/// The raw JWT claim set, as serialized on the wire. Standard claims sit
/// alongside `tharsis_`-prefixed private claims, all flattened into one
/// JSON object per RFC 7519.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct RawClaims {
    pub sub: String,
    pub iss: String,
    /// `aud` may be a single string or an array on the wire; this crate
    /// always serializes a single-element-or-more array.
    pub aud: Vec<String>,
    pub iat: u64,
    pub nbf: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "jti")]
    pub jwt_id: Option<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}
