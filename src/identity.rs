//! `IdentityProvider` (`spec.md` §2, "IdentityProvider"): a typed facade
//! over `TokenCodec` + `SigningKeyManager` for minting and verifying
//! tokens issued by this system. Every internally-minted `type` in the
//! closed set gets its own constructor so call sites never hand-assemble
//! a `TokenInput` with the wrong private claims.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::Result;
use crate::model::Job;
use crate::signing::SigningKeyManager;
use crate::token::{TokenInput, TokenType, VerifiedToken};

fn now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

fn expires_in(ttl: Duration) -> u64 {
    now() + ttl.as_secs()
}

/// Mints and verifies every token `type` this system issues itself
/// (`spec.md` §3 closed `type` claim set minus `federated_registry`,
/// which this system only ever *verifies*, issued by a peer instance).
pub struct IdentityProvider {
    key_manager: Arc<SigningKeyManager>,
}

impl IdentityProvider {
    pub fn new(key_manager: Arc<SigningKeyManager>) -> Self {
        Self { key_manager }
    }

    pub fn issuer(&self) -> &str {
        self.key_manager.issuer()
    }

    pub async fn mint_service_account_token(
        &self,
        service_account_id: &str,
        service_account_path: &str,
        ttl: Duration,
    ) -> Result<String> {
        let input = TokenInput::new(service_account_id)
            .with_expiration(expires_in(ttl))
            .with_type(TokenType::ServiceAccount)
            .with_claim("service_account_path", service_account_path);
        self.key_manager.sign(&input).await
    }

    pub async fn mint_job_token(&self, job: &Job, ttl: Duration) -> Result<String> {
        let mut input = TokenInput::new(&job.id)
            .with_expiration(expires_in(ttl))
            .with_type(TokenType::Job)
            .with_claim("job_id", &job.id)
            .with_claim("job_type", &job.job_type)
            .with_claim("workspace_id", &job.workspace_id)
            .with_claim("run_id", &job.run_id);
        if let Some(trn) = &job.job_trn {
            input = input.with_claim("job_trn", trn);
        }
        if let Some(enabled) = job.properties.get("provider_mirror_enabled") {
            input = input.with_claim("provider_mirror_enabled", enabled);
        }
        self.key_manager.sign(&input).await
    }

    /// Short-lived access token carrying the session id so
    /// `InternalIDPAuthenticator` can stamp it onto the resulting
    /// `UserCaller` (`spec.md` §4.4).
    pub async fn mint_user_session_access_token(
        &self,
        user_id: &str,
        session_id: &str,
        ttl: Duration,
    ) -> Result<String> {
        let input = TokenInput::new(user_id)
            .with_expiration(expires_in(ttl))
            .with_type(TokenType::UserSessionAccess)
            .with_claim("sid", session_id);
        self.key_manager.sign(&input).await
    }

    /// `jwt_id` must equal the session's current `refresh_token_id`; a
    /// refresh rotates this value, making the previous refresh token
    /// unverifiable the moment its `jti` no longer matches the stored row
    /// (`spec.md` §3 `UserSession`, §8 property 4).
    pub async fn mint_user_session_refresh_token(
        &self,
        user_id: &str,
        session_id: &str,
        refresh_token_id: &str,
        expiration: u64,
    ) -> Result<String> {
        let input = TokenInput::new(user_id)
            .with_expiration(expiration)
            .with_jwt_id(refresh_token_id)
            .with_type(TokenType::UserSessionRefresh)
            .with_claim("sid", session_id);
        self.key_manager.sign(&input).await
    }

    pub async fn mint_user_session_csrf_token(&self, session_id: &str, ttl: Duration) -> Result<String> {
        let input = TokenInput::new(session_id)
            .with_expiration(expires_in(ttl))
            .with_type(TokenType::UserSessionCsrf)
            .with_claim("sid", session_id);
        self.key_manager.sign(&input).await
    }

    pub async fn mint_scim_token(&self, jti: &str, idp_issuer_url: &str, ttl: Duration) -> Result<String> {
        let input = TokenInput::new(idp_issuer_url)
            .with_expiration(expires_in(ttl))
            .with_jwt_id(jti)
            .with_type(TokenType::Scim)
            .with_claim("idp_issuer_url", idp_issuer_url);
        self.key_manager.sign(&input).await
    }

    pub async fn mint_vcs_workspace_link_token(&self, link_id: &str, jti: &str, ttl: Duration) -> Result<String> {
        let input = TokenInput::new(link_id)
            .with_expiration(expires_in(ttl))
            .with_jwt_id(jti)
            .with_type(TokenType::VcsWorkspaceLink)
            .with_claim("link_id", link_id);
        self.key_manager.sign(&input).await
    }

    /// Verifies any internally-issued token, dispatching on `kid` against
    /// the fleet's in-memory JWKS (`spec.md` §4.3 "Verification").
    pub async fn verify(&self, raw_token: &str, use_cache: bool) -> Result<VerifiedToken> {
        self.key_manager.verify(raw_token, None, use_cache).await
    }
}
