//! `UserSessionManager` (`spec.md` §4.5): interactive-user login,
//! refresh-token rotation, PKCE authorization-code exchange, and the
//! per-user session cap. Directly grounded on `auth/session.rs`
//! (`SessionStore`, `TokenPair`, `hash_token`/`generate_refresh_token`)
//! and `auth/provider.rs` (`PkceChallenge`), generalized to this spec's
//! richer lifecycle.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use uuid::Uuid;

use crate::auth::Authenticator;
use crate::caller::Caller;
use crate::error::{AuthError, Result};
use crate::identity::IdentityProvider;
use crate::model::UserSession;
use crate::rate_limit::KeyedRateLimiter;
use crate::session::pkce;
use crate::store::Store;

fn now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

/// TTL of an oauth-code-flow authorization code (`spec.md` §4.5, §6).
const OAUTH_CODE_TTL_SECS: u64 = 60;
/// Optimistic-concurrency retry bound on the oauth-code update path
/// (`spec.md` §4.5, §7).
const OAUTH_UPDATE_MAX_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone)]
pub struct UserSessionManagerConfig {
    pub access_token_ttl: Duration,
    pub max_sessions_per_user: usize,
    pub credential_login_enabled: bool,
}

/// Either a bearer token (already-authenticated CLI/browser flow) or a
/// username/password pair (`spec.md` §4.5 `CreateSession`).
pub enum CreateSessionInput {
    Token(String),
    Credentials { username: String, password: String },
}

pub struct CreateSessionRequest {
    pub input: CreateSessionInput,
    pub user_agent: String,
}

#[derive(Debug, Clone)]
pub struct SessionTokens {
    pub session_id: String,
    pub access_token: String,
    pub refresh_token: String,
    pub csrf_token: String,
}

#[derive(Debug, Clone)]
pub struct RefreshedTokens {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, Clone)]
pub struct ExchangedAccessToken {
    pub access_token: String,
    pub expires_in: u64,
}

pub struct UserSessionManager {
    store: Arc<dyn Store>,
    identity: Arc<IdentityProvider>,
    authenticator: Arc<Authenticator>,
    config: UserSessionManagerConfig,
    login_rate_limiter: KeyedRateLimiter,
}

impl UserSessionManager {
    pub fn new(
        store: Arc<dyn Store>,
        identity: Arc<IdentityProvider>,
        authenticator: Arc<Authenticator>,
        config: UserSessionManagerConfig,
    ) -> Self {
        Self {
            store,
            identity,
            authenticator,
            config,
            login_rate_limiter: KeyedRateLimiter::new(crate::rate_limit::RateLimitConfig::failed_login_attempts()),
        }
    }

    /// `spec.md` §4.5 `CreateSession`. `session_expiration` is the
    /// session's absolute expiry (callers own the TTL policy for
    /// refresh-token lifetime, per `refreshTokenExpirationMinutes`).
    pub async fn create_session(
        &self,
        request: CreateSessionRequest,
        session_expiration: u64,
        current_caller: Option<&Caller>,
    ) -> Result<SessionTokens> {
        let user_id = match request.input {
            CreateSessionInput::Token(raw_token) => {
                let caller = self.authenticator.authenticate(&raw_token, true).await?;
                match caller {
                    Caller::User(c) => c.user.id,
                    _ => return Err(AuthError::unauthorized("token does not belong to a user session")),
                }
            }
            CreateSessionInput::Credentials { username, password } => {
                if !self.config.credential_login_enabled {
                    return Err(AuthError::invalid("credential login is disabled"));
                }
                self.login_rate_limiter.check(&username)?;
                let user = self.lookup_user_by_trn(&username).await?;
                if !self.store.verify_user_password(&user.id, &password).await? {
                    return Err(AuthError::unauthorized("invalid username or password"));
                }
                if !user.active {
                    return Err(AuthError::unauthorized("user is not active"));
                }
                user.id
            }
        };

        if let Some(Caller::User(c)) = current_caller {
            if c.user.id == user_id {
                return Err(AuthError::Conflict("an active session already exists for this user".to_string()));
            }
        }

        let refresh_token_id = Uuid::new_v4().to_string();
        let session = UserSession {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.clone(),
            refresh_token_id: refresh_token_id.clone(),
            expiration: session_expiration,
            user_agent: request.user_agent,
            oauth_code: None,
            oauth_code_challenge: None,
            oauth_code_challenge_method: None,
            oauth_code_expiration: None,
            oauth_redirect_uri: None,
        };
        let session = self.store.create_session(session).await?;
        self.cleanup_old_sessions(&user_id).await?;

        self.mint_tokens(&session, &refresh_token_id).await
    }

    /// `username` may be a bare username or a full email; per `spec.md`
    /// §4.5, an email-shaped TRN is matched in full (not stripped to its
    /// local part) — only the lookup *strategy* (username vs. email
    /// table) branches on the `@`.
    async fn lookup_user_by_trn(&self, username: &str) -> Result<crate::model::User> {
        let user = if username.contains('@') {
            self.store.get_user_by_email(username).await?
        } else {
            self.store.get_user_by_username(username).await?
        };
        user.ok_or_else(|| AuthError::unauthorized("invalid username or password"))
    }

    async fn mint_tokens(&self, session: &UserSession, refresh_token_id: &str) -> Result<SessionTokens> {
        let access_token = self
            .identity
            .mint_user_session_access_token(&session.user_id, &session.id, self.config.access_token_ttl)
            .await?;
        let refresh_token = self
            .identity
            .mint_user_session_refresh_token(&session.user_id, &session.id, refresh_token_id, session.expiration)
            .await?;
        let csrf_token = self
            .identity
            .mint_user_session_csrf_token(&session.id, self.config.access_token_ttl)
            .await?;
        Ok(SessionTokens {
            session_id: session.id.clone(),
            access_token,
            refresh_token,
            csrf_token,
        })
    }

    /// `spec.md` §4.5 `RefreshSession`. Rotates `refreshTokenID`; the
    /// previous refresh token becomes unverifiable because its `jti` no
    /// longer matches the stored row (`spec.md` §8 property 4).
    pub async fn refresh_session(&self, refresh_token: &str) -> Result<RefreshedTokens> {
        let verified = self.identity.verify(refresh_token, true).await?;
        self.require_type(&verified, crate::token::TokenType::UserSessionRefresh)?;

        let session_id = verified
            .claim("sid")
            .ok_or_else(|| AuthError::unauthorized("refresh token missing sid claim"))?;
        let jti = verified
            .jwt_id
            .as_deref()
            .ok_or_else(|| AuthError::unauthorized("refresh token missing jti claim"))?;

        let mut session = self
            .store
            .get_session(session_id)
            .await?
            .ok_or_else(|| AuthError::unauthorized("no user session found for refresh token"))?;

        if session.refresh_token_id != jti {
            return Err(AuthError::unauthorized("no user session found for refresh token"));
        }
        if session.is_expired(now()) {
            return Err(AuthError::unauthorized("user session has expired"));
        }

        let new_refresh_token_id = Uuid::new_v4().to_string();
        session.refresh_token_id = new_refresh_token_id.clone();
        let session = self.store.update_session(session).await?;

        let tokens = self.mint_tokens(&session, &new_refresh_token_id).await?;
        Ok(RefreshedTokens { access_token: tokens.access_token, refresh_token: tokens.refresh_token })
    }

    /// `spec.md` §4.5 `InvalidateSession`. Idempotent: an expired refresh
    /// token, or a session that no longer exists, is treated as an
    /// already-logged-out success rather than an error.
    pub async fn invalidate_session(&self, access_or_refresh_token: &str) -> Result<()> {
        let verified = match self.identity.verify(access_or_refresh_token, true).await {
            Ok(v) => v,
            Err(AuthError::Unauthorized(msg)) if msg == "exp not satisfied" => return Ok(()),
            Err(e) => return Err(e),
        };

        let token_type = verified.token_type();
        let session_id = match token_type {
            Some(crate::token::TokenType::UserSessionRefresh) | Some(crate::token::TokenType::UserSessionAccess) => {
                verified.claim("sid").ok_or_else(|| AuthError::unauthorized("token missing sid claim"))?
            }
            _ => return Err(AuthError::unauthorized("token is not a user session token")),
        };

        if self.store.get_session(session_id).await?.is_none() {
            return Ok(());
        }
        self.store.delete_session(session_id).await
    }

    /// `spec.md` §4.5 `VerifyCSRFToken`: the double-submit-cookie CSRF
    /// defence — the token's `sid` claim must match the session the
    /// request claims to belong to.
    pub async fn verify_csrf_token(&self, request_session_id: &str, csrf_token: &str) -> Result<()> {
        let verified = self.identity.verify(csrf_token, true).await?;
        self.require_type(&verified, crate::token::TokenType::UserSessionCsrf)?;

        let sid = verified.claim("sid").ok_or_else(|| AuthError::unauthorized("csrf token missing sid claim"))?;
        if sid != request_session_id {
            return Err(AuthError::unauthorized("csrf token does not match session"));
        }
        Ok(())
    }

    /// `spec.md` §4.5 `InitiateSessionOauthCodeFlow`. `method` must be
    /// exactly `S256`; `redirect_uri` must be `http://localhost` or
    /// `http://localhost:<port>` (`spec.md` §6).
    pub async fn initiate_oauth_code_flow(
        &self,
        user_session_id: &str,
        code_challenge: &str,
        method: &str,
        redirect_uri: &str,
    ) -> Result<String> {
        if method != "S256" {
            return Err(AuthError::invalid(format!("unsupported code_challenge_method {method}")));
        }
        if !pkce::is_allowed_redirect_uri(redirect_uri) {
            return Err(AuthError::invalid(format!("redirect_uri {redirect_uri} is not allowed")));
        }

        let code = pkce::generate_code();
        let expiration = now() + OAUTH_CODE_TTL_SECS;

        let mut attempts = 0;
        loop {
            attempts += 1;
            let mut session = self
                .store
                .get_session(user_session_id)
                .await?
                .ok_or(AuthError::NotFound)?;
            session.oauth_code = Some(code.clone());
            session.oauth_code_challenge = Some(code_challenge.to_string());
            session.oauth_code_challenge_method = Some(method.to_string());
            session.oauth_code_expiration = Some(expiration);
            session.oauth_redirect_uri = Some(redirect_uri.to_string());

            match self.store.update_session(session).await {
                Ok(_) => return Ok(code),
                Err(AuthError::Conflict(_)) if attempts < OAUTH_UPDATE_MAX_ATTEMPTS => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// `spec.md` §4.5 `ExchangeOAuthCodeForSessionToken`. The code is
    /// single-use: oauth fields are cleared on success.
    pub async fn exchange_oauth_code(
        &self,
        code: &str,
        verifier: &str,
        redirect_uri: &str,
    ) -> Result<ExchangedAccessToken> {
        let mut session = self
            .store
            .get_session_by_oauth_code(code)
            .await?
            .ok_or_else(|| AuthError::unauthorized("unknown or expired authorization code"))?;

        if session.oauth_redirect_uri.as_deref() != Some(redirect_uri) {
            return Err(AuthError::unauthorized("redirect_uri does not match"));
        }
        if session.oauth_code_is_expired(now()) {
            return Err(AuthError::unauthorized("authorization code has expired"));
        }
        if session.is_expired(now()) {
            return Err(AuthError::unauthorized("user session has expired"));
        }

        let expected_challenge = session
            .oauth_code_challenge
            .as_deref()
            .ok_or_else(|| AuthError::unauthorized("session has no pending authorization code"))?;
        let computed_challenge = pkce::compute_challenge(verifier);
        if computed_challenge != expected_challenge {
            return Err(AuthError::unauthorized("code verifier does not match code challenge"));
        }

        session.clear_oauth_fields();
        let session = self.store.update_session(session).await?;

        let access_token = self
            .identity
            .mint_user_session_access_token(&session.user_id, &session.id, self.config.access_token_ttl)
            .await?;
        Ok(ExchangedAccessToken { access_token, expires_in: self.config.access_token_ttl.as_secs() })
    }

    /// `spec.md` §4.5 `cleanupOldSessions`: evicts the oldest session by
    /// expiration iff it is already expired or the cap is exceeded.
    async fn cleanup_old_sessions(&self, user_id: &str) -> Result<()> {
        let mut sessions = self.store.list_sessions_for_user(user_id).await?;
        if sessions.is_empty() {
            return Ok(());
        }
        sessions.sort_by_key(|s| s.expiration);

        loop {
            let count = sessions.len();
            let Some(oldest) = sessions.first() else { break };
            let should_evict = oldest.is_expired(now()) || count > self.config.max_sessions_per_user;
            if !should_evict {
                break;
            }
            self.store.delete_session(&oldest.id).await?;
            sessions.remove(0);
        }
        Ok(())
    }

    fn require_type(&self, verified: &crate::token::VerifiedToken, expected: crate::token::TokenType) -> Result<()> {
        match verified.token_type() {
            Some(t) if t == expected => Ok(()),
            _ => Err(AuthError::unauthorized(format!("expected token type {}", expected.as_str()))),
        }
    }
}
