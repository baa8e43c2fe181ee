//! `UserAuthenticator` (`spec.md` §4.4): interactive-user login via an
//! external OIDC provider, with just-in-time user provisioning.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::authz::NamespaceAuthorizer;
use crate::caller::{Caller, UserCaller};
use crate::error::{AuthError, Result};
use crate::model::{ExternalIdentity, User};
use crate::oidc::{OIDCResolver, OidcClaims, ValidationOptions};
use crate::store::Store;

use super::authenticator::SubAuthenticator;

pub struct UserAuthenticator {
    resolver: Arc<OIDCResolver>,
    allowed_issuers: Vec<String>,
    client_id: String,
    /// Claim name carrying the preferred username; configurable per-IDP
    /// (Auth0/Okta use `preferred_username`, some providers `nickname`).
    username_claim: String,
    store: Arc<dyn Store>,
}

impl UserAuthenticator {
    pub fn new(
        resolver: Arc<OIDCResolver>,
        allowed_issuers: Vec<String>,
        client_id: impl Into<String>,
        username_claim: impl Into<String>,
        store: Arc<dyn Store>,
    ) -> Self {
        Self {
            resolver,
            allowed_issuers,
            client_id: client_id.into(),
            username_claim: username_claim.into(),
            store,
        }
    }

    /// Upserts a `User` by `(issuer, subject)`. On first sight: creates a
    /// row, or on username conflict links by email, or else assigns a
    /// deduplicated username by suffixing the next integer.
    async fn upsert_user(&self, claims: &OidcClaims, username: &str) -> Result<User> {
        if let Some(user) = self.store.get_user_by_external_identity(&claims.issuer, &claims.subject).await? {
            return Ok(user);
        }

        let Some(existing) = self.store.get_user_by_username(username).await? else {
            return self.create_user(claims, username).await;
        };

        let email = claims.get_str("email").unwrap_or_default();
        if !email.is_empty() && existing.email == email {
            let linked = User {
                external_identity: Some(ExternalIdentity {
                    issuer: claims.issuer.clone(),
                    subject: claims.subject.clone(),
                }),
                ..existing
            };
            return self.store.update_user(linked).await;
        }

        let mut suffix = 1u32;
        let deduped = loop {
            let candidate = format!("{username}{suffix}");
            if self.store.get_user_by_username(&candidate).await?.is_none() {
                break candidate;
            }
            suffix += 1;
        };
        self.create_user(claims, &deduped).await
    }

    async fn create_user(&self, claims: &OidcClaims, username: &str) -> Result<User> {
        let user = User {
            id: Uuid::new_v4().to_string(),
            username: username.to_string(),
            email: claims.get_str("email").unwrap_or_default().to_string(),
            active: true,
            admin: false,
            external_identity: Some(ExternalIdentity { issuer: claims.issuer.clone(), subject: claims.subject.clone() }),
            scim_external_id: None,
        };
        self.store.create_user(user).await
    }
}

#[async_trait]
impl SubAuthenticator for UserAuthenticator {
    fn handles(&self, issuer: &str) -> bool {
        self.allowed_issuers.iter().any(|i| i == issuer)
    }

    async fn authenticate(&self, raw_token: &str, use_cache: bool) -> Result<Caller> {
        let options = ValidationOptions { audience: Some(self.client_id.clone()), clock_skew_secs: 60 };
        let claims = self.resolver.verify_token(raw_token, &options, use_cache).await?;

        let username = claims
            .get_str(&self.username_claim)
            .ok_or_else(|| AuthError::unauthorized(format!("token missing {} claim", self.username_claim)))?
            .to_string();

        let user = self.upsert_user(&claims, &username).await?;
        if !user.active {
            return Err(AuthError::unauthorized("user is not active"));
        }

        let authorizer = NamespaceAuthorizer::new(self.store.clone(), user.id.clone());
        Ok(Caller::User(UserCaller { user, session_id: None, authorizer, store: self.store.clone() }))
    }
}
