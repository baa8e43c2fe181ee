//! The outermost `Authenticate(ctx, rawToken, useCache) → Caller` entry
//! point (`spec.md` §4.4), grounded on an `AuthMiddleware` +
//! provider-registry pattern (`auth/providers/mod.rs`): an ordered
//! collection of named strategies, first match wins.

use async_trait::async_trait;

use crate::caller::Caller;
use crate::error::{AuthError, Result};
use crate::token::peek_issuer;

/// One strategy capable of turning a raw token into a `Caller`, claimed
/// by issuer.
#[async_trait]
pub trait SubAuthenticator: Send + Sync {
    /// Cheap, non-cryptographic check: does this sub-authenticator own
    /// tokens from `issuer`?
    fn handles(&self, issuer: &str) -> bool;

    /// Fully verifies `raw_token` and constructs the matching `Caller`.
    /// Only called after `handles` returned `true`. `use_cache = false`
    /// forces a fresh JWKS/discovery fetch past whatever TTL the
    /// sub-authenticator's key material is cached under.
    async fn authenticate(&self, raw_token: &str, use_cache: bool) -> Result<Caller>;
}

/// Dispatches a raw bearer token to the first sub-authenticator whose
/// issuer it matches.
pub struct Authenticator {
    sub_authenticators: Vec<Box<dyn SubAuthenticator>>,
}

impl Authenticator {
    pub fn new(sub_authenticators: Vec<Box<dyn SubAuthenticator>>) -> Self {
        Self { sub_authenticators }
    }

    /// Parses `raw_token` without verification to read `iss`, then
    /// delegates to the first sub-authenticator that claims it.
    pub async fn authenticate(&self, raw_token: &str, use_cache: bool) -> Result<Caller> {
        let issuer = peek_issuer(raw_token)?;
        for sub in &self.sub_authenticators {
            if sub.handles(&issuer) {
                return sub.authenticate(raw_token, use_cache).await;
            }
        }
        Err(AuthError::unauthorized(format!("token issuer {issuer} is not allowed")))
    }
}
