//! `FederatedRegistryAuthenticator` (`spec.md` §4.4): verifies tokens
//! issued by a federated module/provider registry, symmetric to
//! `UserAuthenticator` but scoped to a registry group rather than a user
//! identity, and with no store-backed provisioning step.

use std::sync::Arc;

use async_trait::async_trait;

use crate::caller::{Caller, FederatedRegistryCaller};
use crate::error::{AuthError, Result};
use crate::oidc::{OIDCResolver, ValidationOptions};

use super::authenticator::SubAuthenticator;

pub struct FederatedRegistryAuthenticator {
    resolver: Arc<OIDCResolver>,
    allowed_issuers: Vec<String>,
    audience: String,
    /// Claim carrying the registry group this token is scoped to.
    group_claim: String,
}

impl FederatedRegistryAuthenticator {
    pub fn new(
        resolver: Arc<OIDCResolver>,
        allowed_issuers: Vec<String>,
        audience: impl Into<String>,
        group_claim: impl Into<String>,
    ) -> Self {
        Self { resolver, allowed_issuers, audience: audience.into(), group_claim: group_claim.into() }
    }
}

#[async_trait]
impl SubAuthenticator for FederatedRegistryAuthenticator {
    fn handles(&self, issuer: &str) -> bool {
        self.allowed_issuers.iter().any(|i| i == issuer)
    }

    async fn authenticate(&self, raw_token: &str, use_cache: bool) -> Result<Caller> {
        let options = ValidationOptions { audience: Some(self.audience.clone()), clock_skew_secs: 60 };
        let claims = self.resolver.verify_token(raw_token, &options, use_cache).await?;

        let group_id = claims
            .get_str(&self.group_claim)
            .ok_or_else(|| AuthError::unauthorized(format!("token missing {} claim", self.group_claim)))?
            .to_string();

        Ok(Caller::FederatedRegistry(FederatedRegistryCaller { group_id }))
    }
}
