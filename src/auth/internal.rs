//! `InternalIDPAuthenticator` (`spec.md` §4.4): handles tokens minted by
//! this system itself, dispatching by the private `type` claim.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::authz::NamespaceAuthorizer;
use crate::caller::{Caller, JobCaller, ScimCaller, ServiceAccountCaller, UserCaller, VcsWorkspaceLinkCaller};
use crate::constant_time::constant_time_eq;
use crate::error::{AuthError, Result};
use crate::identity::IdentityProvider;
use crate::model::Job;
use crate::store::Store;
use crate::token::{TokenType, VerifiedToken};

use super::authenticator::SubAuthenticator;

pub struct InternalIdpAuthenticator {
    issuer: String,
    identity: Arc<IdentityProvider>,
    store: Arc<dyn Store>,
}

impl InternalIdpAuthenticator {
    pub fn new(issuer: impl Into<String>, identity: Arc<IdentityProvider>, store: Arc<dyn Store>) -> Self {
        Self { issuer: issuer.into(), identity, store }
    }

    fn require_claim<'a>(verified: &'a VerifiedToken, key: &str) -> Result<&'a str> {
        verified.claim(key).ok_or_else(|| AuthError::unauthorized(format!("token missing {key} claim")))
    }

    async fn construct_caller(&self, verified: VerifiedToken) -> Result<Caller> {
        let token_type = verified
            .token_type()
            .ok_or_else(|| AuthError::unauthorized("token missing type claim"))?;

        match token_type {
            TokenType::UserSessionAccess => {
                let user = self
                    .store
                    .get_user_by_id(&verified.subject)
                    .await?
                    .ok_or_else(|| AuthError::unauthorized("unknown user"))?;
                if !user.active {
                    return Err(AuthError::unauthorized("user is not active"));
                }
                let session_id = verified.claim("sid").map(str::to_string);
                let authorizer = NamespaceAuthorizer::new(self.store.clone(), user.id.clone());
                Ok(Caller::User(UserCaller { user, session_id, authorizer, store: self.store.clone() }))
            }
            TokenType::ServiceAccount => {
                let id = verified.subject.clone();
                let path = Self::require_claim(&verified, "service_account_path")?.to_string();
                let authorizer = NamespaceAuthorizer::new(self.store.clone(), id.clone());
                Ok(Caller::ServiceAccount(ServiceAccountCaller {
                    service_account_id: id,
                    path,
                    authorizer,
                    store: self.store.clone(),
                }))
            }
            TokenType::Job => {
                let job_id = Self::require_claim(&verified, "job_id")?.to_string();
                let workspace_id = Self::require_claim(&verified, "workspace_id")?.to_string();
                let run_id = Self::require_claim(&verified, "run_id")?.to_string();
                let job_trn = verified.claim("job_trn").map(str::to_string);

                let mut properties = HashMap::new();
                if let Some(enabled) = verified.claim("provider_mirror_enabled") {
                    properties.insert("provider_mirror_enabled".to_string(), enabled.to_string());
                }

                let job = Job {
                    id: job_id,
                    job_type: verified.claim("job_type").unwrap_or_default().to_string(),
                    workspace_id,
                    run_id,
                    job_trn,
                    properties,
                };
                Ok(Caller::Job(JobCaller { job, store: self.store.clone() }))
            }
            TokenType::Scim => {
                let jti =
                    verified.jwt_id.clone().ok_or_else(|| AuthError::unauthorized("scim token missing jti"))?;
                self.store
                    .get_scim_token(&jti)
                    .await?
                    .ok_or_else(|| AuthError::unauthorized("unknown scim token"))?;
                let idp_issuer_url = Self::require_claim(&verified, "idp_issuer_url")?.to_string();
                Ok(Caller::Scim(ScimCaller { idp_issuer_url, store: self.store.clone() }))
            }
            TokenType::VcsWorkspaceLink => {
                let link_id = Self::require_claim(&verified, "link_id")?.to_string();
                let link = self
                    .store
                    .get_vcs_workspace_link(&link_id)
                    .await?
                    .ok_or_else(|| AuthError::unauthorized("unknown vcs workspace link"))?;
                let jti = verified.jwt_id.clone().unwrap_or_default();
                if !constant_time_eq(&link.token_nonce, &jti) {
                    return Err(AuthError::unauthorized("vcs workspace link token nonce mismatch"));
                }
                Ok(Caller::VcsWorkspaceLink(VcsWorkspaceLinkCaller {
                    link_id: link.id,
                    workspace_id: link.workspace_id,
                }))
            }
            _ => Err(AuthError::unauthorized("unsupported token type")),
        }
    }
}

#[async_trait]
impl SubAuthenticator for InternalIdpAuthenticator {
    fn handles(&self, issuer: &str) -> bool {
        issuer == self.issuer
    }

    async fn authenticate(&self, raw_token: &str, use_cache: bool) -> Result<Caller> {
        let verified = self.identity.verify(raw_token, use_cache).await?;
        self.construct_caller(verified).await
    }
}
