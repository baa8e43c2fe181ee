//! Authentication and authorization kernel for a multi-tenant
//! infrastructure-orchestration control plane (`spec.md` §1 OVERVIEW).
//!
//! This crate is a library, not a service: it has no HTTP listener, no
//! SQL, and no cryptographic key material of its own. A binary wires it
//! to a concrete [`store::Store`] and [`signing::Signer`], then drives
//! its entry points ([`auth::Authenticator::authenticate`],
//! [`authz::NamespaceAuthorizer`], [`caller::Caller`]'s permission
//! checks, [`session::UserSessionManager`]) from whatever transport it
//! speaks.

pub mod audit;
pub mod auth;
pub mod authz;
pub mod caller;
pub mod config;
pub mod constant_time;
pub mod context;
pub mod error;
pub mod identity;
pub mod jwks;
pub mod model;
pub mod oidc;
pub mod rate_limit;
pub mod session;
pub mod signing;
pub mod store;
pub mod token;

pub use auth::{Authenticator, FederatedRegistryAuthenticator, InternalIdpAuthenticator, SubAuthenticator, UserAuthenticator};
pub use authz::NamespaceAuthorizer;
pub use caller::Caller;
pub use config::KernelConfig;
pub use error::{AuthError, Result};
pub use identity::IdentityProvider;
pub use session::UserSessionManager;
pub use signing::SigningKeyManager;
pub use store::Store;
