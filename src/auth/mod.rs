//! Token-to-`Caller` dispatch (`spec.md` §4.4, "Authenticator").

pub mod authenticator;
pub mod federated_registry;
pub mod internal;
pub mod user_oidc;

pub use authenticator::{Authenticator, SubAuthenticator};
pub use federated_registry::FederatedRegistryAuthenticator;
pub use internal::InternalIdpAuthenticator;
pub use user_oidc::UserAuthenticator;
