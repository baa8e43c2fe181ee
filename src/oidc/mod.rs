//! Verification of tokens minted by external OpenID Connect providers.

pub mod resolver;

pub use resolver::{OIDCResolver, OidcClaims, ValidationOptions};
