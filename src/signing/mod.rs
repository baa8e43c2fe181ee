//! Signing-key lifecycle and the external JWS plugin contract.

pub mod key_manager;
pub mod plugin;

pub use key_manager::{SigningKeyManager, SigningKeyManagerConfig};
pub use plugin::{CreatedKey, PrivateKeyHandle, PublicJwk, Signer};
