//! The JWS cryptographic plugin contract (`spec.md` §1, external
//! collaborator). An `OAuthProvider`-style trait shape: a capability probe
//! plus a handful of fallible async operations.

use async_trait::async_trait;

use crate::error::Result;

/// Public JWK material for one signing key, serialized as it would appear
/// in a JWKS document.
pub type PublicJwk = serde_json::Value;

/// Opaque, plugin-specific handle to a private key. The kernel never
/// inspects this — it only stores and hands it back to the plugin.
pub type PrivateKeyHandle = Vec<u8>;

/// A freshly created keypair, as returned by the plugin.
pub struct CreatedKey {
    pub public_jwk: PublicJwk,
    pub private_handle: PrivateKeyHandle,
    pub algorithm: String,
}

/// External signer plugin. Implementations own the actual cryptographic
/// material (HSM, KMS, local PEM files, ...); the kernel only orchestrates
/// lifecycle transitions and dispatches sign/verify calls.
#[async_trait]
pub trait Signer: Send + Sync {
    /// Plugin type identifier, surfaced on `AsymSigningKey::plugin_type`.
    fn plugin_type(&self) -> &str;

    /// Whether this plugin can rotate keys without manual intervention.
    /// `SigningKeyManager::new` fails at startup if rotation is configured
    /// non-zero and this returns `false` (`spec.md` §7).
    fn supports_key_rotation(&self) -> bool;

    /// Creates new key material and returns its public JWK plus an opaque
    /// private handle.
    async fn create_key(&self) -> Result<CreatedKey>;

    /// Signs `payload` (a JWT signing input) using the key identified by
    /// `private_handle`, returning the raw signature bytes.
    async fn sign(&self, private_handle: &PrivateKeyHandle, payload: &[u8]) -> Result<Vec<u8>>;

    /// Verifies `signature` over `payload` using `public_jwk`.
    async fn verify(&self, public_jwk: &PublicJwk, payload: &[u8], signature: &[u8]) -> Result<bool>;

    /// Permanently deletes the key material behind `private_handle`.
    async fn delete_key(&self, private_handle: &PrivateKeyHandle) -> Result<()>;
}
