//! Kernel configuration (`spec.md` §6 "Configuration"), grounded on
//! `fraiseql-server::config`'s pattern of one `serde`-deserializable
//! struct per subsystem, loaded from environment via `envy`-style field
//! naming (`SCREAMING_SNAKE_CASE` env vars, `camelCase`/`snake_case`
//! struct fields).

use std::time::Duration;

use serde::Deserialize;

/// One configured external OIDC identity provider (`spec.md` §6).
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityProviderConfig {
    pub issuer: String,
    pub client_id: String,
    /// Claim name carrying the preferred username; varies per IDP (Auth0/
    /// Okta: `preferred_username`; some providers: `nickname`).
    pub username_claim: String,
    #[serde(default)]
    pub jwks_uri: Option<String>,
    #[serde(default)]
    pub token_endpoint: Option<String>,
    #[serde(default)]
    pub auth_endpoint: Option<String>,
}

fn default_access_token_expiration_minutes() -> u64 {
    15
}

fn default_refresh_token_expiration_minutes() -> u64 {
    60 * 24 * 7
}

fn default_max_sessions_per_user() -> usize {
    5
}

fn default_rotation_period_days() -> u64 {
    30
}

fn default_decommission_period_days() -> u64 {
    7
}

/// The kernel's full configuration surface (`spec.md` §6). Nothing here
/// is HTTP-transport-specific — `tharsis_api_url`/`tharsis_ui_url` are
/// consumed only to derive cookie `Secure`/`Domain` attributes and the
/// OIDC `aud`/issuer values.
#[derive(Debug, Clone, Deserialize)]
pub struct KernelConfig {
    #[serde(default)]
    pub identity_providers: Vec<IdentityProviderConfig>,

    #[serde(default = "default_access_token_expiration_minutes")]
    pub access_token_expiration_minutes: u64,
    #[serde(default = "default_refresh_token_expiration_minutes")]
    pub refresh_token_expiration_minutes: u64,
    #[serde(default = "default_max_sessions_per_user")]
    pub max_sessions_per_user: usize,

    pub tharsis_api_url: String,
    pub tharsis_ui_url: String,

    #[serde(default)]
    pub user_credential_login_enabled: bool,

    #[serde(default = "default_rotation_period_days")]
    pub asymmetric_signing_key_rotation_period_days: u64,
    #[serde(default = "default_decommission_period_days")]
    pub asymmetric_signing_key_decommission_period_days: u64,

    pub jwt_issuer_url: String,
    pub jws_provider_plugin_type: String,
}

impl KernelConfig {
    pub fn access_token_ttl(&self) -> Duration {
        Duration::from_secs(self.access_token_expiration_minutes * 60)
    }

    pub fn refresh_token_ttl(&self) -> Duration {
        Duration::from_secs(self.refresh_token_expiration_minutes * 60)
    }

    pub fn signing_key_rotation_period(&self) -> Duration {
        Duration::from_secs(self.asymmetric_signing_key_rotation_period_days * 24 * 60 * 60)
    }

    pub fn signing_key_decommission_period(&self) -> Duration {
        Duration::from_secs(self.asymmetric_signing_key_decommission_period_days * 24 * 60 * 60)
    }

    /// Cookies are `Secure` (and carry the `__Host-` prefix) iff the API
    /// is served over TLS (`spec.md` §6 cookie table).
    pub fn api_is_secure(&self) -> bool {
        self.tharsis_api_url.starts_with("https://")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserializes_with_defaults() {
        let json = serde_json::json!({
            "tharsis_api_url": "https://api.example.com",
            "tharsis_ui_url": "https://app.example.com",
            "jwt_issuer_url": "https://api.example.com",
            "jws_provider_plugin_type": "local",
        });
        let config: KernelConfig = serde_json::from_value(json).unwrap();
        assert_eq!(config.max_sessions_per_user, 5);
        assert_eq!(config.access_token_ttl(), Duration::from_secs(15 * 60));
        assert!(config.api_is_secure());
    }
}
