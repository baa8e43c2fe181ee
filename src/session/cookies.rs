//! The three-cookie session contract (`spec.md` §4.5, §6). Produces plain
//! data — this crate binds no HTTP server, so a caller's web framework
//! serializes these into real `Set-Cookie` headers.

use std::time::{SystemTime, UNIX_EPOCH};

const ACCESS_TOKEN_COOKIE: &str = "tharsis_access_token";
const REFRESH_TOKEN_COOKIE: &str = "tharsis_refresh_token";
const CSRF_TOKEN_COOKIE: &str = "tharsis_csrf_token";

fn now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_secs()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: SameSite,
    /// `None` means host-only (access/refresh); `Some` names the UI
    /// hostname (CSRF).
    pub domain: Option<String>,
    pub path: String,
    /// Absolute Unix-seconds expiration.
    pub expires_at: u64,
}

/// Derives the cookie-layer secure/domain settings from configuration:
/// `secure` follows the API URL's scheme, and the CSRF cookie's domain is
/// the UI URL's hostname (`spec.md` §6 Configuration).
#[derive(Debug, Clone)]
pub struct CookieConfig {
    pub secure: bool,
    pub ui_hostname: String,
}

impl CookieConfig {
    /// `tharsisAPIURL`'s scheme determines whether cookies are marked
    /// `Secure` and whether the `__Host-` prefix is used.
    pub fn from_urls(api_url: &str, ui_url: &str) -> Self {
        Self { secure: api_url.starts_with("https://"), ui_hostname: hostname_of(ui_url) }
    }

    fn host_only_name(&self, base: &str) -> String {
        if self.secure {
            format!("__Host-{base}")
        } else {
            base.to_string()
        }
    }

    pub fn access_token_cookie(&self, token: &str, expires_at: u64) -> SessionCookie {
        SessionCookie {
            name: self.host_only_name(ACCESS_TOKEN_COOKIE),
            value: token.to_string(),
            http_only: true,
            secure: self.secure,
            same_site: SameSite::Strict,
            domain: None,
            path: "/".to_string(),
            expires_at,
        }
    }

    pub fn refresh_token_cookie(&self, token: &str, expires_at: u64) -> SessionCookie {
        SessionCookie {
            name: self.host_only_name(REFRESH_TOKEN_COOKIE),
            value: token.to_string(),
            http_only: true,
            secure: self.secure,
            same_site: SameSite::Strict,
            domain: None,
            path: "/".to_string(),
            expires_at,
        }
    }

    /// Not `HttpOnly` so the UI can read and double-submit it; never
    /// carries the `__Host-` prefix since it has an explicit `Domain`.
    pub fn csrf_token_cookie(&self, token: &str, expires_at: u64) -> SessionCookie {
        SessionCookie {
            name: CSRF_TOKEN_COOKIE.to_string(),
            value: token.to_string(),
            http_only: false,
            secure: self.secure,
            same_site: SameSite::Strict,
            domain: Some(self.ui_hostname.clone()),
            path: "/".to_string(),
            expires_at,
        }
    }

    /// Writes all three cookie names with an expiration 24h in the past.
    pub fn clear_user_session_cookies(&self) -> [SessionCookie; 3] {
        let past = now().saturating_sub(24 * 60 * 60);
        [
            self.access_token_cookie("", past),
            self.refresh_token_cookie("", past),
            self.csrf_token_cookie("", past),
        ]
    }
}

fn hostname_of(url: &str) -> String {
    let without_scheme = url.split("://").nth(1).unwrap_or(url);
    let host = without_scheme.split(['/', ':']).next().unwrap_or(without_scheme);
    host.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uses_host_prefix_only_when_secure() {
        let secure = CookieConfig::from_urls("https://api.tharsis.example.com", "https://app.tharsis.example.com");
        assert_eq!(secure.access_token_cookie("t", 0).name, "__Host-tharsis_access_token");

        let insecure = CookieConfig::from_urls("http://localhost:8080", "http://localhost:3000");
        assert_eq!(insecure.access_token_cookie("t", 0).name, "tharsis_access_token");
    }

    #[test]
    fn csrf_cookie_is_not_http_only_and_carries_ui_domain() {
        let cfg = CookieConfig::from_urls("https://api.example.com", "https://ui.example.com");
        let cookie = cfg.csrf_token_cookie("c", 0);
        assert!(!cookie.http_only);
        assert_eq!(cookie.domain.as_deref(), Some("ui.example.com"));
        assert!(!cookie.name.starts_with("__Host-"));
    }

    #[test]
    fn clear_cookies_are_expired_in_the_past() {
        let cfg = CookieConfig::from_urls("http://localhost", "http://localhost");
        for cookie in cfg.clear_user_session_cookies() {
            assert!(cookie.expires_at < now());
        }
    }
}
