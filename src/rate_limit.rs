//! `KeyedRateLimiter` (`spec.md` §6 ambient hardening around
//! `CreateSession`'s credential-login path), grounded on
//! `auth/rate_limiting.rs`'s in-memory sliding-window approach —
//! narrowed to the one use this kernel has for it (failed-login
//! throttling) and ported to `parking_lot::Mutex`, matching the rest of
//! this crate's lock choice (`NamespaceAuthorizer`'s per-subject cache).

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

use crate::error::{AuthError, Result};

#[derive(Debug, Clone, Copy)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub max_requests: u32,
    pub window_secs: u64,
}

impl RateLimitConfig {
    /// 5 failed credential-login attempts per hour, per username.
    pub fn failed_login_attempts() -> Self {
        Self { enabled: true, max_requests: 5, window_secs: 3600 }
    }
}

struct Record {
    count: u32,
    window_start: u64,
}

fn now() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(u64::MAX)
}

/// Per-key in-memory sliding-window limiter. `check` is check-and-update
/// under a single lock acquisition, so concurrent callers for the same
/// key can't race past the limit.
pub struct KeyedRateLimiter {
    records: Mutex<HashMap<String, Record>>,
    config: RateLimitConfig,
}

impl KeyedRateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self { records: Mutex::new(HashMap::new()), config }
    }

    pub fn check(&self, key: &str) -> Result<()> {
        if !self.config.enabled {
            return Ok(());
        }

        let mut records = self.records.lock();
        let now = now();
        let record = records.entry(key.to_string()).or_insert(Record { count: 0, window_start: now });

        if now >= record.window_start + self.config.window_secs {
            record.count = 0;
            record.window_start = now;
        }

        if record.count >= self.config.max_requests {
            return Err(AuthError::invalid("rate limit exceeded"));
        }

        record.count += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn denies_after_the_limit_is_reached() {
        let limiter = KeyedRateLimiter::new(RateLimitConfig { enabled: true, max_requests: 2, window_secs: 3600 });
        assert!(limiter.check("alice").is_ok());
        assert!(limiter.check("alice").is_ok());
        assert!(limiter.check("alice").is_err());
        // A different key has its own independent window.
        assert!(limiter.check("bob").is_ok());
    }

    #[test]
    fn disabled_limiter_always_allows() {
        let limiter = KeyedRateLimiter::new(RateLimitConfig { enabled: false, max_requests: 1, window_secs: 3600 });
        assert!(limiter.check("alice").is_ok());
        assert!(limiter.check("alice").is_ok());
    }
}
