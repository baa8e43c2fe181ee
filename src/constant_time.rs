//! Constant-time comparisons for nonce/token-identity checks (`spec.md`
//! ambient stack), grounded on `auth/constant_time.rs`'s use of `subtle`
//! to avoid timing side channels on SCIM/VCS-link lookups.

use subtle::ConstantTimeEq;

pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
