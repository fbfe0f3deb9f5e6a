//! The pool configuration fingerprint ("typeCode") that invalidates stale
//! handles after a reconfiguration.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Derives a deterministic fingerprint from `(url, user, password)`.
///
/// Handles produced by a pool stamp this value as their `type_code`; a
/// handle released after the pool's own fingerprint has moved on (via
/// [`Pool::force_close_all`][crate::Pool::force_close_all]) is
/// dropped instead of recycled.
///
/// `DefaultHasher` is deterministic within a process but is not a stable
/// hash across Rust versions or processes, which matches the spec's only
/// requirement: stability within a single run, not cryptographic strength
/// or cross-process reproducibility.
pub fn fingerprint(url: &str, user: Option<&str>, password: Option<&str>) -> u64 {
    let mut hasher = DefaultHasher::new();
    url.hash(&mut hasher);
    user.unwrap_or("").hash(&mut hasher);
    password.unwrap_or("").hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_within_process() {
        let a = fingerprint("postgres://localhost/db", Some("alice"), Some("hunter2"));
        let b = fingerprint("postgres://localhost/db", Some("alice"), Some("hunter2"));
        assert_eq!(a, b);
    }

    #[test]
    fn distinguishes_inputs() {
        let base = fingerprint("postgres://localhost/db", Some("alice"), Some("hunter2"));
        assert_ne!(base, fingerprint("postgres://localhost/db2", Some("alice"), Some("hunter2")));
        assert_ne!(base, fingerprint("postgres://localhost/db", Some("bob"), Some("hunter2")));
        assert_ne!(base, fingerprint("postgres://localhost/db", Some("alice"), Some("other")));
    }

    #[test]
    fn none_and_empty_string_hash_the_same() {
        // Not a hard requirement, just documents current behavior: `None` is
        // folded in the same as an empty string, so a caller relying on the
        // distinction should not use this fingerprint for authentication.
        let none = fingerprint("url", None, None);
        let empty = fingerprint("url", Some(""), Some(""));
        assert_eq!(none, empty);
    }
}
