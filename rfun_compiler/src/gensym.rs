//! Fresh-name generation.
//!
//! The counter is process-wide and never reused within a process, so every
//! pass can mint names without coordinating. Tests that want reproducible
//! names call [`reset`] first and must not run concurrently with each other.

use std::sync::atomic::{AtomicU64, Ordering};

static COUNTER: AtomicU64 = AtomicU64::new(0);

/// Produce a fresh name `<prefix>_<n>` with a globally unique `n`.
pub fn gensym(prefix: &str) -> String {
    let n = COUNTER.fetch_add(1, Ordering::Relaxed) + 1;
    format!("{}_{}", prefix, n)
}

/// Reset the counter. Test hook only.
pub fn reset() {
    COUNTER.store(0, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gensym_unique() {
        let a = gensym("tmp");
        let b = gensym("tmp");
        assert_ne!(a, b);
        assert!(a.starts_with("tmp_"));
    }
}
