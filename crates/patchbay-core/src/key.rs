//! Barrier identity
//!
//! Keys are assigned by the coordinator from a monotonic counter and are
//! never reused for the coordinator's lifetime. The counter is the whole
//! uniqueness contract; callers treat keys as opaque handles.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Barrier identity - the sole handle for removing a registered barrier
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BarrierKey(pub u64);

impl BarrierKey {
    #[inline]
    pub fn new(id: u64) -> Self {
        BarrierKey(id)
    }

    #[inline]
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for BarrierKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Barrier({})", self.0)
    }
}

impl fmt::Display for BarrierKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic key generator, one per coordinator
#[derive(Debug)]
pub struct KeyGenerator {
    next: AtomicU64,
}

impl Default for KeyGenerator {
    fn default() -> Self {
        KeyGenerator::new()
    }
}

impl KeyGenerator {
    pub fn new() -> Self {
        KeyGenerator {
            next: AtomicU64::new(1),
        }
    }

    /// Issue a fresh key, distinct from every key issued before
    #[inline]
    pub fn issue(&self) -> BarrierKey {
        BarrierKey(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_unique_and_ordered() {
        let gen = KeyGenerator::new();
        let a = gen.issue();
        let b = gen.issue();
        let c = gen.issue();

        assert_ne!(a, b);
        assert_ne!(b, c);
        assert!(a < b && b < c);
    }

    #[test]
    fn test_key_display() {
        let key = BarrierKey::new(42);
        assert_eq!(format!("{}", key), "42");
        assert_eq!(format!("{:?}", key), "Barrier(42)");
    }
}
