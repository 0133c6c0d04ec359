//! Signal and order id allocation.
//!
//! Per the redesign notes this collapses to a dedicated allocator type the
//! engine owns a single instance of and hands out to the observer, the exit
//! handler, and the order manager - nobody else can accidentally reuse a
//! counter or race on it.

use std::sync::atomic::{AtomicU64, Ordering};

/// Allocates signal ids as a 16-hex-digit random string, matching the
/// original's `get_signal_id(digits=16)` (`uuid4().hex[:16]`). A bare
/// rolling counter can't satisfy "globally unique within a trading day"
/// once a day sees more than a few thousand signals, so each id is drawn
/// from a fresh v4 UUID rather than incremented.
#[derive(Debug, Default)]
pub struct SignalIdAllocator;

impl SignalIdAllocator {
    pub fn new() -> Self {
        Self
    }

    pub fn next(&self) -> String {
        uuid::Uuid::new_v4().simple().to_string()[..16].to_string()
    }
}

/// Allocates order ids (5 hex digits) and trade seqnos (12 hex digits),
/// matching `get_order_id` / `get_seqno`.
#[derive(Debug, Default)]
pub struct OrderIdAllocator {
    counter: AtomicU64,
}

impl OrderIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_order_id(&self) -> String {
        let value = self.counter.fetch_add(1, Ordering::Relaxed) & 0xF_FFFF;
        format!("{value:05x}")
    }

    pub fn next_seqno(&self) -> String {
        let value = self.counter.fetch_add(1, Ordering::Relaxed) & 0xFFF_FFFF_FFFF;
        format!("{value:012x}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signal_ids_are_sixteen_hex_digits_and_distinct() {
        let alloc = SignalIdAllocator::new();
        let a = alloc.next();
        let b = alloc.next();
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn order_ids_are_five_hex_digits() {
        let alloc = OrderIdAllocator::new();
        let id = alloc.next_order_id();
        assert_eq!(id.len(), 5);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
