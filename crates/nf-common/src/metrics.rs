//! Lock-free per-worker counters.

use std::sync::atomic::{AtomicU64, Ordering};

/// A single lock-free counter.
#[derive(Debug, Default)]
pub struct Counter(AtomicU64);

impl Counter {
    /// New counter starting at zero.
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Increment by one.
    #[inline(always)]
    pub fn inc(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    /// Current value.
    #[inline(always)]
    pub fn get(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }
}

/// The counters every NF exposes: packets seen, transmitted, and dropped,
/// plus flow-table hit/miss so operators can size `max_flows`.
#[derive(Debug, Default)]
pub struct Counters {
    /// Packets received from any device.
    pub rx_packets: Counter,
    /// Packets transmitted.
    pub tx_packets: Counter,
    /// Packets dropped (parse failure, policy, full tables).
    pub dropped: Counter,
    /// Flow/NAT/LB table lookups that hit an existing entry.
    pub flow_hits: Counter,
    /// Flow/NAT/LB table lookups that missed and needed a new entry.
    pub flow_misses: Counter,
}
