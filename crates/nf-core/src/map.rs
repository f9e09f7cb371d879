//! Open-addressed hash map with chained probe counters.
//!
//! This map owns `Copy` key values directly rather than borrowing
//! caller-owned key memory: idiomatic safe Rust has no sound way to store a
//! borrowed pointer here without threading a lifetime parameter through
//! every composing type (`FlowTable`, `LoadBalancer`), and the keys in this
//! domain are small and `Copy` (13-byte flow tuples, 4-byte IPs, 6-byte MAC
//! addresses), so owning them is free. This also makes
//! `busy == 0 ⇒ key_opt == none` hold by construction (`Option::None`)
//! rather than by a separately-tracked bit.

use crate::error::CoreError;
use crate::hash::generic_hash;

/// A key type `Map` can store: `Copy` (so the map can own it cheaply) plus a
/// fixed-width byte encoding for hashing and bytewise comparison.
pub trait MapKey<const N: usize>: Copy + Eq {
    /// Canonical byte encoding. Bytewise equality of this is the key's
    /// identity.
    fn to_bytes(&self) -> [u8; N];
}

impl MapKey<4> for u32 {
    fn to_bytes(&self) -> [u8; 4] {
        self.to_ne_bytes()
    }
}

impl MapKey<6> for [u8; 6] {
    fn to_bytes(&self) -> [u8; 6] {
        *self
    }
}

/// Fixed-capacity, open-addressed hash table from `K` to `u64` values.
///
/// Capacity is a power of two, `0 < C ≤ 2^31 - 1`. Single writer; no
/// resizing after construction.
#[derive(Debug, PartialEq)]
pub struct Map<K, const N: usize> {
    mask: usize,
    keys: Vec<Option<K>>,
    hashes: Vec<u32>,
    chains: Vec<u32>,
    values: Vec<u64>,
    size: usize,
}

impl<K: MapKey<N>, const N: usize> Map<K, N> {
    /// Allocate a map of `capacity` slots (must be a power of two, and
    /// `<= 2^31 - 1`).
    pub fn new(capacity: usize) -> Result<Self, CoreError> {
        if capacity == 0 {
            return Err(CoreError::ZeroCapacity);
        }
        if !capacity.is_power_of_two() {
            return Err(CoreError::CapacityNotPowerOfTwo(capacity));
        }
        if capacity > (i32::MAX as usize) {
            return Err(CoreError::CapacityTooLarge(capacity));
        }

        Ok(Self {
            mask: capacity - 1,
            keys: vec![None; capacity],
            hashes: vec![0; capacity],
            chains: vec![0; capacity],
            values: vec![0; capacity],
            size: 0,
        })
    }

    /// Table capacity (always a power of two).
    pub fn capacity(&self) -> usize {
        self.mask + 1
    }

    /// Number of keys currently present.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Whether the map has no keys.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    #[inline]
    fn loop_idx(&self, hash: u32) -> usize {
        (hash as usize) & self.mask
    }

    /// Probe from `hash`'s home slot; return the slot index holding `key`,
    /// or `None` once a zero chain counter proves it absent, without
    /// scanning the whole table.
    fn find_key(&self, key: &K, hash: u32) -> Option<usize> {
        let start = self.loop_idx(hash);
        for step in 0..self.capacity() {
            let j = (start + step) & self.mask;
            if let Some(k) = &self.keys[j] {
                if self.hashes[j] == hash && k == key {
                    return Some(j);
                }
            }
            if self.chains[j] == 0 {
                return None;
            }
        }
        None
    }

    /// Look up a key's value.
    pub fn get(&self, key: &K) -> Option<u64> {
        let hash = generic_hash(&key.to_bytes());
        self.find_key(key, hash).map(|i| self.values[i])
    }

    /// Walk from `start`, incrementing the chain counter of every occupied
    /// slot passed over, and return the first empty slot.
    fn find_empty(&mut self, start: usize) -> usize {
        let mut j = start;
        loop {
            if self.keys[j].is_none() {
                return j;
            }
            self.chains[j] += 1;
            j = (j + 1) & self.mask;
        }
    }

    /// Insert `key -> value`. Caller must guarantee `key` is absent and
    /// `len() < capacity()`; violating this is a contract violation (UB in
    /// the original, a `debug_assert` here).
    pub fn set(&mut self, key: K, value: u64) {
        debug_assert!(self.size < self.capacity(), "Map::set on a full map");
        debug_assert!(self.get(&key).is_none(), "Map::set of an already-present key");

        let hash = generic_hash(&key.to_bytes());
        let start = self.loop_idx(hash);
        let i = self.find_empty(start);

        self.keys[i] = Some(key);
        self.hashes[i] = hash;
        self.values[i] = value;
        self.size += 1;
    }

    /// Remove `key`. Caller must guarantee `key` is present; violating this
    /// is a contract violation (UB in the original, a `debug_assert` here).
    pub fn remove(&mut self, key: &K) {
        let hash = generic_hash(&key.to_bytes());
        let start = self.loop_idx(hash);
        let mut j = start;
        loop {
            let matches = matches!(&self.keys[j], Some(k) if self.hashes[j] == hash && k == key);
            if matches {
                self.keys[j] = None;
                self.size -= 1;
                return;
            }
            debug_assert!(self.chains[j] > 0, "Map::remove of an absent key");
            self.chains[j] -= 1;
            j = (j + 1) & self.mask;
        }
    }
}
