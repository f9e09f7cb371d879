//! Consistent-hash permutation table, in the spirit of Maglev's
//! backend-selection table: a precomputed per-bucket preference order over
//! backend slots, so a flow can fail over to the next-preferred backend
//! without reshuffling every other flow's assignment.

use crate::error::CoreError;
use crate::hash::seeded_hash;

const SEED_OFFSET: u64 = 0x5bd1_e995_c2b2_ae35;
const SEED_SHIFT: u64 = 0x27d4_eb2f_1656_67c5;

fn gcd(mut a: usize, mut b: usize) -> usize {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Consistent hash table: a precomputed mapping from a flow's hash bucket to
/// an ordered list of backend slots to try, in priority order.
///
/// `height` (`H`) must be greater than 1 and coprime with `backend_capacity`
/// (`M`) — coprimality, not primality, is the weaker and sufficient
/// constraint this implementation enforces (see DESIGN.md).
#[derive(Debug)]
pub struct Cht {
    height: usize,
    /// `order[h]` is a permutation of `[0, backend_capacity)`: the order in
    /// which backend slots should be tried for bucket `h`.
    order: Vec<Vec<usize>>,
}

impl Cht {
    /// Build the permutation table for `backend_capacity` backend slots and
    /// `height` buckets.
    pub fn new(backend_capacity: usize, height: usize) -> Result<Self, CoreError> {
        if backend_capacity == 0 {
            return Err(CoreError::ZeroCapacity);
        }
        if height <= 1 {
            return Err(CoreError::ChtHeightTooSmall(height));
        }
        if gcd(height, backend_capacity) != 1 {
            return Err(CoreError::ChtNotCoprime {
                height,
                backend_capacity,
            });
        }

        let m = backend_capacity;
        let h = height;

        // Per-backend offset/shift: shift must be in [1, H-1] and, since H is
        // coprime with every value in that range only when H is prime, we
        // additionally require gcd(shift, H) == 1 so each backend's sequence
        // is a bijection over the H buckets.
        let mut offset = vec![0u64; m];
        let mut shift = vec![0u64; m];
        for b in 0..m {
            offset[b] = seeded_hash(b as u64, SEED_OFFSET) % h as u64;
            let mut s = seeded_hash(b as u64, SEED_SHIFT) % (h as u64 - 1) + 1;
            while gcd(s as usize, h) != 1 {
                s = (s % (h as u64 - 1)) + 1;
            }
            shift[b] = s;
        }

        let permute = |b: usize, j: u64| -> usize { ((offset[b] + j * shift[b]) % h as u64) as usize };

        // Classic Maglev-style population, generalized to rank every
        // backend in every bucket (not just the first winner): each backend
        // walks its own bijective bucket sequence; whenever its current
        // candidate bucket's list is already full it advances to its next
        // round, resolving collisions by linear probe.
        let mut next_round = vec![0u64; m];
        let mut order: Vec<Vec<usize>> = vec![Vec::with_capacity(m); h];
        let mut filled = 0usize;
        let total = m * h;
        while filled < total {
            for b in 0..m {
                loop {
                    let j = next_round[b] % h as u64;
                    next_round[b] += 1;
                    let bucket = permute(b, j);
                    if order[bucket].len() < m {
                        order[bucket].push(b);
                        filled += 1;
                        break;
                    }
                }
            }
        }

        Ok(Self { height: h, order })
    }

    /// Number of buckets.
    pub fn height(&self) -> usize {
        self.height
    }

    /// The full backend-slot preference order for a given flow hash's
    /// bucket, most preferred first.
    pub fn bucket_order(&self, flow_hash: u64) -> &[usize] {
        &self.order[(flow_hash as usize) % self.height]
    }

    /// Scan `flow_hash`'s bucket order and return the first backend slot
    /// `used_check` reports as available, or `None` if every slot in the
    /// bucket is currently unavailable.
    pub fn find_preferred_available_backend(
        &self,
        flow_hash: u64,
        mut used_check: impl FnMut(usize) -> bool,
    ) -> Option<usize> {
        self.bucket_order(flow_hash).iter().copied().find(|&b| used_check(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn rejects_non_coprime_height() {
        // height=4, backend_capacity=2 -> gcd=2, rejected.
        assert!(matches!(
            Cht::new(2, 4),
            Err(CoreError::ChtNotCoprime { .. })
        ));
    }

    #[test]
    fn rejects_tiny_height() {
        assert!(matches!(Cht::new(3, 1), Err(CoreError::ChtHeightTooSmall(1))));
    }

    /// Every bucket's order is a permutation of `[0, backend_cap)`.
    #[test]
    fn every_bucket_is_a_full_permutation() {
        let cht = Cht::new(5, 7).unwrap();
        for h in 0..7 {
            let order = cht.bucket_order(h as u64);
            let set: HashSet<_> = order.iter().copied().collect();
            assert_eq!(order.len(), 5);
            assert_eq!(set.len(), 5);
            assert_eq!(set, (0..5).collect());
        }
    }

    /// Identical parameters produce an identical table.
    #[test]
    fn deterministic_across_instances() {
        let a = Cht::new(3, 7).unwrap();
        let b = Cht::new(3, 7).unwrap();
        for h in 0..7 {
            assert_eq!(a.bucket_order(h as u64), b.bucket_order(h as u64));
        }
    }

    #[test]
    fn skips_unavailable_backends_in_priority_order() {
        let cht = Cht::new(4, 7).unwrap();
        let order = cht.bucket_order(2).to_vec();
        let preferred = order[0];
        // Only the second-preferred backend is marked available.
        let second = order[1];
        let found = cht.find_preferred_available_backend(2, |b| b == second);
        assert_eq!(found, Some(second));
        assert_ne!(found, Some(preferred));
    }

    #[test]
    fn returns_none_when_bucket_fully_unavailable() {
        let cht = Cht::new(4, 7).unwrap();
        assert_eq!(cht.find_preferred_available_backend(0, |_| false), None);
    }
}
