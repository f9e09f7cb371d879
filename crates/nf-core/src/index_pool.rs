//! Expiring index allocator: a fixed-capacity pool of indices, each with a
//! last-used timestamp and a time-based expiration policy. Represented as a
//! doubly-linked chain over two parallel index arrays rather than a list of
//! heap nodes, so borrowing, refreshing, and expiring are all allocation-free.

use crate::error::CoreError;
use nf_common::clock::{Time, TIME_MAX};

/// `young(now, exp, t) ≡ now < exp ∨ now − exp ≤ t`.
#[inline]
fn young(now: Time, expiration: Time, last_used: Time) -> bool {
    now < expiration || now - expiration <= last_used
}

#[derive(Debug, Clone, Copy)]
struct Link {
    prev: Option<usize>,
    next: Option<usize>,
}

const EMPTY_LINK: Link = Link { prev: None, next: None };

/// A fixed-capacity allocator of `[0, capacity)` indices with per-index
/// last-used timestamps and a time-based expiration policy.
///
/// Single-writer: one `IndexPool` belongs to exactly one data-plane worker.
#[derive(Debug)]
pub struct IndexPool {
    expiration: Time,
    timestamps: Vec<Time>,
    links: Vec<Link>,
    head_allocated: Option<usize>,
    tail_allocated: Option<usize>,
    head_free: Option<usize>,
}

impl IndexPool {
    /// Allocate a pool of `capacity` indices with the given expiration
    /// window. All indices start free.
    pub fn new(capacity: usize, expiration: Time) -> Result<Self, CoreError> {
        if capacity == 0 {
            return Err(CoreError::ZeroCapacity);
        }

        let mut links = vec![EMPTY_LINK; capacity];
        for i in 0..capacity {
            links[i].next = if i + 1 < capacity { Some(i + 1) } else { None };
            links[i].prev = if i > 0 { Some(i - 1) } else { None };
        }

        Ok(Self {
            expiration,
            timestamps: vec![TIME_MAX; capacity],
            links,
            head_allocated: None,
            tail_allocated: None,
            head_free: Some(0),
        })
    }

    /// Number of indices this pool manages.
    pub fn capacity(&self) -> usize {
        self.timestamps.len()
    }

    fn detach_free(&mut self, i: usize) {
        let Link { prev, next } = self.links[i];
        match prev {
            Some(p) => self.links[p].next = next,
            None => self.head_free = next,
        }
        if let Some(n) = next {
            self.links[n].prev = prev;
        }
    }

    fn push_tail_allocated(&mut self, i: usize) {
        self.links[i] = Link { prev: self.tail_allocated, next: None };
        match self.tail_allocated {
            Some(t) => self.links[t].next = Some(i),
            None => self.head_allocated = Some(i),
        }
        self.tail_allocated = Some(i);
    }

    fn detach_allocated(&mut self, i: usize) {
        let Link { prev, next } = self.links[i];
        match prev {
            Some(p) => self.links[p].next = next,
            None => self.head_allocated = next,
        }
        match next {
            Some(n) => self.links[n].prev = prev,
            None => self.tail_allocated = prev,
        }
    }

    fn push_head_free(&mut self, i: usize) {
        self.links[i] = Link { prev: None, next: self.head_free };
        if let Some(h) = self.head_free {
            self.links[h].prev = Some(i);
        }
        self.head_free = Some(i);
    }

    /// Borrow a free or expired index. Returns `(index, reused)`: `reused`
    /// is `true` iff the index came from recycling a stale allocated entry
    /// rather than the free list. Returns `None` iff the pool is full of
    /// young entries.
    pub fn borrow(&mut self, now: Time) -> Option<(usize, bool)> {
        if let Some(i) = self.head_free {
            self.detach_free(i);
            self.timestamps[i] = now;
            self.push_tail_allocated(i);
            return Some((i, false));
        }

        let head = self.head_allocated?;
        if young(now, self.expiration, self.timestamps[head]) {
            return None;
        }

        self.detach_allocated(head);
        self.timestamps[head] = now;
        self.push_tail_allocated(head);
        Some((head, true))
    }

    /// Set `index`'s last-used time to `now` and move it to the tail of the
    /// allocated (LRU) list. `index` must currently be allocated.
    pub fn refresh(&mut self, now: Time, index: usize) {
        debug_assert!(self.timestamps[index] != TIME_MAX, "refresh of a free index");
        self.detach_allocated(index);
        self.timestamps[index] = now;
        self.push_tail_allocated(index);
    }

    /// Whether `index` is allocated and not yet expired at `now`.
    pub fn used(&self, now: Time, index: usize) -> bool {
        let t = self.timestamps[index];
        t != TIME_MAX && young(now, self.expiration, t)
    }

    /// If the oldest allocated index's last-used time is `<= threshold`,
    /// detach and free it, returning it. Callers loop this to drain all
    /// expired entries.
    pub fn expire(&mut self, threshold: Time) -> Option<usize> {
        let head = self.head_allocated?;
        if self.timestamps[head] > threshold {
            return None;
        }
        self.detach_allocated(head);
        self.timestamps[head] = TIME_MAX;
        self.push_head_free(head);
        Some(head)
    }

    /// Free `index` unconditionally, regardless of its expiration state.
    pub fn return_index(&mut self, index: usize) {
        if self.timestamps[index] == TIME_MAX {
            return;
        }
        self.detach_allocated(index);
        self.timestamps[index] = TIME_MAX;
        self.push_head_free(index);
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug, Clone)]
    enum Op {
        Borrow(Time),
        Refresh(Time, usize),
        Expire(Time),
        Return(usize),
    }

    fn op_strategy(capacity: usize) -> impl Strategy<Value = Op> {
        prop_oneof![
            (0i64..200).prop_map(Op::Borrow),
            (0i64..200, 0..capacity).prop_map(|(t, i)| Op::Refresh(t, i)),
            (0i64..200).prop_map(Op::Expire),
            (0..capacity).prop_map(Op::Return),
        ]
    }

    proptest! {
        /// A `borrow`ed index is immediately `used` at the time it was
        /// borrowed, and two distinct `borrow` calls never return the same
        /// index while both are still young.
        #[test]
        fn borrowed_index_is_immediately_used(
            ops in proptest::collection::vec(op_strategy(4), 0..64)
        ) {
            let mut pool = IndexPool::new(4, 50).unwrap();
            let mut live_since: Vec<Option<Time>> = vec![None; 4];

            for op in ops {
                match op {
                    Op::Borrow(t) => {
                        if let Some((i, _)) = pool.borrow(t) {
                            prop_assert!(pool.used(t, i));
                            live_since[i] = Some(t);
                        }
                    }
                    Op::Refresh(t, i) => {
                        if live_since[i].is_some() {
                            pool.refresh(t, i);
                            prop_assert!(pool.used(t, i));
                            live_since[i] = Some(t);
                        }
                    }
                    Op::Expire(threshold) => {
                        if let Some(i) = pool.expire(threshold) {
                            prop_assert!(!pool.used(threshold, i));
                            live_since[i] = None;
                        }
                    }
                    Op::Return(i) => {
                        pool.return_index(i);
                        live_since[i] = None;
                    }
                }
            }
        }

        /// `expire` never reclaims an index that was just (re)borrowed
        /// strictly after the expiration threshold.
        #[test]
        fn expire_never_reclaims_a_freshly_borrowed_index(
            borrow_at in 0i64..100,
            gap in 1i64..50,
        ) {
            let mut pool = IndexPool::new(1, 10).unwrap();
            let (i, _) = pool.borrow(borrow_at).unwrap();
            // threshold strictly before borrow_at: the index must survive.
            prop_assert_eq!(pool.expire(borrow_at - gap), None);
            prop_assert!(pool.used(borrow_at, i));
        }
    }
}
