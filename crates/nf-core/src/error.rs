//! Construction-time errors. Every data-plane *operation* on an already-built
//! `IndexPool`/`Map`/`FlowTable`/`LoadBalancer` reports failure as
//! `Option`/`bool` — pool-full and unknown-flow are protocol, not errors.
//! Only initial sizing can be invalid, and that's a fatal init-time failure,
//! so it's reported as a `Result`.

use thiserror::Error;

/// Invalid sizing parameters passed to a constructor.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CoreError {
    /// `IndexPool`/`Map`/`FlowTable` was asked for zero capacity.
    #[error("capacity must be greater than zero")]
    ZeroCapacity,

    /// `Map::new` requires a power-of-two capacity.
    #[error("map capacity {0} is not a power of two")]
    CapacityNotPowerOfTwo(usize),

    /// `Map::new` capacity exceeds `2^31 - 1`.
    #[error("map capacity {0} exceeds the maximum of 2^31 - 1")]
    CapacityTooLarge(usize),

    /// `Cht::new` requires `height > 1`.
    #[error("CHT height {0} must be greater than 1")]
    ChtHeightTooSmall(usize),

    /// `Cht::new` requires `gcd(height, backend_capacity) == 1` — coprimality,
    /// not primality, is the constraint that actually guarantees every
    /// backend is reachable in the permutation table.
    #[error("CHT height {height} is not coprime with backend capacity {backend_capacity}")]
    ChtNotCoprime {
        /// Requested bucket count.
        height: usize,
        /// Requested backend slot count.
        backend_capacity: usize,
    },
}
