//! The shared building blocks behind the NF family's data plane.
//!
//! Two formally-specified primitives — [`IndexPool`], an expiring index
//! allocator, and [`Map`], an open-addressed hash table with chained probe
//! counters — plus two small state machines that compose them:
//! [`FlowTable`] (NAT port allocation) and [`LoadBalancer`] (stateful L4
//! load balancing with consistent-hash backend selection via [`Cht`]).
//!
//! Every type here is single-writer: one instance belongs to exactly one
//! data-plane worker (shared-nothing per core), so none of it needs
//! atomics or locks.

#![warn(missing_docs)]

pub mod cht;
pub mod error;
pub mod flow_table;
pub mod hash;
pub mod index_pool;
pub mod load_balancer;
pub mod map;

pub use cht::Cht;
pub use error::CoreError;
pub use flow_table::FlowTable;
pub use index_pool::IndexPool;
pub use load_balancer::{Backend, LoadBalancer};
pub use map::{Map, MapKey};
