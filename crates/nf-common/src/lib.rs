//! Shared types for the NF family: clock, flow key, config surface, errors.
//!
//! The thin layer every network function and every `nf-core` consumer
//! depends on, with nothing data-plane-specific in it.

#![warn(missing_docs)]

pub mod clock;
pub mod config;
pub mod error;
pub mod flow;
pub mod metrics;

pub use clock::{Clock, SystemClock, Time, TIME_MAX};
pub use config::Config;
pub use error::ConfigError;
pub use flow::{FlowKey, FLOW_KEY_SIZE};
pub use metrics::Counters;
