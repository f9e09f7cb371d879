//! Error taxonomy for the ambient (non-data-plane) surfaces.
//!
//! Data-plane operations in `nf-core` stay `Option`/`bool` — "pool full" and
//! "unknown flow" are protocol, not errors. `thiserror` enums here cover
//! only init-time and configuration failures.

use thiserror::Error;

/// Failures from the typed configuration surface (`Config::get_*`).
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The named key was not present.
    #[error("missing config key: {0}")]
    Missing(String),

    /// The value was present but of the wrong shape/type.
    #[error("config key {key} has the wrong type: {reason}")]
    WrongType {
        /// Offending key.
        key: String,
        /// Human-readable type mismatch description.
        reason: String,
    },

    /// The value failed a semantic check (e.g. device index out of range).
    #[error("config key {key} is invalid: {reason}")]
    Invalid {
        /// Offending key.
        key: String,
        /// Why it's invalid.
        reason: String,
    },

    /// Could not read the backing file.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Could not parse the backing file as JSON.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_json::Error),
}
