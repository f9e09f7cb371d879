//! Typed configuration surface: values fetched by name and type.
//!
//! Shaped as a flat key→value lookup rather than a struct with named
//! fields, since each NF needs a different handful of keys.

use crate::error::ConfigError;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;

/// A flat, typed key-value configuration surface.
#[derive(Debug, Clone, Default)]
pub struct Config {
    values: HashMap<String, Value>,
}

impl Config {
    /// Build a config from an already-parsed JSON object.
    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        let obj = value.as_object().ok_or_else(|| ConfigError::WrongType {
            key: "<root>".into(),
            reason: "expected a JSON object".into(),
        })?;
        Ok(Self {
            values: obj.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        })
    }

    /// Load configuration from a JSON file on disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "loading configuration");
        let content = std::fs::read_to_string(path)?;
        let value: Value = serde_json::from_str(&content)?;
        Self::from_value(value)
    }

    fn get(&self, key: &str) -> Result<&Value, ConfigError> {
        self.values
            .get(key)
            .ok_or_else(|| ConfigError::Missing(key.to_string()))
    }

    /// Fetch a `u16` configuration value.
    pub fn get_u16(&self, key: &str) -> Result<u16, ConfigError> {
        self.get(key)?
            .as_u64()
            .and_then(|v| u16::try_from(v).ok())
            .ok_or_else(|| ConfigError::WrongType {
                key: key.into(),
                reason: "expected a u16".into(),
            })
    }

    /// Fetch a `u32` configuration value.
    pub fn get_u32(&self, key: &str) -> Result<u32, ConfigError> {
        self.get(key)?
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| ConfigError::WrongType {
                key: key.into(),
                reason: "expected a u32".into(),
            })
    }

    /// Fetch a `u64` configuration value.
    pub fn get_u64(&self, key: &str) -> Result<u64, ConfigError> {
        self.get(key)?.as_u64().ok_or_else(|| ConfigError::WrongType {
            key: key.into(),
            reason: "expected a u64".into(),
        })
    }

    /// Fetch a `size` (capacity-like `usize`) configuration value.
    pub fn get_size(&self, key: &str) -> Result<usize, ConfigError> {
        self.get_u64(key).map(|v| v as usize)
    }

    /// Fetch a nanosecond `time` configuration value.
    pub fn get_time(&self, key: &str) -> Result<i64, ConfigError> {
        self.get(key)?.as_i64().ok_or_else(|| ConfigError::WrongType {
            key: key.into(),
            reason: "expected an i64 time value".into(),
        })
    }

    /// Fetch a device index, validated against the number of devices the NF
    /// was started with.
    pub fn get_device(&self, key: &str, device_count: u16) -> Result<u16, ConfigError> {
        let device = self.get_u16(key)?;
        if device >= device_count {
            return Err(ConfigError::Invalid {
                key: key.into(),
                reason: format!("device {device} is out of range for {device_count} devices"),
            });
        }
        Ok(device)
    }
}
