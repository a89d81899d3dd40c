//! Configuration for the wavstream player
//!
//! Two layers:
//! 1. **TOML file**: optional `[stream]`, `[output]` and `[logging]` sections,
//!    located through `wavstream_common::config::resolve_config_path`
//! 2. **Command-line flags**: override individual file values
//!
//! Anything left unset falls back to the built-in defaults below.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::info;
use wavstream_common::config::{load_toml, LoggingConfig};

/// Default number of device buffers in the ring
pub const DEFAULT_BUFFER_COUNT: usize = 4;

/// Default seconds of audio held by one buffer
pub const DEFAULT_SECONDS_PER_BUFFER: f32 = 1.0;

/// Default refill tick period
pub const DEFAULT_REFILL_INTERVAL_MS: u64 = 50;

/// Longest buffer accepted; 10 s of 48 kHz stereo 16-bit is under 2 MB per slot
pub const MAX_SECONDS_PER_BUFFER: f32 = 10.0;

/// Settings for one streaming engine instance
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Number of device buffers (N)
    pub buffer_count: usize,

    /// Seconds of audio per buffer slot
    pub seconds_per_buffer: f32,

    /// Period of the refill tick
    pub refill_interval: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            buffer_count: DEFAULT_BUFFER_COUNT,
            seconds_per_buffer: DEFAULT_SECONDS_PER_BUFFER,
            refill_interval: Duration::from_millis(DEFAULT_REFILL_INTERVAL_MS),
        }
    }
}

impl EngineConfig {
    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.buffer_count == 0 {
            return Err(Error::Config("buffer_count must be at least 1".to_string()));
        }
        if !self.seconds_per_buffer.is_finite() || self.seconds_per_buffer <= 0.0 {
            return Err(Error::Config(format!(
                "seconds_per_buffer must be a positive number, got {}",
                self.seconds_per_buffer
            )));
        }
        if self.seconds_per_buffer > MAX_SECONDS_PER_BUFFER {
            return Err(Error::Config(format!(
                "seconds_per_buffer must be at most {}, got {}",
                MAX_SECONDS_PER_BUFFER, self.seconds_per_buffer
            )));
        }
        if self.refill_interval.is_zero() {
            return Err(Error::Config("refill interval must be non-zero".to_string()));
        }
        Ok(())
    }
}

/// Config file contents
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub stream: StreamSection,

    #[serde(default)]
    pub output: OutputSection,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// `[stream]` section
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct StreamSection {
    #[serde(default = "default_buffer_count")]
    pub buffer_count: usize,

    #[serde(default = "default_seconds_per_buffer")]
    pub seconds_per_buffer: f32,

    #[serde(default = "default_refill_interval_ms")]
    pub refill_interval_ms: u64,
}

impl Default for StreamSection {
    fn default() -> Self {
        Self {
            buffer_count: default_buffer_count(),
            seconds_per_buffer: default_seconds_per_buffer(),
            refill_interval_ms: default_refill_interval_ms(),
        }
    }
}

/// `[output]` section
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct OutputSection {
    /// Output device name; the host default when absent
    #[serde(default)]
    pub device: Option<String>,
}

fn default_buffer_count() -> usize {
    DEFAULT_BUFFER_COUNT
}

fn default_seconds_per_buffer() -> f32 {
    DEFAULT_SECONDS_PER_BUFFER
}

fn default_refill_interval_ms() -> u64 {
    DEFAULT_REFILL_INTERVAL_MS
}

impl TomlConfig {
    /// Load from `path`, or use defaults when there is no file to load
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let config: TomlConfig = load_toml(path)?;
                info!("Loaded configuration from {}", path.display());
                Ok(config)
            }
            None => {
                info!("No config file found, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            buffer_count: self.stream.buffer_count,
            seconds_per_buffer: self.stream.seconds_per_buffer,
            refill_interval: Duration::from_millis(self.stream.refill_interval_ms),
        }
    }
}
