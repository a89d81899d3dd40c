//! Error types for wavstream-player
//!
//! Defines module-specific error types using thiserror for clear error propagation.

use thiserror::Error;

/// Main error type for the streaming player
#[derive(Error, Debug)]
pub enum Error {
    /// RIFF/WAVE container could not be parsed (bad preamble, truncated
    /// header, or no `data` chunk before end of stream)
    #[error("Malformed container: {0}")]
    MalformedContainer(String),

    /// Sample layout the device cannot accept verbatim
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Device refused to create buffers or a voice
    #[error("Device allocation error: {0}")]
    DeviceAllocation(String),

    /// Any other device call failure
    #[error("Audio device error: {0}")]
    Device(String),

    /// Invalid engine configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Errors from the shared library (config file loading)
    #[error(transparent)]
    Common(#[from] wavstream_common::Error),
}

/// Convenience Result type using the player Error
pub type Result<T> = std::result::Result<T, Error>;
