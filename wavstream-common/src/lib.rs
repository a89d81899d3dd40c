//! # wavstream common library
//!
//! Shared code for the wavstream crates:
//! - Common error type
//! - Configuration file discovery and TOML loading
//! - Playback state and stream event types
//! - Broadcast event bus

pub mod config;
pub mod error;
pub mod events;

pub use error::{Error, Result};
pub use events::{EventBus, PlaybackState, StreamEvent};
