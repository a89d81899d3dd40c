//! # wavstream player library
//!
//! Streams uncompressed PCM wave files of any length through a small, fixed
//! ring of device buffers, so memory use stays constant no matter how long
//! the file is.
//!
//! **Components:**
//! - [`audio::wav::WavContainerReader`]: locates the sample data and derives its format
//! - [`playback::StreamingBufferEngine`]: buffer rotation and the Start/Pause/Stop state machine
//! - [`playback::RefillScheduler`]: periodic refill tick on a tokio interval
//! - [`playback::StreamPlayer`]: async facade owning the per-instance lock
//! - [`audio::device::AudioDevice`]: the queue-based device the engine drives

pub mod audio;
pub mod config;
pub mod error;
pub mod playback;

pub use error::{Error, Result};
