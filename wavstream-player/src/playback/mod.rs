//! Playback: buffer rotation, refill scheduling and the host-facing player

pub mod cursor;
pub mod engine;
pub mod player;
pub mod pool;
pub mod refill;

pub use engine::{RefillReport, StreamingBufferEngine};
pub use player::StreamPlayer;
pub use pool::SlotStatus;
pub use refill::RefillScheduler;
