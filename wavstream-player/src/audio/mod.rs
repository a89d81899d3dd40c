//! Audio subsystem: wave container parsing, the device abstraction and its
//! software implementation

pub mod device;
#[cfg(feature = "cpal-output")]
pub mod output;
pub mod software;
pub mod types;
pub mod wav;

pub use device::{AudioDevice, BufferHandle, VoiceHandle, VoiceState};
#[cfg(feature = "cpal-output")]
pub use output::AudioOutput;
pub use software::SoftwareDevice;
pub use types::{AudioFormat, AudioFrame, ChannelLayout, FormatTag, SampleDepth};
pub use wav::{WavContainerReader, WavLayout};
