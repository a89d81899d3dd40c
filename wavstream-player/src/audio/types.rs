//! Core audio data types
//!
//! Defines the PCM format description derived from a wave header and the
//! frame type handed to audio output callbacks.

use crate::error::{Error, Result};
use std::time::Duration;

/// Channel layouts the streaming engine accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelLayout {
    Mono,
    Stereo,
}

impl ChannelLayout {
    pub fn count(self) -> u16 {
        match self {
            ChannelLayout::Mono => 1,
            ChannelLayout::Stereo => 2,
        }
    }
}

/// Sample depths the streaming engine accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleDepth {
    /// 8-bit unsigned PCM (silence = 128)
    U8,
    /// 16-bit signed little-endian PCM
    I16,
}

impl SampleDepth {
    pub fn bits(self) -> u16 {
        match self {
            SampleDepth::U8 => 8,
            SampleDepth::I16 => 16,
        }
    }

    pub fn bytes(self) -> usize {
        match self {
            SampleDepth::U8 => 1,
            SampleDepth::I16 => 2,
        }
    }
}

/// Format tag passed to the device with every buffer upload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatTag {
    Mono8,
    Mono16,
    Stereo8,
    Stereo16,
}

/// Immutable PCM format of one stream.
///
/// Derived once when the container is opened; never changes for the lifetime
/// of the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: ChannelLayout,
    pub depth: SampleDepth,
}

impl AudioFormat {
    /// Validate raw header values and build a format.
    ///
    /// # Errors
    /// `UnsupportedFormat` unless the combination is one of mono/stereo × 8/16-bit
    /// with a non-zero sample rate.
    pub fn new(sample_rate: u32, channel_count: u16, bits_per_sample: u16) -> Result<Self> {
        let channels = match channel_count {
            1 => ChannelLayout::Mono,
            2 => ChannelLayout::Stereo,
            n => {
                return Err(Error::UnsupportedFormat(format!(
                    "{} channels (only mono and stereo are supported)",
                    n
                )))
            }
        };

        let depth = match bits_per_sample {
            8 => SampleDepth::U8,
            16 => SampleDepth::I16,
            n => {
                return Err(Error::UnsupportedFormat(format!(
                    "{} bits per sample (only 8 and 16 are supported)",
                    n
                )))
            }
        };

        if sample_rate == 0 {
            return Err(Error::UnsupportedFormat("sample rate of 0 Hz".to_string()));
        }

        Ok(Self {
            sample_rate,
            channels,
            depth,
        })
    }

    pub fn channel_count(&self) -> u16 {
        self.channels.count()
    }

    pub fn bits_per_sample(&self) -> u16 {
        self.depth.bits()
    }

    /// Bytes in one frame (one sample for every channel)
    pub fn bytes_per_frame(&self) -> usize {
        self.channels.count() as usize * self.depth.bytes()
    }

    /// Bytes of PCM per second of audio
    pub fn bytes_per_second(&self) -> u64 {
        self.sample_rate as u64 * self.bytes_per_frame() as u64
    }

    /// Capacity in bytes of one device buffer holding `seconds_per_buffer` of audio.
    ///
    /// Always a whole number of frames; fractional frame counts round to nearest.
    /// Returns `None` when the size is not representable in `usize`.
    pub fn buffer_capacity(&self, seconds_per_buffer: f32) -> Option<usize> {
        let frames = (self.sample_rate as f64 * seconds_per_buffer as f64).round();
        if !frames.is_finite() || frames < 0.0 || frames >= usize::MAX as f64 {
            return None;
        }
        (frames as usize).checked_mul(self.bytes_per_frame())
    }

    /// Playback time represented by `bytes` of PCM
    pub fn duration_of(&self, bytes: u64) -> Duration {
        Duration::from_secs_f64(bytes as f64 / self.bytes_per_second() as f64)
    }

    pub fn tag(&self) -> FormatTag {
        match (self.channels, self.depth) {
            (ChannelLayout::Mono, SampleDepth::U8) => FormatTag::Mono8,
            (ChannelLayout::Mono, SampleDepth::I16) => FormatTag::Mono16,
            (ChannelLayout::Stereo, SampleDepth::U8) => FormatTag::Stereo8,
            (ChannelLayout::Stereo, SampleDepth::I16) => FormatTag::Stereo16,
        }
    }

    /// Convert one frame of raw PCM into a float frame.
    ///
    /// `bytes` must hold exactly `bytes_per_frame()` bytes.
    pub fn decode_frame(&self, bytes: &[u8]) -> AudioFrame {
        let sample = |index: usize| -> f32 {
            match self.depth {
                SampleDepth::U8 => (bytes[index] as f32 - 128.0) / 128.0,
                SampleDepth::I16 => {
                    let offset = index * 2;
                    i16::from_le_bytes([bytes[offset], bytes[offset + 1]]) as f32 / 32768.0
                }
            }
        };

        match self.channels {
            ChannelLayout::Mono => AudioFrame::from_mono(sample(0)),
            ChannelLayout::Stereo => AudioFrame::from_stereo(sample(0), sample(1)),
        }
    }
}

impl FormatTag {
    /// Split a tag back into its channel layout and sample depth
    pub fn layout(self) -> (ChannelLayout, SampleDepth) {
        match self {
            FormatTag::Mono8 => (ChannelLayout::Mono, SampleDepth::U8),
            FormatTag::Mono16 => (ChannelLayout::Mono, SampleDepth::I16),
            FormatTag::Stereo8 => (ChannelLayout::Stereo, SampleDepth::U8),
            FormatTag::Stereo16 => (ChannelLayout::Stereo, SampleDepth::I16),
        }
    }
}

/// AudioFrame represents a single stereo sample (one frame of audio).
///
/// Used for passing audio data between the software device and the output callback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioFrame {
    /// Left channel sample
    pub left: f32,

    /// Right channel sample
    pub right: f32,
}

impl AudioFrame {
    /// Create a silent frame (0.0, 0.0)
    pub fn zero() -> Self {
        AudioFrame { left: 0.0, right: 0.0 }
    }

    /// Create a frame from mono sample (duplicate to both channels)
    pub fn from_mono(sample: f32) -> Self {
        AudioFrame { left: sample, right: sample }
    }

    /// Create a frame from left and right samples
    pub fn from_stereo(left: f32, right: f32) -> Self {
        AudioFrame { left, right }
    }

    /// Apply volume scaling to both channels
    pub fn apply_volume(&mut self, volume: f32) {
        self.left *= volume;
        self.right *= volume;
    }

    /// Clamp samples to valid range [-1.0, 1.0] to prevent clipping
    pub fn clamp(&mut self) {
        self.left = self.left.clamp(-1.0, 1.0);
        self.right = self.right.clamp(-1.0, 1.0);
    }
}
