//! Abstract audio device interface
//!
//! The streaming engine talks to the audio backend only through this trait.
//! The model is a queue-consuming voice in the style of OpenAL sources:
//!
//! - Buffers are allocated once and identified by opaque handles.
//! - PCM bytes are uploaded into a buffer together with a format tag and rate.
//! - Buffers are queued on a voice and played in queue order.
//! - A played buffer becomes *processed*; it stays at the head of the voice's
//!   queue until the caller unqueues it.
//! - Stopping a voice marks every queued buffer processed.
//! - A voice whose queue runs dry transitions to `Stopped` by itself.
//!
//! The host process opens and configures the device once at startup and hands
//! it to the engine; the engine never opens a device context itself.

use crate::audio::types::FormatTag;
use crate::error::Result;

/// Device-assigned identifier of one PCM buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferHandle(pub u32);

/// Device-assigned identifier of one playable voice (source)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VoiceHandle(pub u32);

/// Playback state of a voice as reported by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoiceState {
    /// Created, never played
    Initial,
    Playing,
    Paused,
    Stopped,
}

/// Queue-based audio device
pub trait AudioDevice: Send {
    /// Allocate `count` buffer handles.
    ///
    /// Fails with `DeviceAllocation` if the device cannot provide them.
    fn create_buffers(&mut self, count: usize) -> Result<Vec<BufferHandle>>;

    /// Allocate one voice configured as a streaming (queue-consuming) source.
    ///
    /// Fails with `DeviceAllocation` if the device cannot provide one.
    fn create_streaming_voice(&mut self) -> Result<VoiceHandle>;

    /// Upload PCM bytes into a buffer that is not currently queued
    fn buffer_data(
        &mut self,
        buffer: BufferHandle,
        tag: FormatTag,
        data: &[u8],
        sample_rate: u32,
    ) -> Result<()>;

    /// Append buffers to the voice's queue, in order
    fn queue_buffers(&mut self, voice: VoiceHandle, buffers: &[BufferHandle]) -> Result<()>;

    /// Remove `count` processed buffers from the head of the voice's queue.
    ///
    /// Asking for more than `processed_buffers()` reports is an error.
    fn unqueue_buffers(&mut self, voice: VoiceHandle, count: usize) -> Result<Vec<BufferHandle>>;

    /// Number of queued buffers the voice has finished playing
    fn processed_buffers(&self, voice: VoiceHandle) -> Result<usize>;

    fn play(&mut self, voice: VoiceHandle) -> Result<()>;

    fn pause(&mut self, voice: VoiceHandle) -> Result<()>;

    /// Stop the voice; every queued buffer becomes processed
    fn stop(&mut self, voice: VoiceHandle) -> Result<()>;

    fn voice_state(&self, voice: VoiceHandle) -> Result<VoiceState>;

    /// Give buffers back to the device
    fn delete_buffers(&mut self, buffers: &[BufferHandle]);

    /// Give a voice back to the device
    fn delete_voice(&mut self, voice: VoiceHandle);
}

impl<D: AudioDevice + ?Sized> AudioDevice for Box<D> {
    fn create_buffers(&mut self, count: usize) -> Result<Vec<BufferHandle>> {
        (**self).create_buffers(count)
    }

    fn create_streaming_voice(&mut self) -> Result<VoiceHandle> {
        (**self).create_streaming_voice()
    }

    fn buffer_data(
        &mut self,
        buffer: BufferHandle,
        tag: FormatTag,
        data: &[u8],
        sample_rate: u32,
    ) -> Result<()> {
        (**self).buffer_data(buffer, tag, data, sample_rate)
    }

    fn queue_buffers(&mut self, voice: VoiceHandle, buffers: &[BufferHandle]) -> Result<()> {
        (**self).queue_buffers(voice, buffers)
    }

    fn unqueue_buffers(&mut self, voice: VoiceHandle, count: usize) -> Result<Vec<BufferHandle>> {
        (**self).unqueue_buffers(voice, count)
    }

    fn processed_buffers(&self, voice: VoiceHandle) -> Result<usize> {
        (**self).processed_buffers(voice)
    }

    fn play(&mut self, voice: VoiceHandle) -> Result<()> {
        (**self).play(voice)
    }

    fn pause(&mut self, voice: VoiceHandle) -> Result<()> {
        (**self).pause(voice)
    }

    fn stop(&mut self, voice: VoiceHandle) -> Result<()> {
        (**self).stop(voice)
    }

    fn voice_state(&self, voice: VoiceHandle) -> Result<VoiceState> {
        (**self).voice_state(voice)
    }

    fn delete_buffers(&mut self, buffers: &[BufferHandle]) {
        (**self).delete_buffers(buffers)
    }

    fn delete_voice(&mut self, voice: VoiceHandle) {
        (**self).delete_voice(voice)
    }
}
