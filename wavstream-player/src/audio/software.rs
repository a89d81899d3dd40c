//! In-process software device
//!
//! Implements [`AudioDevice`] with OpenAL-style per-voice buffer queues held in
//! memory. Queued PCM is turned into [`AudioFrame`]s by [`SoftwareDevice::render`],
//! which an output stream callback (see `audio::output`) or a real-time clock
//! task calls to drain the queue.
//!
//! Cloning a `SoftwareDevice` yields another handle onto the same device, so
//! the engine can own one handle while the output callback holds another.

use crate::audio::device::{AudioDevice, BufferHandle, VoiceHandle, VoiceState};
use crate::audio::types::{AudioFormat, AudioFrame, FormatTag};
use crate::error::{Error, Result};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, trace};

/// Device operation that can be made to fail once, for exercising error paths
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailPoint {
    CreateBuffers,
    CreateVoice,
    BufferData,
    QueueBuffers,
    UnqueueBuffers,
    Play,
}

/// One buffer as it was handed to a voice queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    pub voice: VoiceHandle,
    pub buffer: BufferHandle,
    pub tag: FormatTag,
    pub sample_rate: u32,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Default)]
struct BufferData {
    tag: Option<FormatTag>,
    sample_rate: u32,
    bytes: Vec<u8>,
}

#[derive(Debug)]
struct QueueEntry {
    buffer: BufferHandle,
    read_pos: usize,
    processed: bool,
}

#[derive(Debug)]
struct Voice {
    state: VoiceState,
    queue: VecDeque<QueueEntry>,
}

impl Voice {
    fn processed_count(&self) -> usize {
        self.queue.iter().take_while(|entry| entry.processed).count()
    }
}

#[derive(Debug, Default)]
struct DeviceState {
    next_buffer_id: u32,
    next_voice_id: u32,
    buffer_limit: Option<usize>,
    buffers: HashMap<BufferHandle, BufferData>,
    voices: HashMap<VoiceHandle, Voice>,
    record_submissions: bool,
    submissions: Vec<Submission>,
    play_requests: usize,
    queue_requests: usize,
    fail_next: Option<FailPoint>,
}

impl DeviceState {
    fn take_failure(&mut self, point: FailPoint) -> bool {
        if self.fail_next == Some(point) {
            self.fail_next = None;
            true
        } else {
            false
        }
    }

    fn voice_mut(&mut self, voice: VoiceHandle) -> Result<&mut Voice> {
        self.voices
            .get_mut(&voice)
            .ok_or_else(|| Error::Device(format!("unknown voice {:?}", voice)))
    }

    fn is_queued(&self, buffer: BufferHandle) -> bool {
        self.voices
            .values()
            .any(|voice| voice.queue.iter().any(|entry| entry.buffer == buffer))
    }

    /// Pull the next frame from a voice, marking buffers processed as they empty
    fn next_frame(voice: &mut Voice, buffers: &HashMap<BufferHandle, BufferData>) -> Option<AudioFrame> {
        loop {
            let entry = voice.queue.iter_mut().find(|entry| !entry.processed)?;

            let decoded = buffers.get(&entry.buffer).and_then(|data| {
                let (channels, depth) = data.tag?.layout();
                let format = AudioFormat {
                    sample_rate: data.sample_rate,
                    channels,
                    depth,
                };
                let frame_len = format.bytes_per_frame();
                let end = entry.read_pos + frame_len;
                if end > data.bytes.len() {
                    return None;
                }

                let frame = format.decode_frame(&data.bytes[entry.read_pos..end]);
                Some((frame, end, end + frame_len > data.bytes.len()))
            });

            match decoded {
                Some((frame, new_pos, exhausted)) => {
                    entry.read_pos = new_pos;
                    entry.processed = exhausted;
                    if exhausted {
                        trace!("Buffer {:?} fully played", entry.buffer);
                    }
                    return Some(frame);
                }
                None => entry.processed = true,
            }
        }
    }
}

/// Software implementation of the queue-based device
#[derive(Debug, Clone, Default)]
pub struct SoftwareDevice {
    inner: Arc<Mutex<DeviceState>>,
}

impl SoftwareDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit the total number of buffers the device will hand out
    pub fn with_buffer_limit(self, limit: usize) -> Self {
        self.state().buffer_limit = Some(limit);
        self
    }

    /// Keep a copy of every buffer queued on any voice (see [`Self::submissions`])
    pub fn recording(self) -> Self {
        self.state().record_submissions = true;
        self
    }

    /// Make the next call of the given operation fail
    pub fn fail_next(&self, point: FailPoint) {
        self.state().fail_next = Some(point);
    }

    fn state(&self) -> MutexGuard<'_, DeviceState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mix the next frames of every playing voice into `out`.
    ///
    /// Returns the number of frames that carried audio from at least one voice;
    /// the rest of `out` is silence. A playing voice whose queue runs dry
    /// transitions to `Stopped`.
    pub fn render(&self, out: &mut [AudioFrame]) -> usize {
        let mut guard = self.state();
        let DeviceState { voices, buffers, .. } = &mut *guard;

        out.fill(AudioFrame::zero());
        let mut audible = 0;

        for (handle, voice) in voices.iter_mut() {
            if voice.state != VoiceState::Playing {
                continue;
            }

            let mut produced = 0;
            for slot in out.iter_mut() {
                match DeviceState::next_frame(voice, buffers) {
                    Some(frame) => {
                        slot.left += frame.left;
                        slot.right += frame.right;
                        produced += 1;
                    }
                    None => {
                        debug!("Voice {:?} drained its queue, stopping", handle);
                        voice.state = VoiceState::Stopped;
                        break;
                    }
                }
            }
            audible = audible.max(produced);
        }

        audible
    }

    /// Render into an interleaved output slice with `channels` channels per frame.
    ///
    /// Left goes to channel 0, right to channel 1, extra channels get silence.
    /// `frames` is scratch space kept by the caller between calls; it only
    /// grows, so a steady callback size never allocates.
    pub fn render_interleaved(
        &self,
        out: &mut [f32],
        frames: &mut Vec<AudioFrame>,
        channels: usize,
        volume: f32,
    ) -> usize {
        if channels == 0 {
            return 0;
        }

        let frame_count = out.len() / channels;
        if frames.len() < frame_count {
            frames.resize(frame_count, AudioFrame::zero());
        }
        let frames = &mut frames[..frame_count];
        let audible = self.render(frames);

        for (chunk, frame) in out.chunks_mut(channels).zip(frames.iter_mut()) {
            frame.apply_volume(volume);
            frame.clamp();
            chunk[0] = frame.left;
            if channels > 1 {
                chunk[1] = frame.right;
                chunk[2..].fill(0.0);
            }
        }

        audible
    }

    /// Play out `frames` frames of every playing voice, discarding the audio
    pub fn advance(&self, frames: usize) -> usize {
        let mut scratch = vec![AudioFrame::zero(); frames];
        self.render(&mut scratch)
    }

    /// Mark the next `count` unplayed buffers of a voice as fully played.
    ///
    /// A voice left with nothing to play transitions to `Stopped`.
    pub fn finish_buffers(&self, voice: VoiceHandle, count: usize) -> Result<usize> {
        let mut state = self.state();
        let voice = state.voice_mut(voice)?;

        let mut finished = 0;
        for entry in voice.queue.iter_mut().filter(|entry| !entry.processed).take(count) {
            entry.processed = true;
            finished += 1;
        }

        if voice.queue.iter().all(|entry| entry.processed) {
            voice.state = VoiceState::Stopped;
        }

        Ok(finished)
    }

    /// Every buffer queued so far, in queue order (only with [`Self::recording`])
    pub fn submissions(&self) -> Vec<Submission> {
        self.state().submissions.clone()
    }

    /// Number of `play()` calls received
    pub fn play_requests(&self) -> usize {
        self.state().play_requests
    }

    /// Number of `queue_buffers()` calls received
    pub fn queue_requests(&self) -> usize {
        self.state().queue_requests
    }

    /// Buffers currently on a voice's queue, processed or not
    pub fn queued_buffers(&self, voice: VoiceHandle) -> Result<Vec<BufferHandle>> {
        let mut state = self.state();
        Ok(state
            .voice_mut(voice)?
            .queue
            .iter()
            .map(|entry| entry.buffer)
            .collect())
    }

    /// Handles of all live voices
    pub fn voices(&self) -> Vec<VoiceHandle> {
        let mut voices: Vec<_> = self.state().voices.keys().copied().collect();
        voices.sort();
        voices
    }

    /// Number of buffer handles currently allocated
    pub fn allocated_buffers(&self) -> usize {
        self.state().buffers.len()
    }
}

impl AudioDevice for SoftwareDevice {
    fn create_buffers(&mut self, count: usize) -> Result<Vec<BufferHandle>> {
        let mut state = self.state();

        if state.take_failure(FailPoint::CreateBuffers) {
            return Err(Error::DeviceAllocation("buffer creation rejected".to_string()));
        }
        if let Some(limit) = state.buffer_limit {
            if state.buffers.len() + count > limit {
                return Err(Error::DeviceAllocation(format!(
                    "requested {} buffers, only {} of {} available",
                    count,
                    limit.saturating_sub(state.buffers.len()),
                    limit
                )));
            }
        }

        let mut handles = Vec::with_capacity(count);
        for _ in 0..count {
            state.next_buffer_id += 1;
            let handle = BufferHandle(state.next_buffer_id);
            state.buffers.insert(handle, BufferData::default());
            handles.push(handle);
        }

        debug!("Allocated {} buffers: {:?}", count, handles);
        Ok(handles)
    }

    fn create_streaming_voice(&mut self) -> Result<VoiceHandle> {
        let mut state = self.state();

        if state.take_failure(FailPoint::CreateVoice) {
            return Err(Error::DeviceAllocation("voice creation rejected".to_string()));
        }

        state.next_voice_id += 1;
        let handle = VoiceHandle(state.next_voice_id);
        state.voices.insert(
            handle,
            Voice {
                state: VoiceState::Initial,
                queue: VecDeque::new(),
            },
        );

        debug!("Allocated streaming voice {:?}", handle);
        Ok(handle)
    }

    fn buffer_data(
        &mut self,
        buffer: BufferHandle,
        tag: FormatTag,
        data: &[u8],
        sample_rate: u32,
    ) -> Result<()> {
        let mut state = self.state();

        if state.take_failure(FailPoint::BufferData) {
            return Err(Error::Device(format!("upload into {:?} rejected", buffer)));
        }
        if state.is_queued(buffer) {
            return Err(Error::Device(format!(
                "cannot upload into {:?} while it is queued",
                buffer
            )));
        }

        let target = state
            .buffers
            .get_mut(&buffer)
            .ok_or_else(|| Error::Device(format!("unknown buffer {:?}", buffer)))?;
        target.tag = Some(tag);
        target.sample_rate = sample_rate;
        target.bytes.clear();
        target.bytes.extend_from_slice(data);

        Ok(())
    }

    fn queue_buffers(&mut self, voice: VoiceHandle, buffers: &[BufferHandle]) -> Result<()> {
        let mut state = self.state();

        if state.take_failure(FailPoint::QueueBuffers) {
            return Err(Error::Device(format!("queueing on {:?} rejected", voice)));
        }
        state.queue_requests += 1;

        for (index, &buffer) in buffers.iter().enumerate() {
            if state.is_queued(buffer) || buffers[..index].contains(&buffer) {
                return Err(Error::Device(format!("{:?} is already queued", buffer)));
            }
            if state.buffers.get(&buffer).and_then(|data| data.tag).is_none() {
                return Err(Error::Device(format!("{:?} holds no data", buffer)));
            }
        }

        if state.record_submissions {
            for &buffer in buffers {
                if let Some(data) = state.buffers.get(&buffer) {
                    if let Some(tag) = data.tag {
                        let submission = Submission {
                            voice,
                            buffer,
                            tag,
                            sample_rate: data.sample_rate,
                            bytes: data.bytes.clone(),
                        };
                        state.submissions.push(submission);
                    }
                }
            }
        }

        let target = state.voice_mut(voice)?;
        target.queue.extend(buffers.iter().map(|&buffer| QueueEntry {
            buffer,
            read_pos: 0,
            processed: false,
        }));

        trace!("Queued {:?} on {:?}", buffers, voice);
        Ok(())
    }

    fn unqueue_buffers(&mut self, voice: VoiceHandle, count: usize) -> Result<Vec<BufferHandle>> {
        let mut state = self.state();

        if state.take_failure(FailPoint::UnqueueBuffers) {
            return Err(Error::Device(format!("unqueue on {:?} rejected", voice)));
        }

        let target = state.voice_mut(voice)?;
        let processed = target.processed_count();
        if count > processed {
            return Err(Error::Device(format!(
                "cannot unqueue {} buffers from {:?}: only {} processed",
                count, voice, processed
            )));
        }

        Ok(target
            .queue
            .drain(..count)
            .map(|entry| entry.buffer)
            .collect())
    }

    fn processed_buffers(&self, voice: VoiceHandle) -> Result<usize> {
        self.state()
            .voices
            .get(&voice)
            .map(Voice::processed_count)
            .ok_or_else(|| Error::Device(format!("unknown voice {:?}", voice)))
    }

    fn play(&mut self, voice: VoiceHandle) -> Result<()> {
        let mut state = self.state();

        if state.take_failure(FailPoint::Play) {
            return Err(Error::Device(format!("play on {:?} rejected", voice)));
        }
        state.play_requests += 1;

        state.voice_mut(voice)?.state = VoiceState::Playing;
        Ok(())
    }

    fn pause(&mut self, voice: VoiceHandle) -> Result<()> {
        let mut state = self.state();
        let target = state.voice_mut(voice)?;
        if target.state == VoiceState::Playing {
            target.state = VoiceState::Paused;
        }
        Ok(())
    }

    fn stop(&mut self, voice: VoiceHandle) -> Result<()> {
        let mut state = self.state();
        let target = state.voice_mut(voice)?;
        target.state = VoiceState::Stopped;
        for entry in target.queue.iter_mut() {
            entry.processed = true;
        }
        Ok(())
    }

    fn voice_state(&self, voice: VoiceHandle) -> Result<VoiceState> {
        self.state()
            .voices
            .get(&voice)
            .map(|v| v.state)
            .ok_or_else(|| Error::Device(format!("unknown voice {:?}", voice)))
    }

    fn delete_buffers(&mut self, buffers: &[BufferHandle]) {
        let mut state = self.state();
        for buffer in buffers {
            state.buffers.remove(buffer);
        }
        debug!("Deleted {} buffers", buffers.len());
    }

    fn delete_voice(&mut self, voice: VoiceHandle) {
        self.state().voices.remove(&voice);
        debug!("Deleted voice {:?}", voice);
    }
}
