//! Streaming buffer engine
//!
//! Plays a wave file of any length through a fixed ring of N device buffers.
//! Start fills every buffer from the first sample and queues them on one
//! voice; each refill tick then unqueues the buffers the device reports as
//! processed, fills them from the next unread slice of the file and queues
//! them again.
//!
//! The engine is synchronous and needs `&mut self` for every transition.
//! Callers that drive it from more than one task (the refill scheduler and a
//! control surface) must hold it behind one lock; see [`StreamPlayer`].
//!
//! [`StreamPlayer`]: crate::playback::player::StreamPlayer

use crate::audio::device::{AudioDevice, BufferHandle, VoiceHandle, VoiceState};
use crate::audio::types::AudioFormat;
use crate::audio::wav::{WavContainerReader, WavLayout};
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::playback::cursor::StreamCursor;
use crate::playback::pool::{BufferPool, BufferSlot, SlotStatus};
use chrono::Utc;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::{debug, info, trace, warn};
use wavstream_common::events::{EventBus, PlaybackState, StreamEvent};

/// What one refill tick did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefillReport {
    /// Buffers unqueued because the device finished them
    pub reclaimed: usize,

    /// Buffers refilled and queued again
    pub resubmitted: usize,

    /// PCM bytes queued during this tick
    pub bytes_submitted: usize,

    /// The data region has been read to its end
    pub end_of_stream: bool,

    /// The stream concluded during this tick and the engine is now stopped
    pub finished: bool,
}

/// Streams one wave file through a rotating pool of device buffers
pub struct StreamingBufferEngine<D: AudioDevice> {
    device: D,
    voice: VoiceHandle,
    pool: BufferPool,
    cursor: StreamCursor<File>,
    layout: WavLayout,
    path: PathBuf,

    /// A session runs from Start until Stop or end of stream
    active: bool,

    /// Cursor reached the end of the data region during this session
    end_of_stream: bool,

    /// PCM bytes queued since the last Start
    bytes_submitted: u64,

    events: Option<EventBus>,
}

impl<D: AudioDevice> StreamingBufferEngine<D> {
    /// Open `path`, derive its format and allocate the buffer ring on `device`.
    ///
    /// # Errors
    /// - `Config`: invalid `config`, or a buffer capacity that rounds to zero bytes
    ///   or overflows
    /// - `MalformedContainer` / `UnsupportedFormat`: from the container reader
    /// - `DeviceAllocation`: the device refused the buffers or the voice
    ///
    /// Nothing is left allocated on the device when construction fails.
    pub fn open(path: impl AsRef<Path>, mut device: D, config: &EngineConfig) -> Result<Self> {
        let path = path.as_ref();
        config.validate()?;

        let (file, layout) = WavContainerReader::open(path)?;
        let capacity = layout
            .format
            .buffer_capacity(config.seconds_per_buffer)
            .ok_or_else(|| {
                Error::Config(format!(
                    "{} seconds per buffer at {} Hz does not fit in memory",
                    config.seconds_per_buffer, layout.format.sample_rate
                ))
            })?;
        if capacity == 0 {
            return Err(Error::Config(format!(
                "{} seconds per buffer is less than one frame at {} Hz",
                config.seconds_per_buffer, layout.format.sample_rate
            )));
        }
        let cursor = StreamCursor::new(file, layout.data_offset, layout.data_end())?;

        let handles = device.create_buffers(config.buffer_count)?;
        if handles.len() != config.buffer_count {
            device.delete_buffers(&handles);
            return Err(Error::DeviceAllocation(format!(
                "requested {} buffers, device returned {}",
                config.buffer_count,
                handles.len()
            )));
        }

        let voice = match device.create_streaming_voice() {
            Ok(voice) => voice,
            Err(e) => {
                device.delete_buffers(&handles);
                return Err(e);
            }
        };

        info!(
            "Opened {}: {} Hz, {} channel(s), {}-bit, {} data bytes; {} buffers of {} bytes",
            path.display(),
            layout.format.sample_rate,
            layout.format.channel_count(),
            layout.format.bits_per_sample(),
            layout.data_len,
            handles.len(),
            capacity
        );

        Ok(Self {
            device,
            voice,
            pool: BufferPool::new(&handles, capacity),
            cursor,
            layout,
            path: path.to_path_buf(),
            active: false,
            end_of_stream: false,
            bytes_submitted: 0,
            events: None,
        })
    }

    /// Publish state changes and end of stream on `bus`
    pub fn with_events(mut self, bus: EventBus) -> Self {
        self.events = Some(bus);
        self
    }

    /// Current state, derived from the device voice on every call
    pub fn state(&self) -> PlaybackState {
        if !self.active {
            return PlaybackState::Stopped;
        }

        match self.device.voice_state(self.voice) {
            Ok(VoiceState::Paused) => PlaybackState::Paused,
            // A voice that ran dry is still a live session until the next tick
            Ok(_) => PlaybackState::Playing,
            Err(e) => {
                warn!("Failed to query voice state: {}", e);
                PlaybackState::Playing
            }
        }
    }

    /// Stopped → Playing: fill and queue the ring from the first sample, then play.
    ///
    /// Ignored while a session is already running.
    pub fn start(&mut self) -> Result<()> {
        if self.active {
            debug!("Start ignored: stream is already {}", self.state());
            return Ok(());
        }

        info!("Starting stream: {}", self.path.display());

        self.cursor.reset()?;
        self.active = true;
        self.end_of_stream = false;
        self.bytes_submitted = 0;

        if let Err(e) = self.prime_and_play() {
            warn!("Start failed, rolling back: {}", e);
            if let Err(cleanup) = self.end_session() {
                debug!("Rollback after failed start: {}", cleanup);
            }
            return Err(e);
        }

        Ok(())
    }

    fn prime_and_play(&mut self) -> Result<()> {
        let mut batch: Vec<(usize, usize)> = Vec::with_capacity(self.pool.len());

        for index in 0..self.pool.len() {
            if !self.is_refillable(index) {
                warn!("Slot {} is still queued from the previous session", index);
                continue;
            }

            let read = self.stage_slot(index)?;
            if read == 0 {
                self.end_of_stream = true;
                break;
            }

            batch.push((index, read));
            if read < self.pool.capacity() {
                self.end_of_stream = true;
                break;
            }
        }

        if batch.is_empty() {
            info!("No sample data in {}", self.path.display());
            return self.conclude(PlaybackState::Stopped);
        }

        let handles: Vec<BufferHandle> = batch
            .iter()
            .filter_map(|&(index, _)| self.pool.slot(index).map(BufferSlot::handle))
            .collect();
        self.device.queue_buffers(self.voice, &handles)?;
        for &(index, read) in &batch {
            self.pool.mark_queued(index)?;
            self.bytes_submitted += read as u64;
        }

        self.device.play(self.voice)?;

        info!(
            "Stream playing: {} buffer(s) queued, cursor at {}{}",
            batch.len(),
            self.cursor.position(),
            if self.end_of_stream { " (whole file queued)" } else { "" }
        );
        self.emit_state_change(PlaybackState::Stopped, PlaybackState::Playing);
        Ok(())
    }

    /// Playing → Paused (after one refill pass), Paused → Playing.
    ///
    /// Ignored while stopped.
    pub fn pause_or_resume(&mut self) -> Result<()> {
        match self.state() {
            PlaybackState::Stopped => {
                debug!("Pause/resume ignored: stream is stopped");
                Ok(())
            }
            PlaybackState::Playing => {
                match self.refill_tick() {
                    Ok(report) if report.finished => return Ok(()),
                    Ok(_) => {}
                    Err(e) => {
                        // The pause still goes through; the next tick retries the refill
                        warn!("Refill before pause failed: {}", e);
                        self.emit(StreamEvent::RefillFailed {
                            message: e.to_string(),
                            timestamp: Utc::now(),
                        });
                    }
                }

                self.device.pause(self.voice)?;
                info!("Stream paused at cursor {}", self.cursor.position());
                self.emit_state_change(PlaybackState::Playing, PlaybackState::Paused);
                Ok(())
            }
            PlaybackState::Paused => {
                self.device.play(self.voice)?;
                info!("Stream resumed");
                self.emit_state_change(PlaybackState::Paused, PlaybackState::Playing);
                Ok(())
            }
        }
    }

    /// Playing/Paused → Stopped.
    ///
    /// Stops the voice, unqueues only the buffers the device reports as
    /// processed, and puts the cursor back at the first sample. Ignored while
    /// stopped.
    pub fn stop(&mut self) -> Result<()> {
        if !self.active {
            debug!("Stop ignored: stream is already stopped");
            return Ok(());
        }

        let old_state = self.state();
        info!("Stopping stream at cursor {}", self.cursor.position());

        let result = self.end_session();
        self.emit_state_change(old_state, PlaybackState::Stopped);
        result
    }

    /// One reclaim-and-resubmit cycle.
    ///
    /// Unqueues exactly as many buffers as the device reports processed,
    /// refills every slot that is off the queue and queues it again. When the
    /// data is exhausted and nothing is left on the queue the stream concludes
    /// and the engine moves to `Stopped`.
    ///
    /// # Errors
    /// Any device failure ends the tick early. Bytes read for a slot that could
    /// not be submitted are given back to the cursor, so the next successful
    /// tick continues without a gap.
    pub fn refill_tick(&mut self) -> Result<RefillReport> {
        let mut report = RefillReport::default();
        if !self.active {
            return Ok(report);
        }

        report.reclaimed = self.reclaim_processed()?;

        for index in 0..self.pool.len() {
            if self.end_of_stream {
                break;
            }
            if !self.is_refillable(index) {
                continue;
            }

            let read = self.stage_slot(index)?;
            if read == 0 {
                info!("Reached end of data at offset {}", self.cursor.position());
                self.end_of_stream = true;
                break;
            }

            self.submit_slot(index, read)?;
            report.resubmitted += 1;
            report.bytes_submitted += read;

            if read < self.pool.capacity() {
                info!("Queued final partial buffer of {} bytes", read);
                self.end_of_stream = true;
            }
        }

        if report.resubmitted > 0 && self.device.voice_state(self.voice)? == VoiceState::Stopped {
            warn!("Voice ran out of queued audio before refill; restarting playback");
            self.device.play(self.voice)?;
        }

        report.end_of_stream = self.end_of_stream;
        if self.end_of_stream && self.pool.queued_count() == 0 {
            let old_state = self.state();
            self.conclude(old_state)?;
            report.finished = true;
        }

        debug!(
            "Refill tick: reclaimed {}, resubmitted {} ({} bytes), cursor at {}",
            report.reclaimed,
            report.resubmitted,
            report.bytes_submitted,
            self.cursor.position()
        );
        Ok(report)
    }

    /// Read the next slice of the file into a slot and upload it to the device.
    ///
    /// Returns the bytes staged; 0 means there was nothing left to read and
    /// the slot was not touched on the device.
    fn stage_slot(&mut self, index: usize) -> Result<usize> {
        let tag = self.layout.format.tag();
        let sample_rate = self.layout.format.sample_rate;

        let slot = self
            .pool
            .slot_mut(index)
            .ok_or_else(|| Error::Device(format!("no buffer slot {}", index)))?;

        let read = self.cursor.read_into(slot.staging_mut())?;
        slot.set_filled(read);
        if read == 0 {
            return Ok(0);
        }

        if let Err(e) = self
            .device
            .buffer_data(slot.handle(), tag, slot.filled_bytes(), sample_rate)
        {
            self.cursor.unread(read)?;
            return Err(e);
        }

        trace!("Staged {} bytes into slot {}", read, index);
        Ok(read)
    }

    /// Queue one staged slot on the voice
    fn submit_slot(&mut self, index: usize, read: usize) -> Result<()> {
        let handle = self
            .pool
            .slot(index)
            .map(BufferSlot::handle)
            .ok_or_else(|| Error::Device(format!("no buffer slot {}", index)))?;

        if let Err(e) = self.device.queue_buffers(self.voice, &[handle]) {
            self.cursor.unread(read)?;
            return Err(e);
        }

        self.pool.mark_queued(index)?;
        self.bytes_submitted += read as u64;
        Ok(())
    }

    /// Unqueue exactly the buffers the device reports processed right now
    fn reclaim_processed(&mut self) -> Result<usize> {
        let processed = self.device.processed_buffers(self.voice)?;
        if processed == 0 {
            return Ok(0);
        }

        let handles = self.device.unqueue_buffers(self.voice, processed)?;
        for &handle in &handles {
            let index = self.pool.mark_processed(handle)?;
            trace!("Reclaimed slot {} ({:?})", index, handle);
        }

        Ok(handles.len())
    }

    /// Stop the voice, drain what the device finished and rewind.
    ///
    /// Leaves the engine stopped even when a device call fails; the first
    /// failure is returned.
    fn end_session(&mut self) -> Result<()> {
        let stopped = self.device.stop(self.voice);
        let reclaimed = self.reclaim_processed();

        let in_flight = self.pool.queued_count();
        if in_flight > 0 {
            warn!("{} buffer(s) still held by the device after stop", in_flight);
        }
        self.pool.reset_unqueued();

        self.active = false;
        self.end_of_stream = false;
        self.cursor.reset()?;

        stopped?;
        reclaimed?;
        Ok(())
    }

    /// Finish a stream whose data is exhausted and fully played
    fn conclude(&mut self, old_state: PlaybackState) -> Result<()> {
        let bytes_streamed = self.bytes_submitted;
        let result = self.end_session();

        info!(
            "End of stream: {} bytes ({:.2}s) played from {}",
            bytes_streamed,
            self.layout.format.duration_of(bytes_streamed).as_secs_f64(),
            self.path.display()
        );

        self.emit_state_change(old_state, PlaybackState::Stopped);
        self.emit(StreamEvent::EndOfStream {
            bytes_streamed,
            timestamp: Utc::now(),
        });
        result
    }

    fn is_refillable(&self, index: usize) -> bool {
        self.pool.slot(index).is_some_and(BufferSlot::is_refillable)
    }

    fn emit_state_change(&self, old_state: PlaybackState, new_state: PlaybackState) {
        if old_state == new_state {
            return;
        }
        info!("Playback state changed: {} -> {}", old_state, new_state);
        self.emit(StreamEvent::StateChanged {
            old_state,
            new_state,
            timestamp: Utc::now(),
        });
    }

    fn emit(&self, event: StreamEvent) {
        if let Some(bus) = &self.events {
            bus.emit_lossy(event);
        }
    }

    pub fn format(&self) -> AudioFormat {
        self.layout.format
    }

    pub fn layout(&self) -> &WavLayout {
        &self.layout
    }

    /// Absolute offset of the first sample
    pub fn data_offset(&self) -> u64 {
        self.layout.data_offset
    }

    /// Bytes per buffer slot
    pub fn buffer_capacity(&self) -> usize {
        self.pool.capacity()
    }

    pub fn buffer_count(&self) -> usize {
        self.pool.len()
    }

    /// Absolute file offset of the next unread byte
    pub fn cursor_position(&self) -> u64 {
        self.cursor.position()
    }

    /// PCM bytes queued on the device since the last Start
    pub fn bytes_submitted(&self) -> u64 {
        self.bytes_submitted
    }

    pub fn slot_status(&self, index: usize) -> Option<SlotStatus> {
        self.pool.slot(index).map(BufferSlot::status)
    }

    pub fn voice(&self) -> VoiceHandle {
        self.voice
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<D: AudioDevice> Drop for StreamingBufferEngine<D> {
    fn drop(&mut self) {
        if let Err(e) = self.device.stop(self.voice) {
            debug!("Stopping voice on drop failed: {}", e);
        }
        self.device.delete_voice(self.voice);
        self.device.delete_buffers(&self.pool.handles());
        debug!("Released voice and {} buffers", self.pool.len());
    }
}
