//! Host-facing stream player
//!
//! Owns the engine behind a single per-instance lock and runs the refill
//! scheduler in lockstep with Start and Stop.

use crate::audio::device::AudioDevice;
use crate::config::EngineConfig;
use crate::error::Result;
use crate::playback::engine::StreamingBufferEngine;
use crate::playback::refill::RefillScheduler;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Mutex};
use tracing::debug;
use wavstream_common::events::{EventBus, PlaybackState, StreamEvent};

/// Event channel capacity per player
const EVENT_CAPACITY: usize = 64;

/// Async control surface over one [`StreamingBufferEngine`]
pub struct StreamPlayer<D: AudioDevice + 'static> {
    engine: Arc<Mutex<StreamingBufferEngine<D>>>,
    scheduler: Mutex<Option<RefillScheduler>>,
    refill_interval: Duration,
    events: EventBus,
}

impl<D: AudioDevice + 'static> StreamPlayer<D> {
    /// Open `path` on `device`; see [`StreamingBufferEngine::open`] for errors
    pub fn open(path: impl AsRef<Path>, device: D, config: &EngineConfig) -> Result<Self> {
        let events = EventBus::new(EVENT_CAPACITY);
        let engine = StreamingBufferEngine::open(path, device, config)?.with_events(events.clone());

        Ok(Self {
            engine: Arc::new(Mutex::new(engine)),
            scheduler: Mutex::new(None),
            refill_interval: config.refill_interval,
            events,
        })
    }

    /// Start the stream and its refill task. Ignored while already running.
    pub async fn start(&self) -> Result<()> {
        let mut engine = self.engine.lock().await;
        let was_stopped = engine.state() == PlaybackState::Stopped;

        engine.start()?;

        if was_stopped && engine.state() != PlaybackState::Stopped {
            let mut scheduler = self.scheduler.lock().await;
            if let Some(previous) = scheduler.take() {
                previous.stop();
            }
            *scheduler = Some(RefillScheduler::spawn(
                Arc::clone(&self.engine),
                self.refill_interval,
                Some(self.events.clone()),
            ));
            debug!("Refill task scheduled");
        }

        Ok(())
    }

    pub async fn pause_or_resume(&self) -> Result<()> {
        self.engine.lock().await.pause_or_resume()
    }

    /// Cancel the refill task, then stop the stream
    pub async fn stop(&self) -> Result<()> {
        let mut engine = self.engine.lock().await;
        if let Some(scheduler) = self.scheduler.lock().await.take() {
            scheduler.stop();
        }
        engine.stop()
    }

    pub async fn state(&self) -> PlaybackState {
        self.engine.lock().await.state()
    }

    /// True while a refill task is alive
    pub async fn is_refilling(&self) -> bool {
        self.scheduler
            .lock()
            .await
            .as_ref()
            .is_some_and(|scheduler| !scheduler.is_finished())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StreamEvent> {
        self.events.subscribe()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    /// Shared handle to the engine, for diagnostics
    pub fn engine(&self) -> Arc<Mutex<StreamingBufferEngine<D>>> {
        Arc::clone(&self.engine)
    }
}
