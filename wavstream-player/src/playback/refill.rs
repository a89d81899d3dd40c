//! Periodic refill task
//!
//! Drives [`StreamingBufferEngine::refill_tick`] on a fixed tokio interval,
//! independent of whatever loop the host runs. The task takes the engine lock
//! once per tick, so a tick never interleaves with Start/Pause/Stop.

use crate::audio::device::AudioDevice;
use crate::playback::engine::StreamingBufferEngine;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};
use wavstream_common::events::{EventBus, PlaybackState, StreamEvent};

/// Handle to a running refill task.
///
/// The task ends by itself when the stream concludes or is found stopped.
/// Dropping the handle aborts it.
#[derive(Debug)]
pub struct RefillScheduler {
    handle: Option<JoinHandle<()>>,
}

impl RefillScheduler {
    /// Spawn the refill task on the current tokio runtime
    pub fn spawn<D>(
        engine: Arc<Mutex<StreamingBufferEngine<D>>>,
        period: Duration,
        events: Option<EventBus>,
    ) -> Self
    where
        D: AudioDevice + 'static,
    {
        let handle = tokio::spawn(refill_loop(engine, period, events));
        Self {
            handle: Some(handle),
        }
    }

    /// True once the task has exited
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Cancel the task; a tick in progress completes first because it runs
    /// under the engine lock without yielding
    pub fn stop(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!("Refill task cancelled");
        }
    }

    /// Wait for the task to exit on its own
    pub async fn join(mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    warn!("Refill task ended abnormally: {}", e);
                }
            }
        }
    }
}

impl Drop for RefillScheduler {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

async fn refill_loop<D: AudioDevice>(
    engine: Arc<Mutex<StreamingBufferEngine<D>>>,
    period: Duration,
    events: Option<EventBus>,
) {
    let mut interval = time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    // The first tick fires immediately; Start has just filled the ring
    interval.tick().await;

    info!("Refill task started ({}ms interval)", period.as_millis());

    loop {
        interval.tick().await;

        let mut guard = engine.lock().await;
        if guard.state() == PlaybackState::Stopped {
            debug!("Stream stopped, refill task exiting");
            break;
        }

        match guard.refill_tick() {
            Ok(report) if report.finished => {
                info!("Stream finished, refill task exiting");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Refill tick failed: {}", e);
                if let Some(bus) = &events {
                    bus.emit_lossy(StreamEvent::RefillFailed {
                        message: e.to_string(),
                        timestamp: Utc::now(),
                    });
                }
            }
        }
    }
}
