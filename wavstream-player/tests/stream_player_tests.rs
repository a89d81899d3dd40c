//! Stream player and refill scheduler tests
//!
//! Runs the real tokio refill task against the software device, with a
//! background task standing in for the sound card.

mod helpers;

use helpers::{pcm_pattern, Fixtures};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use wavstream_common::events::{PlaybackState, StreamEvent};
use wavstream_player::audio::software::FailPoint;
use wavstream_player::audio::SoftwareDevice;
use wavstream_player::config::EngineConfig;
use wavstream_player::playback::{RefillScheduler, StreamPlayer, StreamingBufferEngine};

/// 100 Hz mono 8-bit: one byte per frame, 10-byte buffers at 0.1 s
fn config() -> EngineConfig {
    EngineConfig {
        buffer_count: 3,
        seconds_per_buffer: 0.1,
        refill_interval: Duration::from_millis(5),
    }
}

/// Play `frames_per_step` frames every 2 ms
fn spawn_sound_card(device: SoftwareDevice, frames_per_step: usize) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_millis(2));
        loop {
            interval.tick().await;
            device.advance(frames_per_step);
        }
    })
}

async fn wait_for<F>(rx: &mut broadcast::Receiver<StreamEvent>, mut predicate: F) -> StreamEvent
where
    F: FnMut(&StreamEvent) -> bool,
{
    timeout(Duration::from_secs(10), async {
        loop {
            match rx.recv().await {
                Ok(event) if predicate(&event) => return event,
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => panic!("event bus closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}

#[tokio::test]
async fn test_plays_file_to_end_of_stream() {
    let fixtures = Fixtures::new();
    let data = pcm_pattern(125);
    let path = fixtures.canonical("short.wav", 1, 100, 8, data.clone());
    let device = SoftwareDevice::new().recording();

    let player = StreamPlayer::open(&path, device.clone(), &config()).unwrap();
    let mut rx = player.subscribe();
    let card = spawn_sound_card(device.clone(), 3);

    player.start().await.unwrap();
    assert!(player.is_refilling().await);

    let event = wait_for(&mut rx, |e| matches!(e, StreamEvent::EndOfStream { .. })).await;
    assert!(matches!(event, StreamEvent::EndOfStream { bytes_streamed: 125, .. }));
    card.abort();

    assert_eq!(player.state().await, PlaybackState::Stopped);
    let streamed: Vec<u8> = device.submissions().into_iter().flat_map(|s| s.bytes).collect();
    assert_eq!(streamed, data);

    // The refill task exits on its own once the stream has concluded
    timeout(Duration::from_secs(5), async {
        while player.is_refilling().await {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("refill task still running after end of stream");
}

#[tokio::test]
async fn test_stop_cancels_refill_and_rewinds() {
    let fixtures = Fixtures::new();
    let path = fixtures.canonical("long.wav", 1, 100, 8, pcm_pattern(5000));
    let device = SoftwareDevice::new();
    let player = StreamPlayer::open(&path, device.clone(), &config()).unwrap();
    let card = spawn_sound_card(device.clone(), 2);

    player.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    player.stop().await.unwrap();
    assert_eq!(player.state().await, PlaybackState::Stopped);
    assert!(!player.is_refilling().await);

    let engine = player.engine();
    let engine = engine.lock().await;
    assert_eq!(engine.cursor_position(), engine.data_offset());
    assert!(device.queued_buffers(engine.voice()).unwrap().is_empty());
    drop(engine);

    card.abort();
}

#[tokio::test]
async fn test_start_twice_spawns_one_stream() {
    let fixtures = Fixtures::new();
    let path = fixtures.canonical("twice.wav", 1, 100, 8, pcm_pattern(5000));
    let device = SoftwareDevice::new();
    let player = StreamPlayer::open(&path, device.clone(), &config()).unwrap();

    player.start().await.unwrap();
    player.start().await.unwrap();

    assert_eq!(device.play_requests(), 1);
    assert_eq!(device.queue_requests(), 1);
    assert_eq!(player.state().await, PlaybackState::Playing);

    player.stop().await.unwrap();
}

#[tokio::test]
async fn test_pause_and_resume_through_player() {
    let fixtures = Fixtures::new();
    let path = fixtures.canonical("pause.wav", 1, 100, 8, pcm_pattern(5000));
    let device = SoftwareDevice::new();
    let player = StreamPlayer::open(&path, device.clone(), &config()).unwrap();
    let mut rx = player.subscribe();

    player.start().await.unwrap();
    player.pause_or_resume().await.unwrap();
    assert_eq!(player.state().await, PlaybackState::Paused);

    // Refill keeps running while paused without consuming anything
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(player.state().await, PlaybackState::Paused);
    assert!(player.is_refilling().await);

    player.pause_or_resume().await.unwrap();
    assert_eq!(player.state().await, PlaybackState::Playing);

    let event = wait_for(&mut rx, |e| {
        matches!(
            e,
            StreamEvent::StateChanged {
                new_state: PlaybackState::Playing,
                old_state: PlaybackState::Paused,
                ..
            }
        )
    })
    .await;
    assert!(matches!(event, StreamEvent::StateChanged { .. }));

    player.stop().await.unwrap();
}

#[tokio::test]
async fn test_refill_failure_is_reported_and_recovered() {
    let fixtures = Fixtures::new();
    let data = pcm_pattern(200);
    let path = fixtures.canonical("flaky.wav", 1, 100, 8, data.clone());
    let device = SoftwareDevice::new().recording();
    let player = StreamPlayer::open(&path, device.clone(), &config()).unwrap();
    let mut rx = player.subscribe();

    player.start().await.unwrap();

    // The next upload fails once the device hands a buffer back
    {
        let engine = player.engine();
        let engine = engine.lock().await;
        device.fail_next(FailPoint::BufferData);
        device.finish_buffers(engine.voice(), 1).unwrap();
    }

    let event = wait_for(&mut rx, |e| matches!(e, StreamEvent::RefillFailed { .. })).await;
    assert!(matches!(event, StreamEvent::RefillFailed { .. }));

    // Later ticks refill the slot and the stream still ends with every byte played
    let card = spawn_sound_card(device.clone(), 3);
    wait_for(&mut rx, |e| matches!(e, StreamEvent::EndOfStream { .. })).await;
    card.abort();

    let streamed: Vec<u8> = device.submissions().into_iter().flat_map(|s| s.bytes).collect();
    assert_eq!(streamed, data);
}

#[tokio::test]
async fn test_scheduler_exits_when_engine_is_stopped() {
    let fixtures = Fixtures::new();
    let path = fixtures.canonical("idle.wav", 1, 100, 8, pcm_pattern(100));
    let engine = StreamingBufferEngine::open(&path, SoftwareDevice::new(), &config()).unwrap();
    let engine = std::sync::Arc::new(tokio::sync::Mutex::new(engine));

    let scheduler = RefillScheduler::spawn(engine, Duration::from_millis(1), None);
    timeout(Duration::from_secs(5), scheduler.join())
        .await
        .expect("scheduler should exit for a stopped engine");
}
