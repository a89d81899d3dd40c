//! wavstream - command-line host for the streaming engine
//!
//! Plays one wave file through the buffer ring and takes single-letter
//! commands on stdin:
//! - `p`: pause / resume
//! - `s`: stop (rewinds to the first sample)
//! - `r`: start again
//! - `q`: quit
//!
//! Exits on `q`, Ctrl+C, or when the stream reaches its end.

use std::io::BufRead;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio::sync::{broadcast::error::RecvError, mpsc};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use wavstream_common::config::{resolve_config_path, CONFIG_ENV_VAR};
use wavstream_common::events::StreamEvent;
use wavstream_player::audio::{AudioFormat, SoftwareDevice};
use wavstream_player::config::TomlConfig;
use wavstream_player::playback::StreamPlayer;

/// Null output clock period
const CLOCK_PERIOD: Duration = Duration::from_millis(10);

/// Command-line arguments for wavstream
#[derive(Parser, Debug)]
#[command(name = "wavstream")]
#[command(about = "Stream a PCM wave file through a fixed ring of audio buffers")]
#[command(version)]
struct Args {
    /// Wave file to play
    #[arg(required_unless_present = "list_devices")]
    file: Option<PathBuf>,

    /// Config file (TOML); also read from WAVSTREAM_CONFIG
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of device buffers in the ring
    #[arg(short = 'n', long)]
    buffers: Option<usize>,

    /// Seconds of audio per buffer
    #[arg(long)]
    seconds_per_buffer: Option<f32>,

    /// Refill tick period in milliseconds
    #[arg(long)]
    refill_interval_ms: Option<u64>,

    /// Output device name
    #[arg(short, long)]
    device: Option<String>,

    /// Play against a real-time clock instead of a sound card
    #[arg(long)]
    null_output: bool,

    /// Output volume (0.0 to 1.0)
    #[arg(long, default_value_t = 1.0)]
    volume: f32,

    /// Print the available output devices and exit
    #[arg(long)]
    list_devices: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "WAVSTREAM_LOG_LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.as_deref(), CONFIG_ENV_VAR);
    let toml_config =
        TomlConfig::load_or_default(config_path.as_deref()).context("Failed to load configuration")?;

    // Initialize tracing
    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| toml_config.logging.level.clone());
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "wavstream={level},wavstream_player={level},wavstream_common={level}"
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "wavstream {} (git {}, built {}, {})",
        env!("CARGO_PKG_VERSION"),
        env!("WAVSTREAM_GIT_HASH"),
        env!("WAVSTREAM_BUILD_TIMESTAMP"),
        env!("WAVSTREAM_BUILD_PROFILE")
    );
    match &config_path {
        Some(path) => info!("Configuration: {}", path.display()),
        None => info!("Configuration: built-in defaults"),
    }

    if args.list_devices {
        return list_devices();
    }
    let Some(file) = args.file.clone() else {
        anyhow::bail!("No wave file given");
    };

    let mut engine_config = toml_config.engine_config();
    if let Some(buffers) = args.buffers {
        engine_config.buffer_count = buffers;
    }
    if let Some(seconds) = args.seconds_per_buffer {
        engine_config.seconds_per_buffer = seconds;
    }
    if let Some(ms) = args.refill_interval_ms {
        engine_config.refill_interval = Duration::from_millis(ms);
    }
    let device_name = args.device.clone().or_else(|| toml_config.output.device.clone());

    let device = SoftwareDevice::new();
    let player = StreamPlayer::open(&file, device.clone(), &engine_config)
        .with_context(|| format!("Failed to open {}", file.display()))?;
    let format = player.engine().lock().await.format();

    let use_clock = args.null_output || !cfg!(feature = "cpal-output");

    #[cfg(feature = "cpal-output")]
    let mut output = if use_clock {
        None
    } else {
        let mut output = wavstream_player::audio::AudioOutput::open(device_name.as_deref(), &format)
            .context("Failed to open audio output")?;
        output.set_volume(args.volume);
        output
            .start(device.clone())
            .context("Failed to start audio output")?;
        Some(output)
    };

    let clock = if use_clock {
        if let Some(name) = &device_name {
            info!("Null output selected, ignoring output device '{}'", name);
        }
        Some(spawn_null_clock(device.clone(), format))
    } else {
        None
    };

    let mut events = player.subscribe();
    let mut commands = spawn_command_reader();
    let mut stdin_open = true;

    player.start().await.context("Failed to start stream")?;
    info!("Commands: p = pause/resume, s = stop, r = start, q = quit");

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            command = commands.recv(), if stdin_open => match command {
                Some(line) => {
                    let result = match line.trim() {
                        "p" => player.pause_or_resume().await,
                        "s" => player.stop().await,
                        "r" => player.start().await,
                        "q" => {
                            info!("Quit requested");
                            break;
                        }
                        "" => Ok(()),
                        other => {
                            warn!("Unknown command '{}'", other);
                            Ok(())
                        }
                    };
                    if let Err(e) = result {
                        warn!("Command failed: {}", e);
                    }
                }
                None => {
                    info!("stdin closed, playing to the end");
                    stdin_open = false;
                }
            },
            event = events.recv() => match event {
                Ok(StreamEvent::EndOfStream { bytes_streamed, .. }) => {
                    info!("Playback complete ({} bytes)", bytes_streamed);
                    break;
                }
                Ok(StreamEvent::RefillFailed { message, .. }) => {
                    warn!("Playback may stall: {}", message);
                }
                Ok(StreamEvent::StateChanged { .. }) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Missed {} stream events", skipped);
                }
                Err(RecvError::Closed) => break,
            },
            _ = &mut shutdown => break,
        }
    }

    if let Err(e) = player.stop().await {
        warn!("Stopping stream failed: {}", e);
    }

    #[cfg(feature = "cpal-output")]
    if let Some(output) = output.as_mut() {
        if output.has_error() {
            warn!("Audio output reported a stream error during playback");
        }
        if let Err(e) = output.stop() {
            warn!("Stopping audio output failed: {}", e);
        }
    }

    if let Some(clock) = clock {
        clock.abort();
    }

    info!("Shutdown complete");
    Ok(())
}

#[cfg(feature = "cpal-output")]
fn list_devices() -> Result<()> {
    let devices = wavstream_player::audio::AudioOutput::list_devices()
        .context("Failed to list output devices")?;
    for name in devices {
        println!("{}", name);
    }
    Ok(())
}

#[cfg(not(feature = "cpal-output"))]
fn list_devices() -> Result<()> {
    warn!("Built without the cpal-output feature; no output devices to list");
    Ok(())
}

/// Drain the software device in real time when no sound card is attached
fn spawn_null_clock(device: SoftwareDevice, format: AudioFormat) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CLOCK_PERIOD);
        let started = Instant::now();
        let mut rendered: u64 = 0;

        loop {
            interval.tick().await;

            let due = (started.elapsed().as_secs_f64() * format.sample_rate as f64) as u64;
            if due > rendered {
                device.advance((due - rendered) as usize);
                rendered = due;
            }
        }
    })
}

/// Forward stdin lines from a plain thread; tokio's stdin would hold up
/// runtime shutdown while blocked on a read
fn spawn_command_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();

    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
    });

    rx
}

/// Resolves on Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
