//! Sound card output using cpal
//!
//! Opens an output stream at the file's own sample rate and channel count
//! (no resampling) and pulls frames from a [`SoftwareDevice`] in the audio
//! callback. `cpal::Stream` is not `Send`, so an `AudioOutput` stays on the
//! thread that created it.

use crate::audio::software::SoftwareDevice;
use crate::audio::types::{AudioFormat, AudioFrame};
use crate::error::{Error, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, Stream, StreamConfig};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, error, info, warn};

/// Audio output manager using cpal
pub struct AudioOutput {
    device: Device,
    config: StreamConfig,
    sample_format: SampleFormat,
    stream: Option<Stream>,
    volume: Arc<Mutex<f32>>,
    /// Set by the stream error callback
    error_flag: Arc<AtomicBool>,
}

impl AudioOutput {
    /// Names of the available output devices
    pub fn list_devices() -> Result<Vec<String>> {
        let host = cpal::default_host();

        let devices: Vec<String> = host
            .output_devices()
            .map_err(|e| Error::Device(format!("Failed to enumerate devices: {}", e)))?
            .filter_map(|device| device.name().ok())
            .collect();

        debug!("Found {} output devices", devices.len());
        Ok(devices)
    }

    /// Open an output device able to play `format` verbatim.
    ///
    /// A named device that cannot be found falls back to the host default.
    ///
    /// # Errors
    /// `DeviceAllocation` when no device is available or the device has no
    /// configuration for the format's rate and channel count.
    pub fn open(device_name: Option<&str>, format: &AudioFormat) -> Result<Self> {
        let host = cpal::default_host();

        let device = match device_name {
            Some(name) => {
                let mut devices = host.output_devices().map_err(|e| {
                    Error::DeviceAllocation(format!("Failed to enumerate devices: {}", e))
                })?;

                match devices.find(|d| d.name().ok().as_deref() == Some(name)) {
                    Some(device) => {
                        info!("Found requested audio device: {}", name);
                        device
                    }
                    None => {
                        warn!("Requested device '{}' not found, falling back to default device", name);
                        host.default_output_device().ok_or_else(|| {
                            Error::DeviceAllocation(format!(
                                "Device '{}' not found and no default device available",
                                name
                            ))
                        })?
                    }
                }
            }
            None => host
                .default_output_device()
                .ok_or_else(|| Error::DeviceAllocation("No default output device found".to_string()))?,
        };

        info!(
            "Using audio device: {}",
            device.name().unwrap_or_else(|_| "Unknown".to_string())
        );

        let (config, sample_format) = Self::matching_config(&device, format)?;
        debug!(
            "Audio config: sample_rate={}, channels={}, format={:?}",
            config.sample_rate.0, config.channels, sample_format
        );

        Ok(Self {
            device,
            config,
            sample_format,
            stream: None,
            volume: Arc::new(Mutex::new(1.0)),
            error_flag: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Find a device configuration at the file's exact rate and channel count,
    /// preferring f32 samples
    fn matching_config(device: &Device, format: &AudioFormat) -> Result<(StreamConfig, SampleFormat)> {
        let rate = format.sample_rate;
        let channels = format.channel_count();

        let candidates: Vec<_> = device
            .supported_output_configs()
            .map_err(|e| Error::DeviceAllocation(format!("Failed to get device configs: {}", e)))?
            .filter(|range| {
                range.channels() == channels
                    && range.min_sample_rate().0 <= rate
                    && range.max_sample_rate().0 >= rate
                    && matches!(
                        range.sample_format(),
                        SampleFormat::F32 | SampleFormat::I16 | SampleFormat::U16
                    )
            })
            .collect();

        let chosen = candidates
            .iter()
            .find(|range| range.sample_format() == SampleFormat::F32)
            .or_else(|| candidates.first())
            .ok_or_else(|| {
                Error::DeviceAllocation(format!(
                    "device cannot play {} Hz with {} channel(s)",
                    rate, channels
                ))
            })?;

        let sample_format = chosen.sample_format();
        let config = chosen.clone().with_sample_rate(cpal::SampleRate(rate)).config();
        Ok((config, sample_format))
    }

    /// Start the stream; the callback renders whatever `source` has queued
    pub fn start(&mut self, source: SoftwareDevice) -> Result<()> {
        info!("Starting audio stream");

        let stream = match self.sample_format {
            SampleFormat::F32 => self.build_stream::<f32>(source, |s| s)?,
            SampleFormat::I16 => self.build_stream::<i16>(source, |s| (s * i16::MAX as f32) as i16)?,
            SampleFormat::U16 => self.build_stream::<u16>(source, |s| ((s + 1.0) * 32767.5) as u16)?,
            sample_format => {
                return Err(Error::Device(format!(
                    "Unsupported sample format: {:?}",
                    sample_format
                )));
            }
        };

        stream
            .play()
            .map_err(|e| Error::Device(format!("Failed to start stream: {}", e)))?;

        self.stream = Some(stream);
        info!("Audio stream started successfully");
        Ok(())
    }

    fn build_stream<T>(&self, source: SoftwareDevice, convert: fn(f32) -> T) -> Result<Stream>
    where
        T: cpal::SizedSample + Send + 'static,
    {
        let channels = self.config.channels as usize;
        let volume = Arc::clone(&self.volume);
        let error_flag = Arc::clone(&self.error_flag);
        let mut scratch: Vec<f32> = Vec::new();
        let mut frames: Vec<AudioFrame> = Vec::new();

        self.device
            .build_output_stream(
                &self.config,
                move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                    let current_volume = *volume.lock().unwrap_or_else(PoisonError::into_inner);

                    scratch.resize(data.len(), 0.0);
                    source.render_interleaved(&mut scratch, &mut frames, channels, current_volume);

                    for (out, &sample) in data.iter_mut().zip(scratch.iter()) {
                        *out = convert(sample);
                    }
                },
                move |err| {
                    error!("Audio stream error: {}", err);
                    error_flag.store(true, Ordering::SeqCst);
                },
                None,
            )
            .map_err(|e| Error::Device(format!("Failed to build stream: {}", e)))
    }

    /// Pause and drop the stream
    pub fn stop(&mut self) -> Result<()> {
        info!("Stopping audio stream");

        if let Some(stream) = self.stream.take() {
            stream
                .pause()
                .map_err(|e| Error::Device(format!("Failed to pause stream: {}", e)))?;
        }

        Ok(())
    }

    /// Set output volume (0.0 to 1.0)
    pub fn set_volume(&self, volume: f32) {
        *self.volume.lock().unwrap_or_else(PoisonError::into_inner) = volume.clamp(0.0, 1.0);
    }

    /// True once the stream has reported an error
    pub fn has_error(&self) -> bool {
        self.error_flag.load(Ordering::SeqCst)
    }
}
