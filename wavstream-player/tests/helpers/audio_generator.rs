//! Canonical wave files written through hound
//!
//! Samples follow a deterministic ramp so every byte of the data region is
//! predictable and tests can compare submitted buffers byte for byte.

use hound::{SampleFormat, WavSpec, WavWriter};
use std::path::Path;

/// Write a PCM wave file with `frames` frames of ramp samples.
///
/// Returns the raw little-endian bytes of the data region as they appear in
/// the file (8-bit samples unsigned, 16-bit signed).
pub fn generate_pcm_wav<P: AsRef<Path>>(
    path: P,
    channels: u16,
    sample_rate: u32,
    bits_per_sample: u16,
    frames: usize,
) -> Result<Vec<u8>, hound::Error> {
    let spec = WavSpec {
        channels,
        sample_rate,
        bits_per_sample,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec)?;
    let mut data = Vec::new();
    let samples = frames * channels as usize;

    for n in 0..samples {
        match bits_per_sample {
            8 => {
                let sample = (n % 256) as u8;
                // hound takes 8-bit samples as signed and stores them offset by 128
                writer.write_sample((sample as i16 - 128) as i8)?;
                data.push(sample);
            }
            _ => {
                let sample = (n as i32 * 37 % 65536 - 32768) as i16;
                writer.write_sample(sample)?;
                data.extend_from_slice(&sample.to_le_bytes());
            }
        }
    }

    writer.finalize()?;
    Ok(data)
}

/// Deterministic PCM payload of `len` bytes
pub fn pcm_pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 % 251) as u8).collect()
}
