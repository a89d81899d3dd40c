//! RIFF/WAVE container reader
//!
//! Locates the PCM sample data inside a wave file and derives its format.
//! Two independent passes over the stream:
//!
//! 1. **Header pass**: reads the canonical 44-byte header and takes the
//!    channel count (offset 22), sample rate (offset 24) and bits per sample
//!    (offset 34) from their fixed positions.
//! 2. **Chunk walk**: starting right after the 12-byte `RIFF`/size/`WAVE`
//!    preamble, reads 8-byte chunk headers and skips every chunk by its
//!    declared size until the `data` chunk is found.
//!
//! The walk tolerates metadata chunks (`LIST`, `fact`, ...) between the
//! format chunk and the samples. Each pass is validated on its own; the data
//! offset always comes from the walk, the format always from the header.

use crate::audio::types::AudioFormat;
use crate::error::{Error, Result};
use std::fs::File;
use std::io::{ErrorKind, Read, Seek, SeekFrom};
use std::path::Path;
use tracing::{debug, trace};

/// Size of the canonical wave header read by the header pass
pub const CANONICAL_HEADER_LEN: usize = 44;

/// `RIFF` + size + `WAVE`
const PREAMBLE_LEN: u64 = 12;

/// 4-byte tag + 4-byte little-endian size
const CHUNK_HEADER_LEN: u64 = 8;

const WAVE_FORMAT_PCM: u16 = 1;
const WAVE_FORMAT_EXTENSIBLE: u16 = 0xFFFE;

/// Where the samples live and how to interpret them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavLayout {
    /// Format taken from the fixed header offsets
    pub format: AudioFormat,

    /// Absolute byte offset of the first sample (just past the `data` chunk header)
    pub data_offset: u64,

    /// Size field of the `data` chunk as written in the file
    pub declared_data_len: u32,

    /// Bytes of sample data that are actually streamable.
    ///
    /// Equals the declared size unless it is 0 or runs past the end of the
    /// file, in which case the data region extends to end of file.
    pub data_len: u64,
}

impl WavLayout {
    /// First byte past the data region
    pub fn data_end(&self) -> u64 {
        self.data_offset + self.data_len
    }
}

/// Parser for PCM wave containers
pub struct WavContainerReader;

impl WavContainerReader {
    /// Open a wave file and parse its layout.
    ///
    /// Returns the open file positioned at the first sample together with the layout.
    pub fn open(path: &Path) -> Result<(File, WavLayout)> {
        debug!("Opening wave container: {}", path.display());

        let mut file = File::open(path)?;
        let layout = Self::read(&mut file)?;
        Ok((file, layout))
    }

    /// Parse the layout of any seekable byte stream.
    ///
    /// On success the stream is left positioned at `data_offset`.
    ///
    /// # Errors
    /// - `MalformedContainer`: bad preamble, header shorter than 44 bytes, or no
    ///   `data` chunk before end of stream
    /// - `UnsupportedFormat`: not PCM, or not mono/stereo × 8/16-bit
    pub fn read<R: Read + Seek>(reader: &mut R) -> Result<WavLayout> {
        let stream_len = reader.seek(SeekFrom::End(0))?;

        let format = Self::read_header_format(reader)?;
        let (data_offset, declared_data_len) = Self::locate_data_chunk(reader, stream_len)?;

        let remaining = stream_len.saturating_sub(data_offset);
        let data_len = match declared_data_len as u64 {
            0 => remaining,
            declared if declared > remaining => {
                debug!(
                    "data chunk declares {} bytes but only {} remain; streaming to end of file",
                    declared, remaining
                );
                remaining
            }
            declared => declared,
        };

        debug!(
            "Wave layout: {} Hz, {} channel(s), {} bits, data at offset {} ({} bytes)",
            format.sample_rate,
            format.channel_count(),
            format.bits_per_sample(),
            data_offset,
            data_len
        );

        Ok(WavLayout {
            format,
            data_offset,
            declared_data_len,
            data_len,
        })
    }

    /// Header pass: fixed-offset fields of the canonical 44-byte header
    fn read_header_format<R: Read + Seek>(reader: &mut R) -> Result<AudioFormat> {
        reader.seek(SeekFrom::Start(0))?;

        let mut header = [0u8; CANONICAL_HEADER_LEN];
        reader.read_exact(&mut header).map_err(|e| match e.kind() {
            ErrorKind::UnexpectedEof => Error::MalformedContainer(format!(
                "truncated header (need {} bytes)",
                CANONICAL_HEADER_LEN
            )),
            _ => Error::Io(e),
        })?;

        if &header[0..4] != b"RIFF" {
            return Err(Error::MalformedContainer("missing RIFF preamble".to_string()));
        }
        if &header[8..12] != b"WAVE" {
            return Err(Error::MalformedContainer("missing WAVE identifier".to_string()));
        }

        let format_code = read_u16_le(&header, 20);
        if format_code != WAVE_FORMAT_PCM && format_code != WAVE_FORMAT_EXTENSIBLE {
            return Err(Error::UnsupportedFormat(format!(
                "wave format code {:#06x} is not uncompressed PCM",
                format_code
            )));
        }

        let channel_count = read_u16_le(&header, 22);
        let sample_rate = read_u32_le(&header, 24);
        let bits_per_sample = read_u16_le(&header, 34);

        AudioFormat::new(sample_rate, channel_count, bits_per_sample)
    }

    /// Chunk walk: returns (absolute data offset, declared data size)
    fn locate_data_chunk<R: Read + Seek>(reader: &mut R, stream_len: u64) -> Result<(u64, u32)> {
        let mut position = reader.seek(SeekFrom::Start(PREAMBLE_LEN))?;

        loop {
            if position + CHUNK_HEADER_LEN > stream_len {
                return Err(Error::MalformedContainer(
                    "no data chunk found before end of stream".to_string(),
                ));
            }

            let mut chunk_header = [0u8; CHUNK_HEADER_LEN as usize];
            reader.read_exact(&mut chunk_header)?;

            let tag = &chunk_header[0..4];
            let size = read_u32_le(&chunk_header, 4);

            if tag == b"data" {
                return Ok((position + CHUNK_HEADER_LEN, size));
            }

            trace!(
                "Skipping chunk '{}' ({} bytes) at offset {}",
                String::from_utf8_lossy(tag),
                size,
                position
            );

            position = reader.seek(SeekFrom::Current(size as i64))?;
        }
    }
}

fn read_u16_le(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

fn read_u32_le(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}
