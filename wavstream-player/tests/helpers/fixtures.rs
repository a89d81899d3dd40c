//! Temporary directory for generated wave files

use super::riff_builder::RiffBuilder;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Owns a temporary directory; files vanish when it is dropped
pub struct Fixtures {
    temp_dir: TempDir,
}

impl Fixtures {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("create temp dir"),
        }
    }

    pub fn path(&self, filename: &str) -> PathBuf {
        self.temp_dir.path().join(filename)
    }

    /// Write a built RIFF container and return its path
    pub fn write(&self, filename: &str, builder: &RiffBuilder) -> PathBuf {
        self.write_bytes(filename, &builder.build())
    }

    pub fn write_bytes(&self, filename: &str, bytes: &[u8]) -> PathBuf {
        let path = self.path(filename);
        fs::write(&path, bytes).expect("write fixture");
        path
    }

    /// Canonical 44-byte-header file holding `data`
    pub fn canonical(&self, filename: &str, channels: u16, rate: u32, bits: u16, data: Vec<u8>) -> PathBuf {
        self.write(filename, &RiffBuilder::new(channels, rate, bits).data(data))
    }
}
