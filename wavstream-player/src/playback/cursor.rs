//! Read position inside the data region of a wave file

use std::fs::File;
use std::io::{self, ErrorKind, Read, Seek, SeekFrom};
use tracing::{debug, trace};

/// File handle plus the next unread byte of the data region.
///
/// The position never leaves `[data_start, data_end]`. It only moves forward
/// while streaming; [`StreamCursor::reset`] puts it back at the first sample.
#[derive(Debug)]
pub struct StreamCursor<R = File> {
    reader: R,
    data_start: u64,
    data_end: u64,
    /// End of data as last observed; pulled in when the file turns out shorter
    readable_end: u64,
    position: u64,
}

impl<R: Read + Seek> StreamCursor<R> {
    /// Wrap a reader and seek it to the first sample
    pub fn new(mut reader: R, data_start: u64, data_end: u64) -> io::Result<Self> {
        reader.seek(SeekFrom::Start(data_start))?;
        Ok(Self {
            reader,
            data_start,
            data_end,
            readable_end: data_end,
            position: data_start,
        })
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn data_start(&self) -> u64 {
        self.data_start
    }

    pub fn data_end(&self) -> u64 {
        self.data_end
    }

    /// Bytes left before the end of the data region
    pub fn remaining(&self) -> u64 {
        self.readable_end.saturating_sub(self.position)
    }

    pub fn is_at_end(&self) -> bool {
        self.remaining() == 0
    }

    /// Fill `buf` from the current position, never reading past the data region.
    ///
    /// Keeps reading until `buf` is full or the reader reports end of file.
    /// Returns the number of bytes read; 0 means the data is exhausted. A
    /// reader that runs dry before the declared end is treated as end of data.
    /// On error the position is left where it was before the call.
    pub fn read_into(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let wanted = (buf.len() as u64).min(self.remaining()) as usize;
        let mut read = 0;

        while read < wanted {
            match self.reader.read(&mut buf[read..wanted]) {
                Ok(0) => {
                    debug!(
                        "File ended at offset {} before declared data end {}",
                        self.position + read as u64,
                        self.data_end
                    );
                    self.readable_end = self.position + read as u64;
                    break;
                }
                Ok(n) => read += n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => {
                    // Give back the partial read so the next call starts at the same byte
                    self.reader.seek(SeekFrom::Start(self.position))?;
                    return Err(e);
                }
            }
        }

        self.position += read as u64;
        trace!("Read {} bytes, cursor at {}", read, self.position);
        Ok(read)
    }

    /// Step back over `bytes` that were read but never submitted
    pub fn unread(&mut self, bytes: usize) -> io::Result<()> {
        let target = self.position.saturating_sub(bytes as u64).max(self.data_start);
        self.reader.seek(SeekFrom::Start(target))?;
        self.position = target;
        Ok(())
    }

    /// Return to the first sample of the data region
    pub fn reset(&mut self) -> io::Result<()> {
        self.reader.seek(SeekFrom::Start(self.data_start))?;
        self.position = self.data_start;
        self.readable_end = self.data_end;
        Ok(())
    }
}
