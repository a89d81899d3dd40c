//! Hand-assembled RIFF/WAVE containers
//!
//! Writes the canonical `fmt ` chunk first, then any filler chunks, then the
//! `data` chunk and optional trailing chunks. Chunks are written exactly as
//! declared with no pad bytes.

/// Builder for wave files hound cannot produce
#[derive(Debug, Clone)]
pub struct RiffBuilder {
    format_code: u16,
    channels: u16,
    sample_rate: u32,
    bits_per_sample: u16,
    fillers: Vec<([u8; 4], Vec<u8>)>,
    data: Vec<u8>,
    declared_data_len: Option<u32>,
    trailers: Vec<([u8; 4], Vec<u8>)>,
    data_tag: [u8; 4],
}

impl RiffBuilder {
    pub fn new(channels: u16, sample_rate: u32, bits_per_sample: u16) -> Self {
        Self {
            format_code: 1,
            channels,
            sample_rate,
            bits_per_sample,
            fillers: Vec::new(),
            data: Vec::new(),
            declared_data_len: None,
            trailers: Vec::new(),
            data_tag: *b"data",
        }
    }

    pub fn format_code(mut self, code: u16) -> Self {
        self.format_code = code;
        self
    }

    /// Add a chunk between `fmt ` and `data`
    pub fn filler(mut self, tag: &[u8; 4], payload: Vec<u8>) -> Self {
        self.fillers.push((*tag, payload));
        self
    }

    pub fn data(mut self, data: Vec<u8>) -> Self {
        self.data = data;
        self
    }

    /// Write a `data` size field that differs from the payload length
    pub fn declared_data_len(mut self, len: u32) -> Self {
        self.declared_data_len = Some(len);
        self
    }

    /// Add a chunk after the sample data
    pub fn trailer(mut self, tag: &[u8; 4], payload: Vec<u8>) -> Self {
        self.trailers.push((*tag, payload));
        self
    }

    /// Rename the `data` chunk so no data chunk exists
    pub fn without_data_chunk(mut self) -> Self {
        self.data_tag = *b"dat_";
        self
    }

    /// Offset of the first sample in the built file
    pub fn data_offset(&self) -> u64 {
        let fillers: usize = self.fillers.iter().map(|(_, payload)| 8 + payload.len()).sum();
        (44 + fillers) as u64
    }

    pub fn build(&self) -> Vec<u8> {
        let block_align = self.channels * self.bits_per_sample / 8;

        let mut body = Vec::new();
        body.extend_from_slice(b"WAVE");
        body.extend_from_slice(b"fmt ");
        body.extend_from_slice(&16u32.to_le_bytes());
        body.extend_from_slice(&self.format_code.to_le_bytes());
        body.extend_from_slice(&self.channels.to_le_bytes());
        body.extend_from_slice(&self.sample_rate.to_le_bytes());
        body.extend_from_slice(&(self.sample_rate * block_align as u32).to_le_bytes());
        body.extend_from_slice(&block_align.to_le_bytes());
        body.extend_from_slice(&self.bits_per_sample.to_le_bytes());

        for (tag, payload) in &self.fillers {
            push_chunk(&mut body, tag, payload.len() as u32, payload);
        }

        let declared = self.declared_data_len.unwrap_or(self.data.len() as u32);
        push_chunk(&mut body, &self.data_tag, declared, &self.data);

        for (tag, payload) in &self.trailers {
            push_chunk(&mut body, tag, payload.len() as u32, payload);
        }

        let mut bytes = Vec::with_capacity(body.len() + 8);
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&(body.len() as u32).to_le_bytes());
        bytes.extend_from_slice(&body);
        bytes
    }
}

fn push_chunk(out: &mut Vec<u8>, tag: &[u8; 4], declared_len: u32, payload: &[u8]) {
    out.extend_from_slice(tag);
    out.extend_from_slice(&declared_len.to_le_bytes());
    out.extend_from_slice(payload);
}
