//! Decoded video frames handed from ingestion to density estimation.
//!
//! A `Frame` is a packed RGB24 raster that has already been resized to the
//! estimator's input resolution. It lives only while its density map is being
//! estimated and is dropped right after.

use anyhow::{anyhow, Result};

pub struct Frame {
    /// Position in the sampled sequence (0, 1, 2, ...).
    pub sample_index: usize,
    /// Frame number in the source video (`sample_index * frame_interval`).
    pub source_index: u64,
    pub width: u32,
    pub height: u32,
    data: Vec<u8>,
}

impl Frame {
    pub fn new(
        sample_index: usize,
        source_index: u64,
        width: u32,
        height: u32,
        data: Vec<u8>,
    ) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if data.len() != expected {
            return Err(anyhow!(
                "RGB frame length mismatch: expected {}, got {}",
                expected,
                data.len()
            ));
        }
        Ok(Self {
            sample_index,
            source_index,
            width,
            height,
            data,
        })
    }

    /// Packed RGB bytes, row-major.
    pub fn pixels(&self) -> &[u8] {
        &self.data
    }
}
