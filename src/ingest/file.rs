//! Local video file frame sampling.
//!
//! `FileSource` yields every `frame_interval`-th decoded frame of a local video
//! file, resized to the estimator input resolution, in increasing index order.
//! Sample `i` is source frame `i * frame_interval`, and a file of `N` frames
//! yields `N / frame_interval` samples. A frame that cannot be decoded is an
//! explicit error, never a silent skip.
//!
//! `stub://<name>[?frames=N][&fail_at=K]` paths produce synthetic frames
//! without touching the filesystem: `N` samples (default 8), with sample `K`
//! failing to decode.

use std::time::Duration;

use anyhow::{anyhow, Result};
use regex::Regex;

#[cfg(feature = "ingest-file-ffmpeg")]
use super::file_ffmpeg::FfmpegFileSource;
use crate::frame::Frame;

const DEFAULT_STUB_FRAMES: usize = 8;

/// Configuration for a sampled file source.
#[derive(Clone, Debug)]
pub struct SamplerConfig {
    /// Local file path (e.g., "/work/input/DJI_0461.MP4") or `stub://...`.
    pub path: String,
    /// Keep one decoded frame out of every `frame_interval`.
    pub frame_interval: u64,
    /// Output resolution of sampled frames.
    pub target_width: u32,
    pub target_height: u32,
    /// Longest the decoder may go without producing any frame (sampled or
    /// skipped) before the read is reported as stalled.
    pub frame_timeout: Duration,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            frame_interval: 3000,
            target_width: 1920,
            target_height: 1080,
            frame_timeout: Duration::from_secs(30),
        }
    }
}

/// Sampled local file frame source.
pub struct FileSource {
    backend: FileBackend,
}

enum FileBackend {
    Synthetic(SyntheticFileSource),
    #[cfg(feature = "ingest-file-ffmpeg")]
    Ffmpeg(FfmpegFileSource),
}

impl FileSource {
    pub fn new(config: SamplerConfig) -> Result<Self> {
        if !is_local_file_path(&config.path) {
            return Err(anyhow!(
                "file ingestion only supports local paths (no URL schemes): '{}'",
                config.path
            ));
        }
        if config.frame_interval == 0 {
            return Err(anyhow!("frame interval must be at least 1"));
        }
        if config.target_width == 0 || config.target_height == 0 {
            return Err(anyhow!("target resolution must be non-zero"));
        }
        if config.path.starts_with("stub://") {
            Ok(Self {
                backend: FileBackend::Synthetic(SyntheticFileSource::new(config)?),
            })
        } else {
            #[cfg(feature = "ingest-file-ffmpeg")]
            {
                Ok(Self {
                    backend: FileBackend::Ffmpeg(FfmpegFileSource::new(config)?),
                })
            }
            #[cfg(not(feature = "ingest-file-ffmpeg"))]
            {
                Err(anyhow!(
                    "file ingestion requires the ingest-file-ffmpeg feature"
                ))
            }
        }
    }

    /// Open the source.
    pub fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            FileBackend::Synthetic(source) => source.connect(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.connect(),
        }
    }

    /// Next sampled frame, `Ok(None)` once the sequence is exhausted.
    pub fn next_frame(&mut self) -> Result<Option<Frame>> {
        match &mut self.backend {
            FileBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.next_frame(),
        }
    }

    /// Number of samples the source will yield, when known up front.
    pub fn sample_count(&self) -> Option<usize> {
        match &self.backend {
            FileBackend::Synthetic(source) => Some(source.total),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.sample_count(),
        }
    }

    /// Get frame statistics.
    pub fn stats(&self) -> FileStats {
        match &self.backend {
            FileBackend::Synthetic(source) => source.stats(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.stats(),
        }
    }
}

/// Statistics for a file source.
#[derive(Clone, Debug)]
pub struct FileStats {
    pub frames_sampled: u64,
    pub path: String,
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests
// ----------------------------------------------------------------------------

struct SyntheticFileSource {
    config: SamplerConfig,
    total: usize,
    fail_at: Option<usize>,
    next_index: usize,
}

impl SyntheticFileSource {
    fn new(config: SamplerConfig) -> Result<Self> {
        let (total, fail_at) = parse_stub_path(&config.path)?;
        Ok(Self {
            config,
            total,
            fail_at,
            next_index: 0,
        })
    }

    fn connect(&mut self) -> Result<()> {
        log::info!(
            "FileSource: connected to {} (synthetic, {} samples)",
            self.config.path,
            self.total
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if self.next_index >= self.total {
            return Ok(None);
        }
        let index = self.next_index;
        self.next_index += 1;
        let source_index = index as u64 * self.config.frame_interval;
        if self.fail_at == Some(index) {
            return Err(anyhow!(
                "failed to decode frame {} of {}",
                source_index,
                self.config.path
            ));
        }

        let pixels = self.generate_synthetic_pixels(index);
        Frame::new(
            index,
            source_index,
            self.config.target_width,
            self.config.target_height,
            pixels,
        )
        .map(Some)
    }

    /// Dark background with a bright square drifting one step right per sample.
    fn generate_synthetic_pixels(&self, index: usize) -> Vec<u8> {
        let width = self.config.target_width as usize;
        let height = self.config.target_height as usize;
        let side = (width.min(height) / 4).max(1);
        let x0 = (index * side / 2) % width.saturating_sub(side).max(1);
        let y0 = (height - side) / 2;

        let mut pixels = vec![0u8; width * height * 3];
        for (i, pixel) in pixels.chunks_exact_mut(3).enumerate() {
            let (x, y) = (i % width, i / width);
            let inside = x >= x0 && x < x0 + side && y >= y0 && y < y0 + side;
            let level = if inside { 255 } else { 16 };
            pixel.copy_from_slice(&[level, level, level]);
        }
        pixels
    }

    fn stats(&self) -> FileStats {
        FileStats {
            frames_sampled: self.next_index as u64,
            path: self.config.path.clone(),
        }
    }
}

fn parse_stub_path(path: &str) -> Result<(usize, Option<usize>)> {
    let re = Regex::new(r"^stub://[A-Za-z0-9_-]+(?:\?frames=(\d+))?(?:&fail_at=(\d+))?$")?;
    let caps = re
        .captures(path)
        .ok_or_else(|| anyhow!("invalid synthetic source path '{}'", path))?;
    let total = match caps.get(1) {
        Some(m) => m.as_str().parse()?,
        None => DEFAULT_STUB_FRAMES,
    };
    let fail_at = caps.get(2).map(|m| m.as_str().parse()).transpose()?;
    Ok((total, fail_at))
}

fn is_local_file_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    if path.starts_with("stub://") {
        return true;
    }
    !path.contains("://")
}
