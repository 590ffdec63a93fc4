//! Output sinks for composited frames, and the run report.
//!
//! Frame dimensions and frame rate are fixed for a run: the first frame a sink
//! receives sets the dimensions, and every later frame must match them.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use image::RgbImage;
use serde::Serialize;

/// Receives composited frames strictly in increasing index order.
pub trait FrameSink {
    fn write_frame(&mut self, index: usize, frame: &RgbImage) -> Result<()>;

    /// Flush and close the sink. No frames may be written afterwards.
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Tracks the fixed dimensions and ordering shared by every sink.
#[derive(Debug, Default)]
struct FrameOrder {
    dimensions: Option<(u32, u32)>,
    next_index: usize,
    finished: bool,
}

impl FrameOrder {
    fn admit(&mut self, index: usize, frame: &RgbImage) -> Result<()> {
        if self.finished {
            return Err(anyhow!("sink already finished"));
        }
        if index != self.next_index {
            return Err(anyhow!(
                "frame {} written out of order (expected {})",
                index,
                self.next_index
            ));
        }
        match self.dimensions {
            Some(dims) if dims != frame.dimensions() => {
                return Err(anyhow!(
                    "frame {} is {}x{}, run dimensions are {}x{}",
                    index,
                    frame.width(),
                    frame.height(),
                    dims.0,
                    dims.1
                ));
            }
            Some(_) => {}
            None => self.dimensions = Some(frame.dimensions()),
        }
        self.next_index += 1;
        Ok(())
    }
}

/// Writes `<dir>/<prefix>_<index:06>.png`.
pub struct PngSequenceSink {
    dir: PathBuf,
    prefix: String,
    fps: u32,
    order: FrameOrder,
}

impl PngSequenceSink {
    pub fn create(dir: &Path, prefix: &str, fps: u32) -> Result<Self> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create output directory {}", dir.display()))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            prefix: prefix.to_string(),
            fps,
            order: FrameOrder::default(),
        })
    }

    pub fn frame_path(&self, index: usize) -> PathBuf {
        self.dir.join(format!("{}_{:06}.png", self.prefix, index))
    }

    pub fn frames_written(&self) -> usize {
        self.order.next_index
    }
}

impl FrameSink for PngSequenceSink {
    fn write_frame(&mut self, index: usize, frame: &RgbImage) -> Result<()> {
        self.order.admit(index, frame)?;
        let path = self.frame_path(index);
        frame
            .save_with_format(&path, image::ImageFormat::Png)
            .with_context(|| format!("failed to write frame {}", path.display()))?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.order.finished = true;
        log::info!(
            "wrote {} frames to {} ({} fps)",
            self.order.next_index,
            self.dir.display(),
            self.fps
        );
        Ok(())
    }
}

/// Keeps frames in memory.
#[derive(Default)]
pub struct MemorySink {
    frames: Vec<RgbImage>,
    order: FrameOrder,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> &[RgbImage] {
        &self.frames
    }

    pub fn into_frames(self) -> Vec<RgbImage> {
        self.frames
    }
}

impl FrameSink for MemorySink {
    fn write_frame(&mut self, index: usize, frame: &RgbImage) -> Result<()> {
        self.order.admit(index, frame)?;
        self.frames.push(frame.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.order.finished = true;
        Ok(())
    }
}

/// Summary of one run, written next to the frames as `report.json`.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub frames_written: usize,
    pub frame_width: u32,
    pub frame_height: u32,
    pub fps: u32,
    pub cancelled: bool,
    pub cameras: Vec<CameraReport>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CameraReport {
    pub name: String,
    pub source: String,
    pub scale_factor: usize,
    pub frames_produced: usize,
    pub predicted_counts: Vec<f64>,
    /// Sample index at which estimation or decoding failed, if it did.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truncated_at: Option<usize>,
}

impl RunReport {
    /// Total predicted count of frame `index` across cameras.
    pub fn total_count(&self, index: usize) -> f64 {
        self.cameras
            .iter()
            .filter_map(|camera| camera.predicted_counts.get(index))
            .sum()
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report {}", path.display()))?;
        Ok(())
    }
}
