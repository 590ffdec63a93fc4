//! crowdmap: multi-camera crowd density heatmaps
//!
//! Each camera's video is sampled at a fixed stride, every sampled frame is
//! turned into a per-pixel density map by an estimator, and the maps are
//! projected onto a shared ground plane and composited into one heatmap video.
//!
//! # Per-frame pipeline
//!
//! 1. **Estimate**: `estimate::DensityEstimator` maps an RGB frame to density.
//! 2. **Correct**: optional radial (fisheye) undistortion (`correct`).
//! 3. **Rectify**: perspective warp of the calibrated local quad (`rectify`).
//! 4. **Resample**: sum-pool to ground-plane units, then nearest upsample to
//!    display resolution (`resample`).
//! 5. **Render**: saturating 8-bit scaling and palette lookup (`render`).
//! 6. **Composite**: each camera's heatmap is placed at its global quad's
//!    bounding box on a shared canvas, in camera order (`composite`).
//!
//! # Module Structure
//!
//! - `config`: TOML + env configuration, immutable `CameraConfig`
//! - `ingest`: sampled frame sources (local files, `stub://`)
//! - `pipeline`: free functions wiring the stages, lock-step multi-camera runs
//! - `output`: frame sinks and the JSON run report

pub mod composite;
pub mod config;
pub mod correct;
pub mod density;
pub mod estimate;
pub mod frame;
pub mod geometry;
pub mod ingest;
pub mod output;
pub mod pipeline;
pub mod rectify;
pub mod render;
pub mod resample;

pub use composite::{canvas_size, Compositor, Placement};
pub use config::{CameraConfig, CameraParams, CrowdmapConfig, EstimatorSettings};
pub use correct::{correct, DistortionCoefficient};
pub use density::DensityMap;
#[cfg(feature = "backend-tract")]
pub use estimate::TractEstimator;
pub use estimate::{DensityEstimator, EstimatorRegistry, StubEstimator};
pub use frame::Frame;
pub use geometry::{Homography, Point, Quad};
pub use ingest::{FileSource, SamplerConfig};
pub use output::{CameraReport, FrameSink, MemorySink, PngSequenceSink, RunReport};
pub use pipeline::{process_density, process_frame, run, RunOptions};
pub use rectify::{rectify, Rectification};
pub use render::{add_graphics, render, HeatmapStyle, Palette};
pub use resample::{downsample, scale_factor, upsample};

/// Report file written next to the output frames.
pub const REPORT_FILE_NAME: &str = "report.json";
