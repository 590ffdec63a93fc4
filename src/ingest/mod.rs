//! Frame ingestion.
//!
//! Each camera reads one local video file through a `FileSource`, which yields
//! sampled, resized RGB frames in increasing index order:
//! - Local video files (feature: ingest-file-ffmpeg)
//! - `stub://` synthetic sources (testing)
//!
//! Frames live in memory only for the duration of one estimation.

pub mod file;
#[cfg(feature = "ingest-file-ffmpeg")]
pub(crate) mod file_ffmpeg;
#[cfg_attr(not(feature = "ingest-file-ffmpeg"), allow(dead_code))]
pub(crate) mod stall;

pub use file::{FileSource, FileStats, SamplerConfig};
