//! Per-frame processing and run orchestration.
//!
//! One frame of one camera flows through estimation, then
//! `correct -> rectify -> downsample -> upsample -> render`. Runs advance all
//! cameras in lock step: frame `n` of every camera is decoded, processed
//! (cameras in parallel on rayon), composited in camera order and written
//! before frame `n + 1` is touched, so only one frame per camera is alive at a
//! time.
//!
//! A camera whose frame `n` fails to decode or estimate ends the composited
//! sequence at `n` (the output length is the shortest camera's length). The
//! run only fails when every camera fails at the same index.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ab_glyph::FontArc;
use anyhow::{anyhow, Context, Result};
use image::RgbImage;
use rayon::prelude::*;

use crate::composite::Compositor;
use crate::config::{CameraConfig, CrowdmapConfig};
use crate::correct::correct;
use crate::density::DensityMap;
use crate::estimate::{check_output, DensityEstimator, EstimatorRegistry};
use crate::frame::Frame;
use crate::ingest::{FileSource, SamplerConfig};
use crate::output::{CameraReport, FrameSink, RunReport};
use crate::render::{add_graphics, render, HeatmapStyle};
use crate::resample::{downsample, upsample};

/// Result of processing one frame of one camera.
#[derive(Debug, Clone)]
pub struct CameraFrame {
    pub heatmap: RgbImage,
    pub predicted_count: f64,
}

/// Options that shape the composited output but not the per-camera maps.
#[derive(Clone, Copy, Default)]
pub struct RunOptions<'a> {
    /// Draw the count label and colorbar onto every composited frame, in
    /// this style.
    pub legend: Option<HeatmapStyle>,
    pub font: Option<&'a FontArc>,
    /// Checked between frames; when set the run stops and reports what it has.
    pub cancel: Option<&'a AtomicBool>,
    /// Called with each frame index once it has been written.
    pub on_frame: Option<&'a dyn Fn(usize)>,
}

/// `sum(map) / count_divisor`, taken on the raw estimator output.
pub fn predicted_count(map: &DensityMap, count_divisor: f64) -> f64 {
    map.sum() / count_divisor
}

/// Geometric and colour stages for one density map.
pub fn process_density(map: DensityMap, camera: &CameraConfig) -> Result<RgbImage> {
    let corrected = correct(map, camera.distortion());
    let rectified = camera.rectification().apply(&corrected);
    let pooled = downsample(&rectified, camera.scale_factor())?;
    let display = upsample(&pooled, camera.upsampling_factor())?;
    Ok(render(&display, camera.style()))
}

/// Estimate one frame and run it through the camera's stages.
pub fn process_frame(
    frame: &Frame,
    camera: &CameraConfig,
    estimator: &dyn DensityEstimator,
) -> Result<CameraFrame> {
    let map = estimator
        .estimate(frame)
        .and_then(|map| check_output(estimator.name(), map))
        .with_context(|| {
            format!(
                "camera '{}': estimation failed on frame {}",
                camera.name(),
                frame.sample_index
            )
        })?;
    let predicted_count = predicted_count(&map, camera.count_divisor());
    log::info!(
        "camera '{}' frame {}: predicted count {:.2}",
        camera.name(),
        frame.sample_index,
        predicted_count
    );
    let heatmap = process_density(map, camera)
        .with_context(|| format!("camera '{}': frame {}", camera.name(), frame.sample_index))?;
    Ok(CameraFrame {
        heatmap,
        predicted_count,
    })
}

/// Open one sampled source per camera, in camera order.
pub fn open_sources(config: &CrowdmapConfig) -> Result<Vec<FileSource>> {
    config
        .cameras
        .iter()
        .map(|camera| {
            let mut source = FileSource::new(SamplerConfig {
                path: camera.source().to_string(),
                frame_interval: camera.frame_interval(),
                target_width: config.target_width,
                target_height: config.target_height,
                frame_timeout: config.frame_timeout,
            })
            .with_context(|| format!("camera '{}'", camera.name()))?;
            source
                .connect()
                .with_context(|| format!("camera '{}': failed to open source", camera.name()))?;
            Ok(source)
        })
        .collect()
}

/// Resolve the configured estimator and warm it up once for the whole run.
pub fn load_estimator(
    config: &CrowdmapConfig,
    registry: &EstimatorRegistry,
) -> Result<Arc<dyn DensityEstimator>> {
    let estimator = registry.require(&config.estimator.backend)?;
    estimator
        .warm_up()
        .with_context(|| format!("estimator '{}' failed to warm up", estimator.name()))?;
    Ok(estimator)
}

pub fn load_font(path: &Path) -> Result<FontArc> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read font {}", path.display()))?;
    FontArc::try_from_vec(bytes).map_err(|e| anyhow!("invalid font {}: {}", path.display(), e))
}

/// Font for the legend labels; `None` when the legend is off or no font is
/// configured.
pub fn legend_font(config: &CrowdmapConfig) -> Result<Option<FontArc>> {
    match (&config.font_path, config.legend) {
        (Some(path), true) => load_font(path).map(Some),
        (None, true) => {
            log::warn!("legend enabled without font_path; count labels are skipped");
            Ok(None)
        }
        _ => Ok(None),
    }
}

/// Process every camera, composite, and write frames to `sink`.
///
/// `sources[i]` feeds `cameras[i]`; cameras are drawn in slice order, so a
/// later camera wins where placements overlap.
pub fn run(
    cameras: &[CameraConfig],
    sources: &mut [FileSource],
    estimator: &dyn DensityEstimator,
    sink: &mut dyn FrameSink,
    options: RunOptions<'_>,
) -> Result<RunReport> {
    if cameras.len() != sources.len() {
        return Err(anyhow!(
            "{} cameras configured but {} sources opened",
            cameras.len(),
            sources.len()
        ));
    }
    let globals: Vec<_> = cameras.iter().map(|camera| *camera.global()).collect();
    let upsampling_factor = cameras
        .first()
        .map(CameraConfig::upsampling_factor)
        .ok_or_else(|| anyhow!("no cameras configured"))?;
    let compositor = Compositor::new(&globals, upsampling_factor)?;

    let mut reports: Vec<CameraReport> = cameras
        .iter()
        .map(|camera| CameraReport {
            name: camera.name().to_string(),
            source: camera.source().to_string(),
            scale_factor: camera.scale_factor(),
            frames_produced: 0,
            predicted_counts: Vec::new(),
            truncated_at: None,
        })
        .collect();

    let mut index = 0usize;
    let mut cancelled = false;
    let mut output_size = compositor.canvas_size();
    loop {
        if options
            .cancel
            .is_some_and(|flag| flag.load(Ordering::SeqCst))
        {
            log::warn!("run cancelled after {} frames", index);
            cancelled = true;
            break;
        }

        let frames: Vec<Result<Option<Frame>>> =
            sources.iter_mut().map(FileSource::next_frame).collect();
        let outcomes: Vec<Result<Option<CameraFrame>>> = frames
            .into_par_iter()
            .zip(cameras.par_iter())
            .map(|(frame, camera)| match frame {
                Ok(Some(frame)) => process_frame(&frame, camera, estimator).map(Some),
                Ok(None) => Ok(None),
                Err(err) => Err(err.context(format!(
                    "camera '{}': failed to read frame {}",
                    camera.name(),
                    index
                ))),
            })
            .collect();

        if outcomes.iter().all(Result::is_err) {
            let reasons: Vec<String> = outcomes
                .iter()
                .filter_map(|outcome| outcome.as_ref().err())
                .map(|err| format!("{:#}", err))
                .collect();
            return Err(anyhow!(
                "every camera failed at frame {}: {}",
                index,
                reasons.join("; ")
            ));
        }

        let mut produced = Vec::with_capacity(cameras.len());
        for ((outcome, camera), report) in outcomes
            .into_iter()
            .zip(cameras.iter())
            .zip(reports.iter_mut())
        {
            match outcome {
                Ok(Some(frame)) => produced.push(frame),
                Ok(None) => {
                    log::info!("camera '{}' has no frames after {}", camera.name(), index);
                }
                Err(err) => {
                    log::warn!("{:#}; output truncated at frame {}", err, index);
                    report.truncated_at = Some(index);
                }
            }
        }
        if produced.len() < cameras.len() {
            break;
        }

        let heatmaps: Vec<&RgbImage> = produced.iter().map(|frame| &frame.heatmap).collect();
        let mut canvas = compositor.compose(&heatmaps)?;
        if let Some(style) = &options.legend {
            let total: f64 = produced.iter().map(|frame| frame.predicted_count).sum();
            canvas = add_graphics(&canvas, total, style, options.font);
        }
        output_size = canvas.dimensions();
        sink.write_frame(index, &canvas)?;
        if let Some(on_frame) = options.on_frame {
            on_frame(index);
        }

        for (frame, report) in produced.iter().zip(reports.iter_mut()) {
            report.predicted_counts.push(frame.predicted_count);
            report.frames_produced += 1;
        }
        index += 1;
    }
    sink.finish()?;
    for (source, camera) in sources.iter().zip(cameras) {
        let stats = source.stats();
        log::debug!(
            "camera '{}': {} frames sampled from {}",
            camera.name(),
            stats.frames_sampled,
            stats.path
        );
    }

    if index == 0 {
        log::warn!("no frames were composited");
    }
    Ok(RunReport {
        frames_written: index,
        frame_width: output_size.0,
        frame_height: output_size.1,
        fps: 0,
        cancelled,
        cameras: reports,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CameraParams;
    use crate::geometry::Quad;
    use crate::render::{HeatmapStyle, Palette};

    fn camera(global: Quad, palette: Option<Palette>) -> Result<CameraConfig> {
        CameraConfig::new(CameraParams {
            name: "cam".into(),
            source: "stub://cam".into(),
            local: Quad::rect(0.0, 0.0, 39.0, 19.0),
            global,
            distortion: None,
            frame_interval: 1,
            count_divisor: 1.0,
            style: HeatmapStyle::new(1000, palette),
            upsampling_factor: 2,
        })
    }

    #[test]
    fn count_uses_raw_density() {
        let map = DensityMap::from_fn(4, 4, |_, _| 250.0);
        assert_eq!(predicted_count(&map, 1000.0), 4.0);
    }

    #[test]
    fn processed_heatmap_matches_placement() -> Result<()> {
        // Rectified 39x19, global width 13 -> scale 3, pooled 13x7, shown 26x14.
        let camera = camera(Quad::rect(0.0, 0.0, 13.0, 7.0), None)?;
        assert_eq!(camera.scale_factor(), 3);
        let map = DensityMap::from_fn(20, 40, |_, _| 0.1);
        let heatmap = process_density(map, &camera)?;
        assert_eq!(heatmap.dimensions(), (26, 14));
        Ok(())
    }

    #[test]
    fn process_frame_reports_count() -> Result<()> {
        let camera = camera(Quad::rect(0.0, 0.0, 13.0, 7.0), Some(Palette::Jet))?;
        let frame = Frame::new(0, 0, 40, 20, vec![255; 40 * 20 * 3])?;
        let estimator = crate::estimate::StubEstimator::with_gain(1.0);
        let result = process_frame(&frame, &camera, &estimator)?;
        assert!((result.predicted_count - 800.0).abs() < 1e-3);
        Ok(())
    }
}
