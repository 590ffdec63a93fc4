//! crowdmap - render a multi-camera crowd density heatmap sequence
//!
//! 1. Loads the camera configuration (TOML + env overrides)
//! 2. Loads the density estimator once and shares it across cameras
//! 3. Samples every camera's video, estimates and projects density per frame
//! 4. Composites the cameras onto one canvas and writes a PNG per frame
//! 5. Writes `report.json` with per-camera predicted counts

use anyhow::{anyhow, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crowdmap::config::CrowdmapConfig;
use crowdmap::pipeline::{legend_font, load_estimator, open_sources, run, RunOptions};
use crowdmap::{EstimatorRegistry, PngSequenceSink, StubEstimator, REPORT_FILE_NAME};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(
    name = "crowdmap",
    version,
    about = "Composite per-camera crowd density into a ground-plane heatmap sequence"
)]
struct Args {
    /// Path to the TOML configuration (falls back to CROWDMAP_CONFIG)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Override the output directory
    #[arg(long, value_name = "DIR")]
    out: Option<PathBuf>,

    /// Draw the predicted count and colorbar on every frame
    #[arg(long)]
    legend: bool,

    /// Validate the configuration and exit without processing video
    #[arg(long)]
    check: bool,

    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = ui::Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);

    let mut config = {
        let _stage = ui.stage("Load configuration");
        CrowdmapConfig::load(args.config.as_deref())?
    };
    if let Some(out) = args.out {
        config.output_dir = out;
    }
    config.legend |= args.legend;
    for camera in &config.cameras {
        log::info!(
            "camera '{}': source={}, scale factor {}, stride {}",
            camera.name(),
            camera.source(),
            camera.scale_factor(),
            camera.frame_interval()
        );
    }
    if args.check {
        log::info!("configuration OK ({} cameras)", config.cameras.len());
        return Ok(());
    }

    let estimator = {
        let _stage = ui.stage("Load estimator");
        let registry = build_registry(&config)?;
        load_estimator(&config, &registry)?
    };
    let font = legend_font(&config)?;

    let mut sources = {
        let _stage = ui.stage("Open video sources");
        open_sources(&config)?
    };
    let total = sources
        .iter()
        .map(|source| source.sample_count())
        .collect::<Option<Vec<_>>>()
        .and_then(|counts| counts.into_iter().min())
        .map(|count| count as u64);

    let cancel = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&cancel);
    ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::SeqCst);
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    let mut sink = PngSequenceSink::create(&config.output_dir, &config.output_prefix, config.fps)?;
    let mut report = {
        let stage = ui.frames_stage("Composite frames", total);
        let on_frame = |index: usize| stage.frame_done(index);
        run(
            &config.cameras,
            &mut sources,
            estimator.as_ref(),
            &mut sink,
            RunOptions {
                legend: config.legend.then_some(config.legend_style),
                font: font.as_ref(),
                cancel: Some(cancel.as_ref()),
                on_frame: Some(&on_frame),
            },
        )?
    };
    report.fps = config.fps;

    let report_path = config.output_dir.join(REPORT_FILE_NAME);
    report.write_json(&report_path)?;
    log::info!(
        "{} frames ({}x{}) written to {}; report at {}",
        report.frames_written,
        report.frame_width,
        report.frame_height,
        config.output_dir.display(),
        report_path.display()
    );
    if report.cancelled {
        log::warn!("run was interrupted; output is partial");
    }
    Ok(())
}

fn build_registry(config: &CrowdmapConfig) -> Result<EstimatorRegistry> {
    let mut registry = EstimatorRegistry::new();
    registry.register(StubEstimator::new());

    #[cfg(feature = "backend-tract")]
    if let Some(model_path) = &config.estimator.model_path {
        let tract = crowdmap::TractEstimator::new(
            model_path,
            config.target_width,
            config.target_height,
        )?;
        registry.register(tract);
    }

    if config.estimator.backend == "tract" && registry.get("tract").is_none() {
        return Err(anyhow!(
            "estimator 'tract' needs the backend-tract feature and [estimator].model_path"
        ));
    }
    Ok(registry)
}
