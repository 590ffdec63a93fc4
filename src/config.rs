use anyhow::{anyhow, Context, Result};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::composite::canvas_size;
use crate::correct::DistortionCoefficient;
use crate::geometry::Quad;
use crate::rectify::Rectification;
use crate::render::{HeatmapStyle, Palette};
use crate::resample::scale_factor;

const DEFAULT_OUTPUT_DIR: &str = "output";
const DEFAULT_OUTPUT_PREFIX: &str = "frame";
const DEFAULT_FPS: u32 = 30;
const DEFAULT_FRAME_INTERVAL: u64 = 3000;
const DEFAULT_COUNT_DIVISOR: f64 = 1000.0;
const DEFAULT_HEATMAP_ALPHA: u32 = 50;
const DEFAULT_UPSAMPLING_FACTOR: usize = 10;
const DEFAULT_PALETTE: Palette = Palette::Jet;
const DEFAULT_FRAME_TIMEOUT_MS: u64 = 30_000;
const DEFAULT_TARGET_WIDTH: u32 = 1920;
const DEFAULT_TARGET_HEIGHT: u32 = 1080;
const DEFAULT_ESTIMATOR: &str = "stub";

/// Palette identifier that disables colour mapping (greyscale heatmaps).
const NO_PALETTE: &str = "none";

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct CrowdmapConfigFile {
    output_dir: Option<PathBuf>,
    output_prefix: Option<String>,
    fps: Option<u32>,
    frame_interval: Option<u64>,
    count_divisor: Option<f64>,
    heatmap_alpha: Option<u32>,
    upsampling_factor: Option<usize>,
    palette: Option<String>,
    legend: Option<bool>,
    font_path: Option<PathBuf>,
    frame_timeout_ms: Option<u64>,
    target_width: Option<u32>,
    target_height: Option<u32>,
    estimator: Option<EstimatorConfigFile>,
    #[serde(default)]
    cameras: Vec<CameraConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct EstimatorConfigFile {
    backend: Option<String>,
    model_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CameraConfigFile {
    name: String,
    source: String,
    local: [[f64; 2]; 4],
    global: [[f64; 2]; 4],
    distortion: Option<DistortionCoefficient>,
    frame_interval: Option<u64>,
    count_divisor: Option<f64>,
    heatmap_alpha: Option<u32>,
    palette: Option<String>,
}

/// Run-wide configuration.
#[derive(Debug, Clone)]
pub struct CrowdmapConfig {
    pub output_dir: PathBuf,
    pub output_prefix: String,
    pub fps: u32,
    pub upsampling_factor: usize,
    pub legend: bool,
    /// Run-level palette and alpha; the legend colorbar and ticks use these.
    pub legend_style: HeatmapStyle,
    pub font_path: Option<PathBuf>,
    pub frame_timeout: Duration,
    pub target_width: u32,
    pub target_height: u32,
    pub estimator: EstimatorSettings,
    pub cameras: Vec<CameraConfig>,
}

#[derive(Debug, Clone)]
pub struct EstimatorSettings {
    pub backend: String,
    pub model_path: Option<PathBuf>,
}

/// One camera's calibration and rendering parameters.
///
/// Built only through [`CameraConfig::new`], which validates the geometry and
/// derives the rectification and resampling scale factor once. Immutable
/// afterwards.
#[derive(Debug, Clone)]
pub struct CameraConfig {
    name: String,
    source: String,
    local: Quad,
    global: Quad,
    distortion: Option<DistortionCoefficient>,
    frame_interval: u64,
    count_divisor: f64,
    style: HeatmapStyle,
    upsampling_factor: usize,
    rectification: Rectification,
    scale_factor: usize,
}

/// Parameters a camera is built from; see [`CameraConfig::new`].
#[derive(Debug, Clone)]
pub struct CameraParams {
    pub name: String,
    pub source: String,
    pub local: Quad,
    pub global: Quad,
    pub distortion: Option<DistortionCoefficient>,
    pub frame_interval: u64,
    pub count_divisor: f64,
    pub style: HeatmapStyle,
    pub upsampling_factor: usize,
}

impl CameraConfig {
    /// Validate calibration and derive per-camera geometry.
    ///
    /// Fails on an invalid name, a degenerate local quad, a global quad with
    /// negative coordinates or zero area, a scale factor below one, or a
    /// zero stride/divisor/alpha/upsampling factor.
    pub fn new(params: CameraParams) -> Result<Self> {
        validate_camera_name(&params.name)?;
        let name = params.name;
        if params.source.trim().is_empty() {
            return Err(anyhow!("camera '{}': source must not be empty", name));
        }
        if params.frame_interval == 0 {
            return Err(anyhow!("camera '{}': frame_interval must be at least 1", name));
        }
        if !(params.count_divisor.is_finite() && params.count_divisor > 0.0) {
            return Err(anyhow!(
                "camera '{}': count_divisor must be a positive number",
                name
            ));
        }
        if params.style.alpha_permille == 0 {
            return Err(anyhow!("camera '{}': heatmap_alpha must be at least 1", name));
        }
        if params.upsampling_factor == 0 {
            return Err(anyhow!("upsampling_factor must be at least 1"));
        }
        if let Some(DistortionCoefficient(k1)) = params.distortion {
            if !k1.is_finite() {
                return Err(anyhow!("camera '{}': distortion must be finite", name));
            }
        }
        let global_box = params.global.bounding_box();
        if global_box.min_x < 0.0 || global_box.min_y < 0.0 {
            return Err(anyhow!(
                "camera '{}': global quadrilateral has negative coordinates",
                name
            ));
        }

        let rectification = Rectification::for_quad(&params.local)
            .with_context(|| format!("camera '{}': invalid local quadrilateral", name))?;
        let scale_factor = scale_factor(rectification.width, &params.global)
            .with_context(|| format!("camera '{}': invalid global quadrilateral", name))?;
        log::debug!(
            "camera '{}': rectified {}x{}, scale factor {}",
            name,
            rectification.width,
            rectification.height,
            scale_factor
        );

        Ok(Self {
            name,
            source: params.source,
            local: params.local,
            global: params.global,
            distortion: params.distortion,
            frame_interval: params.frame_interval,
            count_divisor: params.count_divisor,
            style: params.style,
            upsampling_factor: params.upsampling_factor,
            rectification,
            scale_factor,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn local(&self) -> &Quad {
        &self.local
    }

    pub fn global(&self) -> &Quad {
        &self.global
    }

    pub fn distortion(&self) -> Option<DistortionCoefficient> {
        self.distortion
    }

    pub fn frame_interval(&self) -> u64 {
        self.frame_interval
    }

    pub fn count_divisor(&self) -> f64 {
        self.count_divisor
    }

    pub fn style(&self) -> &HeatmapStyle {
        &self.style
    }

    pub fn upsampling_factor(&self) -> usize {
        self.upsampling_factor
    }

    pub fn rectification(&self) -> &Rectification {
        &self.rectification
    }

    /// Rectified pixels per ground-plane unit.
    pub fn scale_factor(&self) -> usize {
        self.scale_factor
    }
}

impl CrowdmapConfig {
    /// Load from `path` (or `CROWDMAP_CONFIG`), then apply env overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var("CROWDMAP_CONFIG").ok().map(PathBuf::from));
        let mut file_cfg = match config_path.as_deref() {
            Some(path) => read_config_file(path)?,
            None => CrowdmapConfigFile::default(),
        };
        file_cfg.apply_env()?;
        Self::from_file(file_cfg)
    }

    /// Parse a TOML document without consulting the environment.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let file_cfg: CrowdmapConfigFile =
            toml::from_str(raw).map_err(|e| anyhow!("invalid config: {}", e))?;
        Self::from_file(file_cfg)
    }

    fn from_file(file: CrowdmapConfigFile) -> Result<Self> {
        let output_dir = file
            .output_dir
            .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));
        let output_prefix = file
            .output_prefix
            .unwrap_or_else(|| DEFAULT_OUTPUT_PREFIX.to_string());
        let fps = file.fps.unwrap_or(DEFAULT_FPS);
        let frame_interval = file.frame_interval.unwrap_or(DEFAULT_FRAME_INTERVAL);
        let count_divisor = file.count_divisor.unwrap_or(DEFAULT_COUNT_DIVISOR);
        let heatmap_alpha = file.heatmap_alpha.unwrap_or(DEFAULT_HEATMAP_ALPHA);
        let upsampling_factor = file
            .upsampling_factor
            .unwrap_or(DEFAULT_UPSAMPLING_FACTOR);
        let palette = match file.palette.as_deref() {
            Some(raw) => parse_palette(raw)?,
            None => Some(DEFAULT_PALETTE),
        };
        let estimator = EstimatorSettings {
            backend: file
                .estimator
                .as_ref()
                .and_then(|estimator| estimator.backend.clone())
                .unwrap_or_else(|| DEFAULT_ESTIMATOR.to_string()),
            model_path: file.estimator.and_then(|estimator| estimator.model_path),
        };

        let cameras = file
            .cameras
            .into_iter()
            .map(|camera| {
                let palette = match camera.palette.as_deref() {
                    Some(raw) => parse_palette(raw)
                        .with_context(|| format!("camera '{}'", camera.name))?,
                    None => palette,
                };
                CameraConfig::new(CameraParams {
                    name: camera.name,
                    source: camera.source,
                    local: Quad::from(camera.local),
                    global: Quad::from(camera.global),
                    distortion: camera.distortion,
                    frame_interval: camera.frame_interval.unwrap_or(frame_interval),
                    count_divisor: camera.count_divisor.unwrap_or(count_divisor),
                    style: HeatmapStyle::new(
                        camera.heatmap_alpha.unwrap_or(heatmap_alpha),
                        palette,
                    ),
                    upsampling_factor,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let cfg = Self {
            output_dir,
            output_prefix,
            fps,
            upsampling_factor,
            legend: file.legend.unwrap_or(false),
            legend_style: HeatmapStyle::new(heatmap_alpha, palette),
            font_path: file.font_path,
            frame_timeout: Duration::from_millis(
                file.frame_timeout_ms.unwrap_or(DEFAULT_FRAME_TIMEOUT_MS),
            ),
            target_width: file.target_width.unwrap_or(DEFAULT_TARGET_WIDTH),
            target_height: file.target_height.unwrap_or(DEFAULT_TARGET_HEIGHT),
            estimator,
            cameras,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.cameras.is_empty() {
            return Err(anyhow!("at least one [[cameras]] entry is required"));
        }
        let mut seen = HashSet::new();
        for camera in &self.cameras {
            if !seen.insert(camera.name()) {
                return Err(anyhow!("duplicate camera name '{}'", camera.name()));
            }
        }
        if self.fps == 0 {
            return Err(anyhow!("fps must be greater than zero"));
        }
        if self.upsampling_factor == 0 {
            return Err(anyhow!("upsampling_factor must be at least 1"));
        }
        let (width, height) = canvas_size(
            self.cameras.iter().map(CameraConfig::global),
            self.upsampling_factor,
        )
        .context("upsampling_factor is too large for the configured cameras")?;
        log::debug!("canvas {}x{}", width, height);
        if self.target_width == 0 || self.target_height == 0 {
            return Err(anyhow!("target resolution must be non-zero"));
        }
        if self.frame_timeout.is_zero() {
            return Err(anyhow!("frame_timeout_ms must be greater than zero"));
        }
        if self.output_prefix.trim().is_empty() || self.output_prefix.contains('/') {
            return Err(anyhow!(
                "output_prefix must be a non-empty file name prefix"
            ));
        }
        if self.estimator.backend.trim().is_empty() {
            return Err(anyhow!("estimator backend must not be empty"));
        }
        Ok(())
    }
}

impl CrowdmapConfigFile {
    fn apply_env(&mut self) -> Result<()> {
        if let Ok(dir) = std::env::var("CROWDMAP_OUTPUT_DIR") {
            if !dir.trim().is_empty() {
                self.output_dir = Some(PathBuf::from(dir));
            }
        }
        if let Ok(palette) = std::env::var("CROWDMAP_PALETTE") {
            if !palette.trim().is_empty() {
                self.palette = Some(palette);
            }
        }
        if let Ok(interval) = std::env::var("CROWDMAP_FRAME_INTERVAL") {
            if !interval.trim().is_empty() {
                let interval: u64 = interval.trim().parse().map_err(|_| {
                    anyhow!("CROWDMAP_FRAME_INTERVAL must be a positive integer")
                })?;
                self.frame_interval = Some(interval);
            }
        }
        if let Ok(backend) = std::env::var("CROWDMAP_ESTIMATOR") {
            if !backend.trim().is_empty() {
                self.estimator
                    .get_or_insert_with(EstimatorConfigFile::default)
                    .backend = Some(backend);
            }
        }
        Ok(())
    }
}

/// `none` disables colour mapping; anything else must name a palette.
pub fn parse_palette(raw: &str) -> Result<Option<Palette>> {
    let raw = raw.trim();
    if raw.eq_ignore_ascii_case(NO_PALETTE) {
        return Ok(None);
    }
    raw.parse::<Palette>().map(Some)
}

pub fn validate_camera_name(name: &str) -> Result<()> {
    let re = Regex::new(r"^[a-z0-9_-]{1,64}$")?;
    if !re.is_match(name) {
        return Err(anyhow!(
            "invalid camera name '{}': expected 1-64 chars of [a-z0-9_-]",
            name
        ));
    }
    Ok(())
}

fn read_config_file(path: &Path) -> Result<CrowdmapConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DEPLOYMENT: &str = r#"
        [[cameras]]
        name = "dji-0461"
        source = "stub://dji?frames=2"
        local = [[797, 293], [287, 653], [1761, 1040], [1734, 411]]
        global = [[100, 100], [100, 180], [200, 180], [200, 100]]
    "#;

    fn with_camera_field(field: &str) -> String {
        format!("{}        {}\n", DEPLOYMENT, field)
    }

    #[test]
    fn defaults_follow_deployment() -> Result<()> {
        let cfg = CrowdmapConfig::from_toml_str(DEPLOYMENT)?;
        assert_eq!(cfg.fps, 30);
        assert_eq!(cfg.upsampling_factor, 10);
        assert_eq!((cfg.target_width, cfg.target_height), (1920, 1080));
        assert_eq!(cfg.estimator.backend, "stub");
        let camera = &cfg.cameras[0];
        assert_eq!(camera.frame_interval(), 3000);
        assert_eq!(camera.count_divisor(), 1000.0);
        assert_eq!(camera.style().alpha_permille, 50);
        assert_eq!(camera.style().palette, Some(Palette::Jet));
        assert_eq!(camera.scale_factor(), 15);
        assert_eq!(camera.rectification().width, 1523);
        assert!(camera.distortion().is_none());
        Ok(())
    }

    #[test]
    fn per_camera_overrides_win() -> Result<()> {
        let raw = with_camera_field("palette = \"none\"\n        heatmap_alpha = 80\n        distortion = -0.2");
        let cfg = CrowdmapConfig::from_toml_str(&raw)?;
        let camera = &cfg.cameras[0];
        assert_eq!(camera.style().palette, None);
        assert_eq!(camera.style().alpha_permille, 80);
        assert_eq!(camera.distortion(), Some(DistortionCoefficient(-0.2)));
        Ok(())
    }

    #[test]
    fn unknown_palette_fails_fast() {
        let raw = format!("palette = \"sepia\"\n{}", DEPLOYMENT);
        let err = CrowdmapConfig::from_toml_str(&raw).unwrap_err();
        assert!(err.to_string().contains("unknown palette"));
    }

    #[test]
    fn degenerate_local_quad_is_rejected() {
        let raw = DEPLOYMENT.replace(
            "[[797, 293], [287, 653], [1761, 1040], [1734, 411]]",
            "[[10, 10], [10, 10], [11, 10], [11, 10]]",
        );
        assert!(CrowdmapConfig::from_toml_str(&raw).is_err());
    }

    #[test]
    fn zero_scale_factor_is_rejected() {
        let raw = DEPLOYMENT.replace(
            "[[100, 100], [100, 180], [200, 180], [200, 100]]",
            "[[0, 0], [0, 10], [5000, 10], [5000, 0]]",
        );
        assert!(CrowdmapConfig::from_toml_str(&raw).is_err());
    }

    #[test]
    fn oversized_canvas_is_rejected() {
        let raw = format!("upsampling_factor = 100000000\n{}", DEPLOYMENT);
        let err = CrowdmapConfig::from_toml_str(&raw).unwrap_err();
        assert!(format!("{:#}", err).contains("outside the canvas range"));

        let raw = format!("upsampling_factor = 1000\n{}", DEPLOYMENT);
        let err = CrowdmapConfig::from_toml_str(&raw).unwrap_err();
        assert!(format!("{:#}", err).contains("pixel limit"));
    }

    #[test]
    fn legend_style_follows_run_level_settings() -> Result<()> {
        let raw = format!(
            "heatmap_alpha = 80\npalette = \"hot\"\n{}        palette = \"none\"\n",
            DEPLOYMENT
        );
        let cfg = CrowdmapConfig::from_toml_str(&raw)?;
        assert_eq!(cfg.cameras[0].style().palette, None);
        assert_eq!(cfg.legend_style, HeatmapStyle::new(80, Some(Palette::Hot)));
        Ok(())
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let raw = format!("{}{}", DEPLOYMENT, DEPLOYMENT);
        let err = CrowdmapConfig::from_toml_str(&raw).unwrap_err();
        assert!(err.to_string().contains("duplicate camera name"));
    }

    #[test]
    fn camera_list_is_required() {
        assert!(CrowdmapConfig::from_toml_str("fps = 25").is_err());
    }

    #[test]
    fn camera_names_are_restricted() {
        assert!(validate_camera_name("north_gate-2").is_ok());
        assert!(validate_camera_name("North Gate").is_err());
        assert!(validate_camera_name("").is_err());
    }
}
