//! Heatmap rendering.
//!
//! Density values are scaled by `alpha_permille / 1000`, made absolute, and
//! saturated into 8 bits. The quantisation is lossy on purpose: it keeps the
//! heatmap colours stable across frames with very different counts. The 8-bit
//! intensity is then coloured through a palette, or replicated to grey when
//! no palette is configured.

mod legend;
mod palette;

pub use legend::{add_graphics, gradient_level, tick_values, COLORBAR_WIDTH, LABEL_WIDTH};
pub use palette::{Lut, Palette};

use image::{Rgb, RgbImage};

use crate::density::DensityMap;

/// How a camera's density is turned into colour.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HeatmapStyle {
    pub alpha_permille: u32,
    pub palette: Option<Palette>,
}

impl HeatmapStyle {
    pub fn new(alpha_permille: u32, palette: Option<Palette>) -> Self {
        Self {
            alpha_permille,
            palette,
        }
    }

    /// Colour for an already quantised intensity.
    #[inline]
    pub fn colorize(&self, level: u8) -> Rgb<u8> {
        match self.palette {
            Some(palette) => Rgb(palette.color(level)),
            None => Rgb([level, level, level]),
        }
    }
}

/// Saturating `|value * alpha_permille / 1000|` rounded into `0..=255`.
#[inline]
pub fn scale_to_u8(value: f32, alpha_permille: u32) -> u8 {
    let scaled = (value as f64 * alpha_permille as f64 / 1000.0).abs();
    if scaled.is_nan() {
        return 0;
    }
    scaled.round().clamp(0.0, 255.0) as u8
}

/// Colour-map a density map into an RGB raster of the same size.
pub fn render(map: &DensityMap, style: &HeatmapStyle) -> RgbImage {
    let width = map.width() as u32;
    let height = map.height() as u32;
    RgbImage::from_fn(width, height, |x, y| {
        let value = map.get(y as usize, x as usize).unwrap_or(0.0);
        style.colorize(scale_to_u8(value, style.alpha_permille))
    })
}
