//! Cosmetic legend overlay: a predicted-count label and, for paletted
//! heatmaps, a vertical colorbar with numeric ticks appended on the right.

use ab_glyph::{FontArc, PxScale};
use image::{imageops, Rgb, RgbImage};
use imageproc::drawing::draw_text_mut;

use super::HeatmapStyle;

pub const COLORBAR_WIDTH: u32 = 50;
pub const LABEL_WIDTH: u32 = 100;

const TICK_COUNT: u32 = 10;
const COUNT_LABEL_OFFSET: (i32, i32) = (50, 50);
const COUNT_LABEL_SCALE: f32 = 32.0;
const TICK_LABEL_SCALE: f32 = 14.0;

/// Draw the count label onto `picture` and, when the style has a palette,
/// return it with the colorbar strip concatenated to its right edge.
///
/// Text needs a font; without one only the colorbar is drawn.
pub fn add_graphics(
    picture: &RgbImage,
    count: f64,
    style: &HeatmapStyle,
    font: Option<&FontArc>,
) -> RgbImage {
    let mut labelled = picture.clone();
    if let Some(font) = font {
        draw_text_mut(
            &mut labelled,
            Rgb([255, 255, 255]),
            COUNT_LABEL_OFFSET.0,
            COUNT_LABEL_OFFSET.1,
            PxScale::from(COUNT_LABEL_SCALE),
            font,
            &format!("Predicted Count: {:.1}", count),
        );
    }

    let Some(palette) = style.palette else {
        return labelled;
    };

    let bar_height = labelled.height();
    let mut strip = RgbImage::from_pixel(COLORBAR_WIDTH + LABEL_WIDTH, bar_height, Rgb([255; 3]));
    for y in 0..bar_height {
        let color = Rgb(palette.color(gradient_level(y, bar_height)));
        for x in 0..COLORBAR_WIDTH {
            strip.put_pixel(x, y, color);
        }
    }
    if let Some(font) = font {
        for (row, value) in tick_values(style.alpha_permille, bar_height) {
            draw_text_mut(
                &mut strip,
                Rgb([0, 0, 0]),
                (COLORBAR_WIDTH + 10) as i32,
                row as i32,
                PxScale::from(TICK_LABEL_SCALE),
                font,
                &format!("{:.2}", value),
            );
        }
    }

    let mut combined = RgbImage::new(labelled.width() + strip.width(), bar_height);
    imageops::replace(&mut combined, &labelled, 0, 0);
    imageops::replace(&mut combined, &strip, labelled.width() as i64, 0);
    combined
}

/// Intensity shown at colorbar row `y`: 256 discrete steps, 255 at the top
/// down to 0 at the bottom.
pub fn gradient_level(y: u32, bar_height: u32) -> u8 {
    if bar_height == 0 {
        return 0;
    }
    let step = (y as u64 * 256 / bar_height as u64).min(255);
    (255 - step) as u8
}

/// Ten evenly spaced `(row, value)` ticks, value `255 / alpha * (1 - row / height)`.
pub fn tick_values(alpha_permille: u32, bar_height: u32) -> Vec<(u32, f64)> {
    if bar_height == 0 || alpha_permille == 0 {
        return Vec::new();
    }
    let step = (bar_height / TICK_COUNT).max(1);
    let top = 255.0 / alpha_permille as f64;
    (0..TICK_COUNT)
        .map(|i| i * step)
        .take_while(|&row| row < bar_height)
        .map(|row| (row, top * (1.0 - row as f64 / bar_height as f64)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::Palette;

    #[test]
    fn colorbar_is_appended_only_with_palette() {
        let picture = RgbImage::new(40, 300);

        let grey = add_graphics(&picture, 12.0, &HeatmapStyle::new(50, None), None);
        assert_eq!(grey.dimensions(), (40, 300));

        let jet = add_graphics(&picture, 12.0, &HeatmapStyle::new(50, Some(Palette::Jet)), None);
        assert_eq!(jet.dimensions(), (40 + COLORBAR_WIDTH + LABEL_WIDTH, 300));
        assert_eq!(jet.get_pixel(40, 0), &Rgb(Palette::Jet.color(255)));
        assert_eq!(jet.get_pixel(40, 299), &Rgb(Palette::Jet.color(0)));
        assert_eq!(jet.get_pixel(40 + COLORBAR_WIDTH + 5, 150), &Rgb([255, 255, 255]));
    }

    #[test]
    fn gradient_has_256_steps() {
        assert_eq!(gradient_level(0, 256), 255);
        assert_eq!(gradient_level(255, 256), 0);
        assert_eq!(gradient_level(0, 512), 255);
        assert_eq!(gradient_level(1, 512), 255);
        assert_eq!(gradient_level(2, 512), 254);
    }

    #[test]
    fn ten_ticks_from_top_value() {
        let ticks = tick_values(50, 1000);
        assert_eq!(ticks.len(), 10);
        assert_eq!(ticks[0], (0, 5.1));
        let (row, value) = ticks[9];
        assert_eq!(row, 900);
        assert!((value - 0.51).abs() < 1e-9);
    }

    #[test]
    fn short_bars_still_get_ticks() {
        let ticks = tick_values(50, 4);
        assert_eq!(ticks.len(), 4);
        assert!(tick_values(0, 100).is_empty());
    }
}
