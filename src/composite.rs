//! Multi-camera compositing onto a shared ground-plane canvas.
//!
//! The canvas spans `(max global x, max global y) * upsampling_factor` over all
//! cameras. Each camera's heatmap is resized to fill the scaled bounding box of
//! its global quad and copied over whatever is already there, so where
//! placements overlap the later camera wins.

use anyhow::{anyhow, Result};
use image::{imageops, RgbImage};

use crate::geometry::{BoundingBox, Quad};

/// Pixel rectangle `[x, x + width) x [y, y + height)` on the canvas.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Placement {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Placement {
    /// Scaled bounding box of `global`, in canvas pixels.
    pub fn for_quad(global: &Quad, upsampling_factor: usize) -> Result<Self> {
        let bbox = global.bounding_box().scaled(upsampling_factor as f64);
        if bbox.min_x < 0.0 || bbox.min_y < 0.0 {
            return Err(anyhow!(
                "global quadrilateral {:?} has negative coordinates",
                global.points
            ));
        }
        let x0 = canvas_coord(bbox.min_x)?;
        let y0 = canvas_coord(bbox.min_y)?;
        let x1 = canvas_coord(bbox.max_x)?;
        let y1 = canvas_coord(bbox.max_y)?;
        if x1 <= x0 || y1 <= y0 {
            return Err(anyhow!(
                "global quadrilateral {:?} covers no canvas area",
                global.points
            ));
        }
        Ok(Self {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        })
    }

    fn as_bbox(&self) -> BoundingBox {
        BoundingBox {
            min_x: self.x as f64,
            min_y: self.y as f64,
            max_x: (self.x + self.width) as f64,
            max_y: (self.y + self.height) as f64,
        }
    }

    pub fn overlaps(&self, other: &Placement) -> bool {
        self.as_bbox().intersects(&other.as_bbox())
    }
}

/// Largest canvas a run may allocate, in pixels (768 MiB of RGB).
pub const MAX_CANVAS_PIXELS: u64 = 1 << 28;

/// Round a scaled world coordinate to a canvas pixel, rejecting values that
/// do not fit in `u32`.
fn canvas_coord(value: f64) -> Result<u32> {
    let rounded = value.round();
    if !rounded.is_finite() || rounded < 0.0 || rounded > u32::MAX as f64 {
        return Err(anyhow!(
            "scaled coordinate {} is outside the canvas range",
            value
        ));
    }
    Ok(rounded as u32)
}

/// Canvas `(width, height)`: the largest global coordinate on each axis over
/// all quads, scaled by the shared upsampling factor.
///
/// Fails when a scaled coordinate overflows `u32` or the canvas exceeds
/// [`MAX_CANVAS_PIXELS`].
pub fn canvas_size<'a, I>(globals: I, upsampling_factor: usize) -> Result<(u32, u32)>
where
    I: IntoIterator<Item = &'a Quad>,
{
    let (mut max_x, mut max_y) = (0.0_f64, 0.0_f64);
    for quad in globals {
        for p in &quad.points {
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
    }
    let k = upsampling_factor as f64;
    let width = canvas_coord(max_x * k)?;
    let height = canvas_coord(max_y * k)?;
    let pixels = width as u64 * height as u64;
    if pixels > MAX_CANVAS_PIXELS {
        return Err(anyhow!(
            "canvas {}x{} exceeds the {} pixel limit; lower upsampling_factor",
            width,
            height,
            MAX_CANVAS_PIXELS
        ));
    }
    Ok((width, height))
}

/// Canvas geometry fixed for a whole run.
#[derive(Clone, Debug)]
pub struct Compositor {
    width: u32,
    height: u32,
    placements: Vec<Placement>,
}

impl Compositor {
    /// Plan the canvas for cameras with these global quads, in draw order.
    pub fn new(globals: &[Quad], upsampling_factor: usize) -> Result<Self> {
        if globals.is_empty() {
            return Err(anyhow!("compositor needs at least one camera"));
        }
        if upsampling_factor == 0 {
            return Err(anyhow!("upsampling factor must be at least 1"));
        }
        let (width, height) = canvas_size(globals, upsampling_factor)?;
        let placements = globals
            .iter()
            .map(|quad| Placement::for_quad(quad, upsampling_factor))
            .collect::<Result<Vec<_>>>()?;

        for (i, a) in placements.iter().enumerate() {
            for (j, b) in placements.iter().enumerate().skip(i + 1) {
                if a.overlaps(b) {
                    log::warn!(
                        "camera placements #{} and #{} overlap; camera #{} is drawn on top",
                        i,
                        j,
                        j
                    );
                }
            }
        }

        Ok(Self {
            width,
            height,
            placements,
        })
    }

    pub fn canvas_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    /// Build one output frame from one heatmap per camera, in camera order.
    pub fn compose(&self, heatmaps: &[&RgbImage]) -> Result<RgbImage> {
        if heatmaps.len() != self.placements.len() {
            return Err(anyhow!(
                "expected {} camera heatmaps, got {}",
                self.placements.len(),
                heatmaps.len()
            ));
        }
        let mut canvas = RgbImage::new(self.width, self.height);
        for (heatmap, placement) in heatmaps.iter().zip(self.placements.iter()) {
            place(&mut canvas, heatmap, placement)?;
        }
        Ok(canvas)
    }
}

/// Resize `heatmap` to fill `placement` (bilinear) and overwrite that region.
pub fn place(canvas: &mut RgbImage, heatmap: &RgbImage, placement: &Placement) -> Result<()> {
    if heatmap.width() == 0 || heatmap.height() == 0 {
        return Err(anyhow!("cannot place an empty heatmap"));
    }
    if heatmap.dimensions() == (placement.width, placement.height) {
        imageops::replace(canvas, heatmap, placement.x as i64, placement.y as i64);
    } else {
        let resized = imageops::resize(
            heatmap,
            placement.width,
            placement.height,
            imageops::FilterType::Triangle,
        );
        imageops::replace(canvas, &resized, placement.x as i64, placement.y as i64);
    }
    Ok(())
}
