//! Perspective rectification of a camera-local quadrilateral.
//!
//! The calibrated ground region seen by a camera is an arbitrary quad in pixel
//! space. Rectification warps it onto an axis-aligned rectangle whose sides
//! are the longer of each pair of opposite quad edges, giving a top-down view.

use anyhow::{anyhow, Result};

use crate::density::DensityMap;
use crate::geometry::{sample_bilinear, Homography, Point, Quad};

/// Precomputed warp for one camera's local quad.
#[derive(Clone, Copy, Debug)]
pub struct Rectification {
    /// Maps output (rectified) pixels back into the source map.
    source_from_output: Homography,
    pub width: usize,
    pub height: usize,
}

impl Rectification {
    /// Validate `local` and solve its homography.
    ///
    /// A quad whose rectified width or height is under two pixels, or that has
    /// three collinear corners, is degenerate geometry and is rejected.
    pub fn for_quad(local: &Quad) -> Result<Self> {
        let (width, height) = local.rectified_size();
        if width < 2 || height < 2 {
            return Err(anyhow!(
                "degenerate local quadrilateral {:?}: rectifies to {}x{}",
                local.points,
                width,
                height
            ));
        }
        let target = Quad::new(
            Point::new(0.0, 0.0),
            Point::new(0.0, (height - 1) as f64),
            Point::new((width - 1) as f64, (height - 1) as f64),
            Point::new((width - 1) as f64, 0.0),
        );
        let forward = Homography::from_quads(local, &target)?;
        Ok(Self {
            source_from_output: forward.inverse()?,
            width,
            height,
        })
    }

    pub fn apply(&self, map: &DensityMap) -> DensityMap {
        warp_perspective(map, &self.source_from_output, self.width, self.height)
    }
}

/// Rectify `map` through the quad `local` (corners A, B, C, D).
pub fn rectify(map: &DensityMap, local: &Quad) -> Result<DensityMap> {
    Ok(Rectification::for_quad(local)?.apply(map))
}

/// Inverse-map warp: each output pixel samples `map` at
/// `source_from_output(x, y)` with bilinear interpolation; out-of-range
/// samples are zero density.
pub fn warp_perspective(
    map: &DensityMap,
    source_from_output: &Homography,
    width: usize,
    height: usize,
) -> DensityMap {
    DensityMap::from_fn(height, width, |row, col| {
        match source_from_output.apply(Point::new(col as f64, row as f64)) {
            Some(src) => sample_bilinear(map, src.x, src.y),
            None => 0.0,
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pattern(height: usize, width: usize) -> DensityMap {
        DensityMap::from_fn(height, width, |row, col| ((row * 7 + col * 3) % 11) as f32)
    }

    #[test]
    fn identity_warp_returns_input() -> Result<()> {
        let map = pattern(12, 17);
        let full = Quad::rect(0.0, 0.0, 16.0, 11.0);
        let h = Homography::from_quads(&full, &full)?;
        let out = warp_perspective(&map, &h, 17, 12);
        for row in 0..12 {
            for col in 0..17 {
                let (a, b) = (map.get(row, col), out.get(row, col));
                let (a, b) = (a.unwrap_or_default(), b.unwrap_or_default());
                assert!((a - b).abs() < 1e-4, "mismatch at ({row}, {col}): {a} vs {b}");
            }
        }
        Ok(())
    }

    #[test]
    fn output_shape_follows_quad_edges() -> Result<()> {
        let map = DensityMap::zeros(1080, 1920);
        let local = Quad::from([
            [797.0, 293.0],
            [287.0, 653.0],
            [1761.0, 1040.0],
            [1734.0, 411.0],
        ]);
        let rect = Rectification::for_quad(&local)?;
        assert_eq!((rect.width, rect.height), (1523, 629));
        let out = rect.apply(&map);
        assert_eq!((out.height(), out.width()), (629, 1523));
        Ok(())
    }

    #[test]
    fn axis_aligned_sub_rectangle_is_a_crop() -> Result<()> {
        let map = pattern(20, 20);
        // A(2,3) B(2,9) C(12,9) D(12,3): 10 wide, 6 tall, pure translation.
        let local = Quad::rect(2.0, 3.0, 12.0, 9.0);
        let out = rectify(&map, &local)?;
        assert_eq!((out.height(), out.width()), (6, 10));
        // Output spans 0..=9 for source 2..=12, so the first column is exact.
        assert!((out.get(0, 0).unwrap_or_default() - map.get(3, 2).unwrap_or_default()).abs() < 1e-4);
        Ok(())
    }

    #[test]
    fn outside_source_is_zero() -> Result<()> {
        let map = DensityMap::from_fn(10, 10, |_, _| 1.0);
        let local = Quad::rect(-20.0, -20.0, -5.0, -5.0);
        let out = rectify(&map, &local)?;
        assert_eq!(out.sum(), 0.0);
        Ok(())
    }

    #[test]
    fn one_pixel_wide_quad_is_degenerate_error() {
        let map = DensityMap::zeros(10, 10);
        let thin = Quad::rect(3.0, 0.0, 4.0, 9.0);
        let err = rectify(&map, &thin).expect_err("1px quad must be rejected");
        assert!(err.to_string().contains("degenerate"));

        let flat = Quad::rect(0.0, 5.0, 9.0, 6.0);
        assert!(rectify(&map, &flat).is_err());
    }

    #[test]
    fn collinear_quad_is_rejected() {
        let map = DensityMap::zeros(50, 50);
        let line = Quad::from([[0.0, 0.0], [10.0, 10.0], [20.0, 20.0], [30.0, 40.0]]);
        assert!(rectify(&map, &line).is_err());
    }
}
