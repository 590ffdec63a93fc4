//! Density resampling: sum-pooling down to ground-plane units, then nearest
//! replication up to display resolution.
//!
//! Order matters. `downsample` conserves total density exactly; `upsample`
//! multiplies it by `factor^2` because it is a display resolution change, not
//! a re-aggregation. Upsampling first would break the conservation the
//! counts rely on.

use anyhow::{anyhow, Result};
use ndarray::{s, Array2};

use crate::density::DensityMap;
use crate::geometry::Quad;

/// Pooling factor for a camera: rectified pixels per ground-plane unit.
///
/// The global width is measured from corner A to corner D (`D.x - A.x`). A
/// non-positive width or a ratio truncating to zero is a configuration error.
pub fn scale_factor(rectified_width: usize, global: &Quad) -> Result<usize> {
    let global_width = global.d().x - global.a().x;
    if global_width.is_nan() || global_width <= 0.0 {
        return Err(anyhow!(
            "global quadrilateral width D.x - A.x must be positive, got {}",
            global_width
        ));
    }
    let factor = (rectified_width as f64 / global_width) as usize;
    if factor < 1 {
        return Err(anyhow!(
            "resampling scale factor is zero: rectified width {} is narrower than global width {}",
            rectified_width,
            global_width
        ));
    }
    Ok(factor)
}

/// Replace each `factor x factor` block with the sum of its cells.
///
/// Output is `ceil(H/factor) x ceil(W/factor)`; the last row and column of
/// blocks may be partial. Block sums are accumulated in f64.
pub fn downsample(map: &DensityMap, factor: usize) -> Result<DensityMap> {
    if factor == 0 {
        return Err(anyhow!("downsample factor must be at least 1"));
    }
    let (height, width) = (map.height(), map.width());
    let out_h = height.div_ceil(factor);
    let out_w = width.div_ceil(factor);
    let src = map.as_array();

    let pooled = Array2::from_shape_fn((out_h, out_w), |(row, col)| {
        let r0 = row * factor;
        let c0 = col * factor;
        let r1 = (r0 + factor).min(height);
        let c1 = (c0 + factor).min(width);
        src.slice(s![r0..r1, c0..c1])
            .iter()
            .map(|&v| v as f64)
            .sum::<f64>() as f32
    });
    Ok(DensityMap::from_array(pooled))
}

/// Nearest-neighbour upscale by an integer `factor`: every cell becomes a
/// `factor x factor` block of the same value.
pub fn upsample(map: &DensityMap, factor: usize) -> Result<DensityMap> {
    if factor == 0 {
        return Err(anyhow!("upsampling factor must be at least 1"));
    }
    let (height, width) = map
        .height()
        .checked_mul(factor)
        .zip(map.width().checked_mul(factor))
        .filter(|(h, w)| h.checked_mul(*w).is_some())
        .ok_or_else(|| {
            anyhow!(
                "upsampling a {}x{} map by {} overflows",
                map.width(),
                map.height(),
                factor
            )
        })?;
    let src = map.as_array();
    let scaled = Array2::from_shape_fn(
        (height, width),
        |(row, col)| src[[row / factor, col / factor]],
    );
    Ok(DensityMap::from_array(scaled))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn irregular(height: usize, width: usize) -> DensityMap {
        DensityMap::from_fn(height, width, |row, col| {
            ((row * 31 + col * 17) % 13) as f32 * 0.125 + 0.01
        })
    }

    #[test]
    fn downsample_conserves_total_for_any_factor() -> Result<()> {
        let map = irregular(37, 53);
        let total = map.sum();
        for factor in 1..=12 {
            let pooled = downsample(&map, factor)?;
            assert!(
                (pooled.sum() - total).abs() < 1e-3,
                "factor {factor}: {} vs {total}",
                pooled.sum()
            );
        }
        Ok(())
    }

    #[test]
    fn downsample_pads_partial_blocks() -> Result<()> {
        let map = DensityMap::from_fn(5, 7, |_, _| 1.0);
        let pooled = downsample(&map, 3)?;
        assert_eq!((pooled.height(), pooled.width()), (2, 3));
        assert_eq!(pooled.get(0, 0), Some(9.0));
        assert_eq!(pooled.get(0, 2), Some(3.0));
        assert_eq!(pooled.get(1, 0), Some(6.0));
        assert_eq!(pooled.get(1, 2), Some(2.0));
        assert_eq!(pooled.sum(), 35.0);
        Ok(())
    }

    #[test]
    fn downsample_factor_one_is_identity() -> Result<()> {
        let map = irregular(4, 6);
        assert_eq!(downsample(&map, 1)?, map);
        Ok(())
    }

    #[test]
    fn upsample_scales_total_by_factor_squared() -> Result<()> {
        let map = irregular(9, 4);
        for factor in [1usize, 2, 3, 10] {
            let up = upsample(&map, factor)?;
            assert_eq!((up.height(), up.width()), (9 * factor, 4 * factor));
            let expected = map.sum() * (factor * factor) as f64;
            assert!((up.sum() - expected).abs() < 1e-2 * factor as f64);
        }
        Ok(())
    }

    #[test]
    fn upsample_replicates_cells() -> Result<()> {
        let map = DensityMap::from_vec(1, 2, vec![1.0, 2.0])?;
        let up = upsample(&map, 2)?;
        assert_eq!(up, DensityMap::from_vec(2, 4, vec![1.0, 1.0, 2.0, 2.0, 1.0, 1.0, 2.0, 2.0])?);
        Ok(())
    }

    #[test]
    fn zero_factors_are_rejected() {
        let map = irregular(3, 3);
        assert!(downsample(&map, 0).is_err());
        assert!(upsample(&map, 0).is_err());
    }

    #[test]
    fn scale_factor_for_deployment_camera() -> Result<()> {
        let global = Quad::rect(100.0, 100.0, 200.0, 180.0);
        assert_eq!(scale_factor(1523, &global)?, 15);
        Ok(())
    }

    #[test]
    fn scale_factor_rejects_malformed_global_width() {
        let reversed = Quad::rect(200.0, 100.0, 100.0, 180.0);
        assert!(scale_factor(1523, &reversed).is_err());
        let narrow = Quad::rect(0.0, 0.0, 2000.0, 10.0);
        assert!(scale_factor(1523, &narrow).is_err());
    }

    #[test]
    fn upsample_rejects_overflowing_factor() {
        let map = irregular(3, 3);
        let err = upsample(&map, usize::MAX / 2).unwrap_err();
        assert!(err.to_string().contains("overflows"));
    }
}
