//! Radial (fisheye) undistortion of density maps.
//!
//! No calibrated optics are available for the deployed cameras, so the
//! intrinsics are synthesised from the map size: principal point at the image
//! centre and focal length of half the width, with a single radial coefficient
//! `k1` (distortion vector `[k1, 0, 0, 0, 0]`). This is a heuristic
//! approximation, not a calibrated optical model.

use serde::Deserialize;

use crate::density::DensityMap;
use crate::geometry::sample_bilinear;

/// First radial distortion coefficient of the Brown-Conrady model.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(transparent)]
pub struct DistortionCoefficient(pub f64);

/// Pinhole intrinsics synthesised from image dimensions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SyntheticIntrinsics {
    pub focal: f64,
    pub cx: f64,
    pub cy: f64,
}

impl SyntheticIntrinsics {
    pub fn for_size(width: usize, height: usize) -> Self {
        Self {
            focal: width as f64 / 2.0,
            cx: width as f64 / 2.0,
            cy: height as f64 / 2.0,
        }
    }
}

/// Undistort `map` when a coefficient is configured; identity otherwise.
pub fn correct(map: DensityMap, distortion: Option<DistortionCoefficient>) -> DensityMap {
    match distortion {
        Some(k) => undistort(&map, k),
        None => map,
    }
}

/// Remap every output pixel through the forward distortion model and sample
/// the input there. Output keeps the input shape; samples that fall outside
/// the source read as zero density.
pub fn undistort(map: &DensityMap, k1: DistortionCoefficient) -> DensityMap {
    let (width, height) = (map.width(), map.height());
    if width == 0 || height == 0 || k1.0 == 0.0 {
        return map.clone();
    }
    let k = SyntheticIntrinsics::for_size(width, height);

    DensityMap::from_fn(height, width, |row, col| {
        let xn = (col as f64 - k.cx) / k.focal;
        let yn = (row as f64 - k.cy) / k.focal;
        let radial = 1.0 + k1.0 * (xn * xn + yn * yn);
        let src_x = k.focal * xn * radial + k.cx;
        let src_y = k.focal * yn * radial + k.cy;
        sample_bilinear(map, src_x, src_y)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(height: usize, width: usize) -> DensityMap {
        DensityMap::from_fn(height, width, |row, col| {
            let dy = row as f32 - height as f32 / 2.0;
            let dx = col as f32 - width as f32 / 2.0;
            (-(dx * dx + dy * dy) / 20.0).exp()
        })
    }

    #[test]
    fn no_coefficient_is_identity() {
        let map = blob(16, 24);
        assert_eq!(correct(map.clone(), None), map);
    }

    #[test]
    fn zero_coefficient_is_identity() {
        let map = blob(16, 24);
        assert_eq!(undistort(&map, DistortionCoefficient(0.0)), map);
    }

    #[test]
    fn keeps_shape() {
        let map = blob(30, 40);
        let out = correct(map, Some(DistortionCoefficient(-0.3)));
        assert_eq!((out.height(), out.width()), (30, 40));
    }

    #[test]
    fn principal_point_is_fixed() {
        let map = DensityMap::from_fn(20, 20, |row, col| {
            if row == 10 && col == 10 {
                1.0
            } else {
                0.0
            }
        });
        let out = undistort(&map, DistortionCoefficient(0.5));
        assert!((out.get(10, 10).unwrap_or_default() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn barrel_correction_pulls_samples_from_farther_out() {
        // Positive k1 samples beyond the output pixel, so mass near the border
        // moves toward the centre and the corners read outside the source.
        let map = DensityMap::from_fn(20, 20, |_, _| 1.0);
        let out = undistort(&map, DistortionCoefficient(0.8));
        assert_eq!(out.get(0, 0), Some(0.0));
        assert!(out.get(10, 10).unwrap_or_default() > 0.99);
    }

    #[test]
    fn intrinsics_follow_image_size() {
        let k = SyntheticIntrinsics::for_size(1920, 1080);
        assert_eq!(k.focal, 960.0);
        assert_eq!(k.cx, 960.0);
        assert_eq!(k.cy, 540.0);
    }
}
