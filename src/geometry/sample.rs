use crate::density::DensityMap;

/// Bilinear lookup at continuous `(x, y)`, pixel centres on integer coordinates.
///
/// Neighbours outside the map contribute zero density, so samples past the
/// border fade to zero rather than repeating edge values.
#[inline]
pub fn sample_bilinear(map: &DensityMap, x: f64, y: f64) -> f32 {
    if !x.is_finite() || !y.is_finite() {
        return 0.0;
    }
    let width = map.width() as f64;
    let height = map.height() as f64;
    if x <= -1.0 || y <= -1.0 || x >= width || y >= height {
        return 0.0;
    }

    let x0 = x.floor();
    let y0 = y.floor();
    let fx = (x - x0) as f32;
    let fy = (y - y0) as f32;
    let x0 = x0 as i64;
    let y0 = y0 as i64;

    let at = |col: i64, row: i64| -> f32 {
        if col < 0 || row < 0 {
            return 0.0;
        }
        map.get(row as usize, col as usize).unwrap_or(0.0)
    };

    let top = at(x0, y0) * (1.0 - fx) + at(x0 + 1, y0) * fx;
    let bottom = at(x0, y0 + 1) * (1.0 - fx) + at(x0 + 1, y0 + 1) * fx;
    top * (1.0 - fy) + bottom * fy
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ramp() -> DensityMap {
        DensityMap::from_fn(3, 3, |row, col| (row * 3 + col) as f32)
    }

    #[test]
    fn integer_coordinates_hit_pixels() {
        let map = ramp();
        assert_eq!(sample_bilinear(&map, 0.0, 0.0), 0.0);
        assert_eq!(sample_bilinear(&map, 2.0, 1.0), 5.0);
        assert_eq!(sample_bilinear(&map, 2.0, 2.0), 8.0);
    }

    #[test]
    fn interpolates_between_pixels() {
        let map = ramp();
        assert!((sample_bilinear(&map, 0.5, 0.0) - 0.5).abs() < 1e-6);
        assert!((sample_bilinear(&map, 1.0, 0.5) - 2.5).abs() < 1e-6);
    }

    #[test]
    fn outside_fades_to_zero() {
        let map = DensityMap::from_fn(2, 2, |_, _| 4.0);
        assert_eq!(sample_bilinear(&map, -1.0, 0.0), 0.0);
        assert_eq!(sample_bilinear(&map, 5.0, 0.0), 0.0);
        assert!((sample_bilinear(&map, -0.5, 0.0) - 2.0).abs() < 1e-6);
        assert!((sample_bilinear(&map, 1.5, 1.0) - 2.0).abs() < 1e-6);
    }
}
