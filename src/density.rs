//! Per-pixel crowd density maps.
//!
//! A `DensityMap` is what the estimator hands back for one frame of one camera.
//! Each cell holds a non-negative, confidence-weighted count contribution; the
//! sum over all cells approximates the number of people in view. Every stage
//! that is not explicitly a rescaling must keep that sum (approximately) intact.

use anyhow::{anyhow, Result};
use ndarray::Array2;

/// Single-channel density raster, indexed `[[row, col]]`.
#[derive(Clone, Debug, PartialEq)]
pub struct DensityMap {
    data: Array2<f32>,
}

impl DensityMap {
    /// Zero-filled map of `height` rows by `width` columns.
    pub fn zeros(height: usize, width: usize) -> Self {
        Self {
            data: Array2::zeros((height, width)),
        }
    }

    /// Build a map from row-major values.
    pub fn from_vec(height: usize, width: usize, values: Vec<f32>) -> Result<Self> {
        let data = Array2::from_shape_vec((height, width), values).map_err(|e| {
            anyhow!(
                "density values do not fit a {}x{} map: {}",
                width,
                height,
                e
            )
        })?;
        Ok(Self { data })
    }

    pub fn from_fn<F>(height: usize, width: usize, mut f: F) -> Self
    where
        F: FnMut(usize, usize) -> f32,
    {
        Self {
            data: Array2::from_shape_fn((height, width), |(row, col)| f(row, col)),
        }
    }

    pub fn from_array(data: Array2<f32>) -> Self {
        Self { data }
    }

    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Value at `(row, col)`, or `None` outside the map.
    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        self.data.get((row, col)).copied()
    }

    /// Total density mass. Accumulated in f64 so large maps keep precision.
    pub fn sum(&self) -> f64 {
        self.data.iter().map(|&v| v as f64).sum()
    }

    pub fn as_array(&self) -> &Array2<f32> {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_vec_rejects_wrong_length() {
        assert!(DensityMap::from_vec(2, 3, vec![0.0; 5]).is_err());
    }

    #[test]
    fn dimensions_and_indexing() -> Result<()> {
        let map = DensityMap::from_vec(2, 3, vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0])?;
        assert_eq!(map.height(), 2);
        assert_eq!(map.width(), 3);
        assert_eq!(map.get(1, 0), Some(3.0));
        assert_eq!(map.get(2, 0), None);
        assert_eq!(map.sum(), 15.0);
        Ok(())
    }
}
