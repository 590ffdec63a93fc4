use anyhow::Result;

use crate::density::DensityMap;
use crate::estimate::backend::DensityEstimator;
use crate::frame::Frame;

/// Default density per unit of normalised luminance.
const DEFAULT_GAIN: f32 = 0.01;

/// Stub backend for testing and dry runs.
///
/// Density is proportional to pixel luminance (Rec. 601 weights), so bright
/// regions of a synthetic frame read as crowds. Output matches the frame size.
pub struct StubEstimator {
    gain: f32,
}

impl StubEstimator {
    pub fn new() -> Self {
        Self { gain: DEFAULT_GAIN }
    }

    pub fn with_gain(gain: f32) -> Self {
        Self { gain }
    }
}

impl Default for StubEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl DensityEstimator for StubEstimator {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn estimate(&self, frame: &Frame) -> Result<DensityMap> {
        let pixels = frame.pixels();
        let width = frame.width as usize;
        let values = pixels
            .chunks_exact(3)
            .map(|rgb| {
                let luma = 0.299 * rgb[0] as f32 + 0.587 * rgb[1] as f32 + 0.114 * rgb[2] as f32;
                self.gain * luma / 255.0
            })
            .collect();
        DensityMap::from_vec(frame.height as usize, width, values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn white_pixels_get_full_gain() -> Result<()> {
        let frame = Frame::new(0, 0, 2, 1, vec![255, 255, 255, 0, 0, 0])?;
        let map = StubEstimator::with_gain(2.0).estimate(&frame)?;
        assert_eq!((map.height(), map.width()), (1, 2));
        assert!((map.get(0, 0).unwrap_or_default() - 2.0).abs() < 1e-4);
        assert_eq!(map.get(0, 1), Some(0.0));
        Ok(())
    }
}
