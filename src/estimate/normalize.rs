use crate::frame::Frame;

/// Per-channel RGB mean of the ImageNet training set.
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
/// Per-channel RGB standard deviation of the ImageNet training set.
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Planar CHW floats, `(pixel / 255 - mean) / std` per channel.
pub fn normalize_imagenet(frame: &Frame) -> Vec<f32> {
    let plane = frame.width as usize * frame.height as usize;
    let mut out = vec![0.0f32; plane * 3];
    for (i, rgb) in frame.pixels().chunks_exact(3).enumerate() {
        for channel in 0..3 {
            let v = rgb[channel] as f32 / 255.0;
            out[channel * plane + i] = (v - IMAGENET_MEAN[channel]) / IMAGENET_STD[channel];
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;

    #[test]
    fn produces_planar_normalised_channels() -> Result<()> {
        let frame = Frame::new(0, 0, 2, 1, vec![255, 0, 0, 0, 255, 0])?;
        let chw = normalize_imagenet(&frame);
        assert_eq!(chw.len(), 6);
        assert!((chw[0] - (1.0 - 0.485) / 0.229).abs() < 1e-5);
        assert!((chw[1] - (0.0 - 0.485) / 0.229).abs() < 1e-5);
        assert!((chw[3] - (1.0 - 0.456) / 0.224).abs() < 1e-5);
        assert!((chw[4] - (0.0 - 0.406) / 0.225).abs() < 1e-5);
        Ok(())
    }
}
