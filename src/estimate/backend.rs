use anyhow::{anyhow, Result};

use crate::density::DensityMap;
use crate::frame::Frame;

/// Density estimator backend.
///
/// One estimator is loaded at startup and shared read-only by every camera
/// pipeline (`Arc<dyn DensityEstimator>`), so `estimate` takes `&self` and
/// implementations must be `Send + Sync`.
///
/// A backend maps a fixed-size RGB frame to a single-channel density map of
/// the same size or a fixed smaller ratio. Failures are returned as errors,
/// never as an empty map.
pub trait DensityEstimator: Send + Sync {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Estimate the density map for one frame.
    fn estimate(&self, frame: &Frame) -> Result<DensityMap>;

    /// Optional warm-up hook.
    fn warm_up(&self) -> Result<()> {
        Ok(())
    }
}

/// Reject estimator output the geometric stages cannot use.
pub fn check_output(backend: &str, map: DensityMap) -> Result<DensityMap> {
    if map.is_empty() {
        return Err(anyhow!("estimator '{}' returned an empty density map", backend));
    }
    if map.as_array().iter().any(|v| !v.is_finite()) {
        return Err(anyhow!(
            "estimator '{}' returned non-finite density values",
            backend
        ));
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_and_non_finite_outputs_are_errors() -> Result<()> {
        assert!(check_output("test", DensityMap::zeros(0, 4)).is_err());
        let nan = DensityMap::from_vec(1, 2, vec![0.5, f32::NAN])?;
        assert!(check_output("test", nan).is_err());
        let ok = DensityMap::from_vec(1, 2, vec![0.5, 0.25])?;
        assert_eq!(check_output("test", ok)?.sum(), 0.75);
        Ok(())
    }
}
