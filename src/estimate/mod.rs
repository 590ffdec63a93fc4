//! Density estimation backends.
//!
//! The estimator is an external, opaque collaborator: a network that turns a
//! fixed-size RGB frame into a per-pixel crowd density map. This module only
//! defines the seam (`DensityEstimator`) and the backends that can sit behind
//! it:
//! - `stub`: luminance-proportional density (testing, dry runs)
//! - `tract`: ONNX model via tract (feature: backend-tract)

mod backend;
mod backends;
mod normalize;
mod registry;

pub use backend::{check_output, DensityEstimator};
pub use backends::StubEstimator;
#[cfg(feature = "backend-tract")]
pub use backends::TractEstimator;
pub use normalize::{normalize_imagenet, IMAGENET_MEAN, IMAGENET_STD};
pub use registry::EstimatorRegistry;
