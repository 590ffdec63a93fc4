use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{anyhow, Result};

use super::backend::DensityEstimator;

/// Registry of loaded estimator backends, keyed by backend name.
///
/// Handles are shared read-only: every camera pipeline gets a clone of the
/// same `Arc`.
pub struct EstimatorRegistry {
    backends: HashMap<String, Arc<dyn DensityEstimator>>,
}

impl EstimatorRegistry {
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
        }
    }

    /// Register a backend under its `name()`, replacing any previous one.
    pub fn register<E: DensityEstimator + 'static>(&mut self, backend: E) {
        self.backends
            .insert(backend.name().to_string(), Arc::new(backend));
    }

    /// Get backend by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn DensityEstimator>> {
        self.backends.get(name).cloned()
    }

    /// Backend by name, or an error listing what is registered.
    pub fn require(&self, name: &str) -> Result<Arc<dyn DensityEstimator>> {
        self.get(name).ok_or_else(|| {
            let mut known = self.list();
            known.sort();
            anyhow!(
                "estimator '{}' not registered (available: {})",
                name,
                known.join(", ")
            )
        })
    }

    /// List registered backends.
    pub fn list(&self) -> Vec<String> {
        self.backends.keys().cloned().collect()
    }
}

impl Default for EstimatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::estimate::StubEstimator;

    #[test]
    fn backends_are_shared_by_name() -> Result<()> {
        let mut registry = EstimatorRegistry::new();
        assert!(registry.get("stub").is_none());
        registry.register(StubEstimator::new());
        let first = registry.require("stub")?;
        let second = registry.require("stub")?;
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(registry.list(), vec!["stub".to_string()]);
        Ok(())
    }

    #[test]
    fn require_names_available_backends() {
        let mut registry = EstimatorRegistry::new();
        registry.register(StubEstimator::new());
        let err = match registry.require("sasnet") {
            Ok(_) => panic!("sasnet is not registered"),
            Err(err) => err,
        };
        assert!(err.to_string().contains("available: stub"));
    }
}
