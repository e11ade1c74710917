//! Construction of runnable models from registry entries

use tracing::info;

use crate::error::{ModelError, Result};
use crate::registry::{ArtifactEntry, ArtifactFormat, ArtifactKey};
use crate::runtime::{Capabilities, GradientBoostedModel, PythonModel, Regressor};

/// Loads artifacts with the runtimes available in this environment
#[derive(Debug, Clone)]
pub struct ModelLoader {
    capabilities: Capabilities,
}

impl ModelLoader {
    pub fn new(capabilities: Capabilities) -> Self {
        Self { capabilities }
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Load the model of `entry` in its declared format.
    ///
    /// Fails with `ArtifactNotFound` when the entry has no model file for a
    /// known format, and with `RuntimeUnavailable` when the format's
    /// runtime is missing.
    pub fn load(&self, key: &ArtifactKey, entry: &ArtifactEntry) -> Result<Box<dyn Regressor>> {
        let not_found = |reason: &str| ModelError::ArtifactNotFound {
            dataset: key.dataset.clone(),
            model: key.model.clone(),
            reason: reason.to_string(),
        };

        let format = entry.format.ok_or_else(|| not_found("no model file"))?;
        let path = entry
            .path_for(format)
            .ok_or_else(|| not_found("no model file for the declared format"))?;

        if !self.capabilities.supports(format) {
            return Err(ModelError::RuntimeUnavailable(format.to_string()));
        }

        info!("Loading {} ({}) from {}", key, format, path.display());
        let model: Box<dyn Regressor> = match format {
            ArtifactFormat::GradientBoosted => Box::new(GradientBoostedModel::load(path)?),
            ArtifactFormat::Pipeline | ArtifactFormat::CategoricalBoosted => Box::new(
                PythonModel::load(self.capabilities.python(), format, path)?,
            ),
        };
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn key() -> ArtifactKey {
        ArtifactKey::new("ds", "M")
    }

    #[test]
    fn test_entry_without_model() {
        let entry = ArtifactEntry {
            features_path: Some(PathBuf::from("ds_M_features.json")),
            ..ArtifactEntry::default()
        };
        let loader = ModelLoader::new(Capabilities::native_only());
        assert!(matches!(
            loader.load(&key(), &entry),
            Err(ModelError::ArtifactNotFound { .. })
        ));
    }

    #[test]
    fn test_runtime_unavailable() {
        let entry = ArtifactEntry {
            categorical_boosted_path: Some(PathBuf::from("ds_M_model.cbm")),
            format: Some(ArtifactFormat::CategoricalBoosted),
            ..ArtifactEntry::default()
        };
        let loader = ModelLoader::new(Capabilities::native_only());
        assert!(matches!(
            loader.load(&key(), &entry),
            Err(ModelError::RuntimeUnavailable(f)) if f == "cbm"
        ));
    }
}
