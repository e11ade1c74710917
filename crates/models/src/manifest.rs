//! Feature manifests: the ordered columns a model expects

use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{ModelError, Result};
use crate::registry::{ArtifactEntry, ArtifactKey};
use crate::runtime::Regressor;

const LIST_KEYS: [&str; 3] = ["features", "feature_names", "columns"];

/// Where a manifest came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestSource {
    Sidecar(PathBuf),
    Model,
}

/// Ordered list of input columns for one artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureManifest {
    pub columns: Vec<String>,
    pub source: ManifestSource,
}

/// Parse a manifest document.
///
/// Accepts a list of names, or an object holding such a list under
/// `features`, `feature_names` or `columns`. Any other object yields its
/// own keys.
pub fn parse_manifest(value: &Value, origin: &str) -> Result<Vec<String>> {
    let invalid = |reason: &str| ModelError::InvalidManifest {
        path: origin.to_string(),
        reason: reason.to_string(),
    };

    let list = match value {
        Value::Array(items) => items,
        Value::Object(map) => {
            match LIST_KEYS.iter().find_map(|k| map.get(*k).and_then(Value::as_array)) {
                Some(items) => items,
                None => return Ok(map.keys().cloned().collect()),
            }
        }
        _ => return Err(invalid("expected a list or an object")),
    };

    list.iter()
        .map(|v| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| invalid("column names must be strings"))
        })
        .collect()
}

/// Read and parse a manifest file
pub fn read_manifest(path: &Path) -> Result<Vec<String>> {
    let text = std::fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&text)?;
    parse_manifest(&value, &path.display().to_string())
}

/// Columns required by a loaded model: the sidecar file when present,
/// otherwise the names recorded in the model itself.
pub fn resolve_manifest(
    key: &ArtifactKey,
    entry: &ArtifactEntry,
    model: &dyn Regressor,
) -> Result<FeatureManifest> {
    if let Some(path) = &entry.features_path {
        let columns = read_manifest(path)?;
        debug!("{}: {} column(s) from {}", key, columns.len(), path.display());
        return Ok(FeatureManifest {
            columns,
            source: ManifestSource::Sidecar(path.clone()),
        });
    }

    match model.feature_names() {
        Some(names) if !names.is_empty() => Ok(FeatureManifest {
            columns: names.to_vec(),
            source: ManifestSource::Model,
        }),
        _ => Err(ModelError::ManifestUnresolvable {
            dataset: key.dataset.clone(),
            model: key.model.clone(),
        }),
    }
}
