//! Error types for model discovery, loading and prediction.

use thiserror::Error;

/// Errors produced while resolving, loading or running a model.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("no artifact for {dataset}/{model}: {reason}")]
    ArtifactNotFound {
        dataset: String,
        model: String,
        reason: String,
    },

    #[error("runtime for {0} artifacts is not available")]
    RuntimeUnavailable(String),

    #[error("missing feature columns: {}", preview(.missing))]
    MissingFeatureColumns { missing: Vec<String> },

    #[error("cannot determine the feature columns of {dataset}/{model}")]
    ManifestUnresolvable { dataset: String, model: String },

    #[error("invalid feature manifest {path}: {reason}")]
    InvalidManifest { path: String, reason: String },

    #[error("invalid model: {0}")]
    InvalidModel(String),

    #[error("model rejected labeled input: {0}")]
    InputRejected(String),

    #[error("external runtime failed: {0}")]
    Bridge(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("core error: {0}")]
    Core(#[from] chlorocast_core::Error),
}

/// First five names, with an ellipsis when there are more
fn preview(names: &[String]) -> String {
    let shown = names.iter().take(5).cloned().collect::<Vec<_>>().join(", ");
    if names.len() > 5 {
        format!("[{}, ...] ({} total)", shown, names.len())
    } else {
        format!("[{}]", shown)
    }
}

/// Result alias for model operations.
pub type Result<T> = std::result::Result<T, ModelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_columns_message() {
        let missing: Vec<String> = (0..7).map(|i| format!("c{}", i)).collect();
        let msg = ModelError::MissingFeatureColumns { missing }.to_string();
        assert_eq!(msg, "missing feature columns: [c0, c1, c2, c3, c4, ...] (7 total)");
    }
}
