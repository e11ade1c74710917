//! Runtime capability probing

use std::process::{Command, Stdio};
use tracing::{debug, info};

use crate::registry::ArtifactFormat;

/// Modules the bridge script imports for each external format
const PIPELINE_MODULES: &str = "joblib, numpy, pandas";
const CATEGORICAL_BOOSTED_MODULES: &str = "catboost, numpy, pandas";

/// Which artifact formats can be loaded in this environment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    python: String,
    pipeline: bool,
    categorical_boosted: bool,
}

impl Capabilities {
    /// Probe `python` for the packages the external runtime needs.
    ///
    /// The gradient-boosted evaluator is native and always enabled.
    pub fn probe(python: &str) -> Self {
        let pipeline = python_can_import(python, PIPELINE_MODULES);
        let categorical_boosted = python_can_import(python, CATEGORICAL_BOOSTED_MODULES);
        info!(
            "Model runtimes: json=native, joblib={}, cbm={}",
            enabled(pipeline),
            enabled(categorical_boosted)
        );
        Self {
            python: python.to_string(),
            pipeline,
            categorical_boosted,
        }
    }

    /// Only the native runtime
    pub fn native_only() -> Self {
        Self {
            python: "python3".to_string(),
            pipeline: false,
            categorical_boosted: false,
        }
    }

    pub fn supports(&self, format: ArtifactFormat) -> bool {
        match format {
            ArtifactFormat::GradientBoosted => true,
            ArtifactFormat::Pipeline => self.pipeline,
            ArtifactFormat::CategoricalBoosted => self.categorical_boosted,
        }
    }

    /// Interpreter used by the external runtime
    pub fn python(&self) -> &str {
        &self.python
    }
}

fn enabled(flag: bool) -> &'static str {
    if flag { "enabled" } else { "disabled" }
}

/// `modules` is a comma-separated import list
fn python_can_import(python: &str, modules: &str) -> bool {
    let status = Command::new(python)
        .arg("-c")
        .arg(format!("import {}", modules))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    match status {
        Ok(s) => {
            if !s.success() {
                debug!("{} cannot import {}", python, modules);
            }
            s.success()
        }
        Err(e) => {
            debug!("Cannot run {}: {}", python, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_native_only() {
        let caps = Capabilities::native_only();
        assert!(caps.supports(ArtifactFormat::GradientBoosted));
        assert!(!caps.supports(ArtifactFormat::Pipeline));
        assert!(!caps.supports(ArtifactFormat::CategoricalBoosted));
    }

    #[test]
    fn test_probe_missing_interpreter() {
        let caps = Capabilities::probe("/nonexistent/python-for-chlorocast");
        assert!(caps.supports(ArtifactFormat::GradientBoosted));
        assert!(!caps.supports(ArtifactFormat::Pipeline));
    }

    #[test]
    fn test_bridge_modules_include_frame_stack() {
        for modules in [PIPELINE_MODULES, CATEGORICAL_BOOSTED_MODULES] {
            let list: Vec<&str> = modules.split(", ").collect();
            assert!(list.contains(&"numpy"));
            assert!(list.contains(&"pandas"));
        }
    }
}
