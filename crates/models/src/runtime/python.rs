//! External Python runtime for pipeline and categorical-boosted artifacts
//!
//! The model is loaded by a short script run as
//! `<python> -c <script> <format> <path> <mode>`. In `labeled` and `raw`
//! mode the feature matrix is streamed as CSV on stdin and one prediction
//! per line comes back on stdout. Exit status 3 means the model refused the
//! labeled table. In `names` mode the recorded feature names are printed,
//! or the script exits with status 4 when the model has none.

use ndarray::ArrayView2;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use tracing::debug;

use super::{FeatureFrame, Regressor};
use crate::error::{ModelError, Result};
use crate::registry::ArtifactFormat;

const BRIDGE_SCRIPT: &str = r#"
import sys
fmt, path, mode = sys.argv[1], sys.argv[2], sys.argv[3]
if fmt == "joblib":
    from joblib import load
    model = load(path)
elif fmt == "cbm":
    from catboost import CatBoostRegressor
    model = CatBoostRegressor(verbose=False)
    model.load_model(path)
else:
    sys.stderr.write("unsupported format " + fmt)
    sys.exit(2)
if mode == "names":
    names = getattr(model, "feature_names_in_", None)
    if names is None:
        names = getattr(model, "feature_names_", None)
    if names is None or len(names) == 0:
        sys.exit(4)
    for name in names:
        print(name)
    sys.exit(0)
import numpy as np
import pandas as pd
frame = pd.read_csv(sys.stdin.buffer, encoding="utf-8")
try:
    y = model.predict(frame if mode == "labeled" else frame.to_numpy())
except TypeError as e:
    if mode == "labeled":
        sys.stderr.write(str(e))
        sys.exit(3)
    raise
for v in np.asarray(y, dtype=float).ravel():
    print(repr(float(v)))
"#;

const EXIT_REJECTED: i32 = 3;
const EXIT_NO_NAMES: i32 = 4;

/// Model served by an external Python interpreter
#[derive(Debug, Clone)]
pub struct PythonModel {
    python: String,
    format: ArtifactFormat,
    path: PathBuf,
    feature_names: Option<Vec<String>>,
}

impl PythonModel {
    /// Check that the artifact loads and read its recorded feature names
    pub fn load(python: &str, format: ArtifactFormat, path: &Path) -> Result<Self> {
        let mut model = Self {
            python: python.to_string(),
            format,
            path: path.to_path_buf(),
            feature_names: None,
        };

        let output = model.run("names", None)?;
        model.feature_names = match output.status.code() {
            Some(0) => Some(
                String::from_utf8_lossy(&output.stdout)
                    .lines()
                    .map(str::to_string)
                    .collect(),
            ),
            Some(EXIT_NO_NAMES) => None,
            _ => return Err(bridge_failure(&output)),
        };

        debug!(
            "Loaded {} artifact {} ({} recorded feature name(s))",
            format,
            path.display(),
            model.feature_names.as_ref().map_or(0, Vec::len)
        );
        Ok(model)
    }

    fn run(&self, mode: &str, input: Option<Vec<u8>>) -> Result<Output> {
        let mut child = Command::new(&self.python)
            .arg("-c")
            .arg(BRIDGE_SCRIPT)
            .arg(self.format.tag())
            .arg(&self.path)
            .arg(mode)
            .stdin(if input.is_some() { Stdio::piped() } else { Stdio::null() })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| ModelError::Bridge(format!("cannot start {}: {}", self.python, e)))?;

        let write_error = match (input, child.stdin.take()) {
            (Some(bytes), Some(mut stdin)) => stdin.write_all(&bytes).err(),
            _ => None,
        };

        let output = child.wait_with_output()?;
        if let Some(e) = write_error
            && output.status.success()
        {
            return Err(ModelError::Bridge(format!("writing features failed: {}", e)));
        }
        Ok(output)
    }

    fn predict(&self, mode: &str, names: &[String], x: ArrayView2<'_, f64>) -> Result<Vec<f64>> {
        let output = self.run(mode, Some(to_csv(names, x)?))?;
        match output.status.code() {
            Some(0) => parse_predictions(&output.stdout),
            Some(EXIT_REJECTED) => Err(ModelError::InputRejected(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            )),
            _ => Err(bridge_failure(&output)),
        }
    }
}

impl Regressor for PythonModel {
    fn predict_frame(&self, frame: &FeatureFrame) -> Result<Vec<f64>> {
        self.predict("labeled", frame.names(), frame.values())
    }

    fn predict_matrix(&self, x: ArrayView2<'_, f64>) -> Result<Vec<f64>> {
        let names: Vec<String> = (0..x.ncols()).map(|i| format!("f{}", i)).collect();
        self.predict("raw", &names, x)
    }

    fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }
}

fn bridge_failure(output: &Output) -> ModelError {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let last = stderr.lines().last().unwrap_or("").trim();
    ModelError::Bridge(format!("exit status {}: {}", output.status, last))
}

/// CSV with a header row; `NaN` becomes an empty cell
fn to_csv(names: &[String], x: ArrayView2<'_, f64>) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(names)?;
    for row in x.rows() {
        writer.write_record(
            row.iter()
                .map(|v| if v.is_nan() { String::new() } else { v.to_string() }),
        )?;
    }
    writer
        .into_inner()
        .map_err(|e| ModelError::Bridge(e.to_string()))
}

fn parse_predictions(stdout: &[u8]) -> Result<Vec<f64>> {
    String::from_utf8_lossy(stdout)
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(|l| {
            l.parse::<f64>()
                .map_err(|_| ModelError::Bridge(format!("unreadable prediction '{}'", l)))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_to_csv() {
        let x = array![[0.5, f64::NAN], [1.0, 2.0]];
        let bytes = to_csv(&["a".to_string(), "Otoño".to_string()], x.view()).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), "a,Otoño\n0.5,\n1,2\n");
    }

    #[test]
    fn test_parse_predictions() {
        let y = parse_predictions(b"0.25\n1.5\nnan\n\n").unwrap();
        assert_eq!(y[..2], [0.25, 1.5]);
        assert!(y[2].is_nan());
        assert!(parse_predictions(b"oops\n").is_err());
    }

    #[test]
    fn test_missing_interpreter() {
        let err = PythonModel::load(
            "/nonexistent/python-for-chlorocast",
            ArtifactFormat::Pipeline,
            Path::new("m_model.joblib"),
        )
        .unwrap_err();
        assert!(matches!(err, ModelError::Bridge(_)));
    }
}
