//! Prediction through a models directory on disk

use approx::assert_relative_eq;
use chlorocast_core::{FeatureTable, RowKey};
use chlorocast_models::{
    predict, ArtifactFormat, Capabilities, ModelError, PredictOptions, PredictionDispatcher,
};
use chrono::NaiveDate;
use std::fs;
use std::path::Path;

const DATASET: &str = "C2X-Complex_rhow_9x9_depth_in_0_1";

/// Two stumps: B2 < 0.05 -> -0.4 else 0.3 (missing goes left);
/// B3 < 0.1 -> 0.1 else 0.2. Base score 0.5.
const XGB_MODEL: &str = r#"{
    "learner": {
        "feature_names": ["rhow_B2", "rhow_B3"],
        "learner_model_param": {"base_score": "5E-1"},
        "gradient_booster": {
            "name": "gbtree",
            "model": {"trees": [
                {"left_children": [1, -1, -1], "right_children": [2, -1, -1],
                 "split_indices": [0, 0, 0], "split_conditions": [0.05, -0.4, 0.3],
                 "default_left": [1, 0, 0]},
                {"left_children": [1, -1, -1], "right_children": [2, -1, -1],
                 "split_indices": [1, 0, 0], "split_conditions": [0.1, 0.1, 0.2],
                 "default_left": [0, 0, 0]}
            ]}
        }
    }
}"#;

fn models_dir(dir: &Path, manifest: Option<&str>) {
    fs::write(dir.join(format!("{}_XGB_model.json", DATASET)), XGB_MODEL).unwrap();
    if let Some(m) = manifest {
        fs::write(dir.join(format!("{}_XGB_features.json", DATASET)), m).unwrap();
    }
    fs::write(
        dir.join(format!("{}_XGB_metadata.json", DATASET)),
        r#"{"trained": "2024-11-02", "r2": 0.71}"#,
    )
    .unwrap();
}

fn table(with_b3: bool) -> FeatureTable {
    let date = NaiveDate::from_ymd_opt(2023, 7, 14).unwrap();
    let keys = (0..3)
        .map(|i| RowKey::new(date, 4_169_970.0 - 20.0 * i as f64, 690_030.0))
        .collect();
    let mut t = FeatureTable::new(keys).unwrap();
    t.push_float("rhow_B2", vec![0.02, 0.08, 0.03]).unwrap();
    if with_b3 {
        t.push_float("rhow_B3", vec![0.05, 0.2, 0.3]).unwrap();
    }
    t.push_float("Verano", vec![1.0; 3]).unwrap();
    t
}

fn options(clip_min: Option<f64>, strict: bool) -> PredictOptions {
    PredictOptions { clip_min, strict }
}

#[test]
fn predicts_with_sidecar_manifest() {
    let dir = tempfile::tempdir().unwrap();
    models_dir(dir.path(), Some(r#"["rhow_B2", "rhow_B3"]"#));

    let p = predict(
        &table(true),
        dir.path(),
        DATASET,
        "XGB",
        &options(None, true),
        Capabilities::native_only(),
    )
    .unwrap();

    assert_eq!(p.name, format!("{}__XGB", DATASET));
    assert_eq!(p.len(), 3);
    assert_relative_eq!(p.values[0], 0.2, epsilon = 1e-6);
    assert_relative_eq!(p.values[1], 1.0, epsilon = 1e-6);
    assert_relative_eq!(p.values[2], 0.3, epsilon = 1e-6);
    assert_eq!(p.keys, table(true).keys());
}

#[test]
fn falls_back_to_recorded_feature_names() {
    let dir = tempfile::tempdir().unwrap();
    models_dir(dir.path(), None);

    let p = predict(
        &table(true),
        dir.path(),
        DATASET,
        "XGB",
        &options(None, true),
        Capabilities::native_only(),
    )
    .unwrap();
    assert_relative_eq!(p.values[1], 1.0, epsilon = 1e-6);
}

#[test]
fn reordered_manifest_retries_with_raw_matrix() {
    let dir = tempfile::tempdir().unwrap();
    // labeled input does not match the recorded names, so the matrix is
    // used by position: column 0 is B3, column 1 is B2
    models_dir(dir.path(), Some(r#"{"features": ["rhow_B3", "rhow_B2"]}"#));

    let p = predict(
        &table(true),
        dir.path(),
        DATASET,
        "XGB",
        &options(None, true),
        Capabilities::native_only(),
    )
    .unwrap();
    // row 0: x0 = 0.05 -> 0.3, x1 = 0.02 -> 0.1
    assert_relative_eq!(p.values[0], 0.9, epsilon = 1e-6);
}

#[test]
fn clip_min_floors_predictions() {
    let dir = tempfile::tempdir().unwrap();
    models_dir(dir.path(), Some(r#"["rhow_B2", "rhow_B3"]"#));

    let p = predict(
        &table(true),
        dir.path(),
        DATASET,
        "XGB",
        &options(Some(0.5), true),
        Capabilities::native_only(),
    )
    .unwrap();
    assert!(p.values.iter().all(|v| *v >= 0.5));
    assert_eq!(p.values[0], 0.5);
    assert_relative_eq!(p.values[1], 1.0, epsilon = 1e-6);
}

#[test]
fn strict_mode_reports_missing_columns() {
    let dir = tempfile::tempdir().unwrap();
    models_dir(dir.path(), Some(r#"["rhow_B2", "rhow_B3"]"#));

    let err = predict(
        &table(false),
        dir.path(),
        DATASET,
        "XGB",
        &options(Some(0.2), true),
        Capabilities::native_only(),
    )
    .unwrap_err();
    assert!(matches!(err, ModelError::MissingFeatureColumns { .. }));
}

#[test]
fn lenient_mode_predicts_with_missing_columns() {
    let dir = tempfile::tempdir().unwrap();
    models_dir(dir.path(), Some(r#"["rhow_B2", "rhow_B3"]"#));

    let p = predict(
        &table(false),
        dir.path(),
        DATASET,
        "XGB",
        &options(Some(0.2), false),
        Capabilities::native_only(),
    )
    .unwrap();
    // B3 missing: second stump goes right (default_left = 0) -> 0.2
    assert_relative_eq!(p.values[0], 0.3, epsilon = 1e-6);
    assert!(p.values.iter().all(|v| *v >= 0.2));
}

#[test]
fn unknown_artifact_and_unavailable_runtime() {
    let dir = tempfile::tempdir().unwrap();
    models_dir(dir.path(), None);
    fs::write(dir.path().join("TOA_9x9_depth_in_2_3_CAT_model.cbm"), b"\0").unwrap();

    let dispatcher = PredictionDispatcher::open(dir.path(), Capabilities::native_only()).unwrap();
    assert_eq!(dispatcher.registry().len(), 2);

    let missing = dispatcher.predict(&table(true), DATASET, "RF", &PredictOptions::default());
    assert!(matches!(missing, Err(ModelError::ArtifactNotFound { .. })));

    let cat = dispatcher.predict(
        &table(true),
        "TOA_9x9_depth_in_2_3",
        "CAT",
        &PredictOptions::default(),
    );
    assert!(matches!(cat, Err(ModelError::RuntimeUnavailable(_))));

    let entry = dispatcher.registry().get(DATASET, "XGB").unwrap();
    let metadata = entry.metadata().unwrap().unwrap();
    assert_eq!(metadata["r2"], 0.71);
}

/// Stand-in interpreter: only the joblib import list succeeds, `names` prints
/// the recorded names, `labeled` input is refused with status 3 and `raw`
/// input gets one value per row. Each bridge call is appended to `@LOG@`.
#[cfg(unix)]
const FAKE_PYTHON: &str = r#"#!/bin/sh
case "$2" in
  "import joblib, numpy, pandas") exit 0 ;;
  import*) exit 1 ;;
esac
echo "$5 $3" >> "@LOG@"
case "$5" in
  names) printf 'rhow_B2\nrhow_B3\n' ;;
  labeled) cat > /dev/null; echo "feature names mismatch" >&2; exit 3 ;;
  raw) head -n 1 >> "@LOG@"; cat > /dev/null; printf '0.1\n0.5\n0.35\n' ;;
  *) exit 2 ;;
esac
"#;

#[cfg(unix)]
#[test]
fn external_runtime_retries_rejected_labeled_input() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("calls.log");
    let python = dir.path().join("python");
    fs::write(&python, FAKE_PYTHON.replace("@LOG@", &log.display().to_string())).unwrap();
    fs::set_permissions(&python, fs::Permissions::from_mode(0o755)).unwrap();

    let models = dir.path().join("models");
    fs::create_dir(&models).unwrap();
    fs::write(models.join(format!("{}_RF_model.joblib", DATASET)), b"\0").unwrap();

    let caps = Capabilities::probe(python.to_str().unwrap());
    assert!(caps.supports(ArtifactFormat::Pipeline));
    assert!(!caps.supports(ArtifactFormat::CategoricalBoosted));

    let p = predict(&table(true), &models, DATASET, "RF", &options(Some(0.2), true), caps).unwrap();
    assert_eq!(p.values, vec![0.2, 0.5, 0.35]);

    // names from the model, labeled refused, raw matrix with positional header
    let calls = fs::read_to_string(&log).unwrap();
    assert_eq!(calls, "names joblib\nlabeled joblib\nraw joblib\nf0,f1\n");
}
