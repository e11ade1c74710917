//! Prediction dispatch: artifact resolution, column alignment, inference

use ndarray::Array2;
use std::path::Path;
use tracing::{debug, info, warn};

use crate::error::{ModelError, Result};
use crate::loader::ModelLoader;
use crate::manifest::resolve_manifest;
use crate::registry::{ArtifactKey, ModelRegistry};
use crate::runtime::{Capabilities, FeatureFrame, Regressor};
use chlorocast_core::{Column, FeatureTable, RowKey};

/// Options for one prediction
#[derive(Debug, Clone, Copy)]
pub struct PredictOptions {
    /// Floor applied to every prediction
    pub clip_min: Option<f64>,
    /// Fail on missing feature columns instead of filling them with `NaN`
    pub strict: bool,
}

impl Default for PredictOptions {
    fn default() -> Self {
        Self {
            clip_min: None,
            strict: true,
        }
    }
}

/// Predictions for the rows of one input table
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    /// `{dataset}__{model}`
    pub name: String,
    /// Row keys of the input table, in input order
    pub keys: Vec<RowKey>,
    pub values: Vec<f64>,
}

impl Prediction {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Select `columns` from `table` in order as a numeric frame.
///
/// Text columns are converted to numbers where they parse. Missing columns
/// fail under `strict`; otherwise they are reported and filled with `NaN`.
pub fn align_features(table: &FeatureTable, columns: &[String], strict: bool) -> Result<FeatureFrame> {
    let missing: Vec<String> = columns
        .iter()
        .filter(|c| !table.has_column(c))
        .cloned()
        .collect();

    if !missing.is_empty() {
        let err = ModelError::MissingFeatureColumns { missing };
        if strict {
            return Err(err);
        }
        warn!("{}; filling with missing values", err);
    }

    let mut values = Array2::from_elem((table.len(), columns.len()), f64::NAN);
    for (j, name) in columns.iter().enumerate() {
        let Some(column) = table.column(name) else {
            continue;
        };
        let data = match column {
            Column::Float(v) => v.clone(),
            Column::Text(_) => {
                debug!("Converting text column {} to numbers", name);
                column.to_float_lossy()
            }
        };
        for (cell, v) in values.column_mut(j).iter_mut().zip(data) {
            *cell = v;
        }
    }

    FeatureFrame::new(columns.to_vec(), values)
}

/// Resolves artifacts from one registry scan and runs predictions
pub struct PredictionDispatcher {
    registry: ModelRegistry,
    loader: ModelLoader,
}

impl PredictionDispatcher {
    pub fn new(registry: ModelRegistry, loader: ModelLoader) -> Self {
        Self { registry, loader }
    }

    /// Scan `models_dir` and serve predictions with `capabilities`
    pub fn open<P: AsRef<Path>>(models_dir: P, capabilities: Capabilities) -> Result<Self> {
        Ok(Self::new(
            ModelRegistry::scan(models_dir)?,
            ModelLoader::new(capabilities),
        ))
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Predict one value per row of `table` with the artifact
    /// `(dataset, model)`.
    pub fn predict(
        &self,
        table: &FeatureTable,
        dataset: &str,
        model: &str,
        options: &PredictOptions,
    ) -> Result<Prediction> {
        let key = ArtifactKey::new(dataset, model);
        let entry = self.registry.lookup(dataset, model)?;
        let regressor = self.loader.load(&key, entry)?;
        let manifest = resolve_manifest(&key, entry, regressor.as_ref())?;

        info!("Inference with {} for {} ({} rows)", model, dataset, table.len());
        let frame = align_features(table, &manifest.columns, options.strict)?;
        let mut values = run_model(regressor.as_ref(), &frame)?;

        if values.len() != table.len() {
            return Err(ModelError::InvalidModel(format!(
                "{} returned {} predictions for {} rows",
                key,
                values.len(),
                table.len()
            )));
        }

        if let Some(floor) = options.clip_min {
            for v in values.iter_mut() {
                // NaN stays NaN
                if *v < floor {
                    *v = floor;
                }
            }
        }

        Ok(Prediction {
            name: format!("{}__{}", dataset, model),
            keys: table.keys().to_vec(),
            values,
        })
    }
}

/// Labeled input first, raw matrix when the model refuses it
fn run_model(model: &dyn Regressor, frame: &FeatureFrame) -> Result<Vec<f64>> {
    match model.predict_frame(frame) {
        Err(ModelError::InputRejected(reason)) => {
            debug!("Labeled input rejected ({}), retrying with raw matrix", reason);
            model.predict_matrix(frame.values())
        }
        other => other,
    }
}

/// Scan `models_dir` and predict with `(dataset, model)` in one call
pub fn predict<P: AsRef<Path>>(
    table: &FeatureTable,
    models_dir: P,
    dataset: &str,
    model: &str,
    options: &PredictOptions,
    capabilities: Capabilities,
) -> Result<Prediction> {
    PredictionDispatcher::open(models_dir, capabilities)?.predict(table, dataset, model, options)
}
