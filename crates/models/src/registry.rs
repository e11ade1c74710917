//! Discovery of model artifacts in a models directory
//!
//! Artifacts follow the naming convention
//! `<dataset>_<model>_model.{joblib,json,cbm}`, `<dataset>_<model>_features.json`
//! and `<dataset>_<model>_metadata.json`. The model name is the last
//! `_`-separated segment of the stem, the dataset name is everything before.

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{ModelError, Result};

/// Serialization format of a model artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactFormat {
    /// Pickled estimator or pipeline (`_model.joblib`)
    Pipeline,
    /// Gradient-boosted trees exported as JSON (`_model.json`)
    GradientBoosted,
    /// Categorical-boosted binary export (`_model.cbm`)
    CategoricalBoosted,
}

impl ArtifactFormat {
    /// Short tag used in logs and by the external runtime
    pub fn tag(&self) -> &'static str {
        match self {
            ArtifactFormat::Pipeline => "joblib",
            ArtifactFormat::GradientBoosted => "json",
            ArtifactFormat::CategoricalBoosted => "cbm",
        }
    }
}

impl fmt::Display for ArtifactFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArtifactKind {
    Model(ArtifactFormat),
    Features,
    Metadata,
}

const SUFFIXES: [(&str, ArtifactKind); 5] = [
    ("_model.joblib", ArtifactKind::Model(ArtifactFormat::Pipeline)),
    ("_model.json", ArtifactKind::Model(ArtifactFormat::GradientBoosted)),
    ("_model.cbm", ArtifactKind::Model(ArtifactFormat::CategoricalBoosted)),
    ("_features.json", ArtifactKind::Features),
    ("_metadata.json", ArtifactKind::Metadata),
];

/// Identity of an artifact
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArtifactKey {
    pub dataset: String,
    pub model: String,
}

impl ArtifactKey {
    pub fn new(dataset: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            dataset: dataset.into(),
            model: model.into(),
        }
    }

    /// Parse a file name; `None` when it carries no known suffix
    pub fn from_file_name(name: &str) -> Option<Self> {
        let (_, stem) = classify(name)?;
        Some(split_stem(stem))
    }
}

impl fmt::Display for ArtifactKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.dataset, self.model)
    }
}

fn classify(name: &str) -> Option<(ArtifactKind, &str)> {
    SUFFIXES
        .iter()
        .find_map(|(suffix, kind)| name.strip_suffix(suffix).map(|stem| (*kind, stem)))
}

/// Split a stem on its last `_`: dataset before, model after
fn split_stem(stem: &str) -> ArtifactKey {
    match stem.rsplit_once('_') {
        Some((dataset, model)) => ArtifactKey::new(dataset, model),
        None => ArtifactKey::new(stem, stem),
    }
}

/// Files known for one (dataset, model) pair
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArtifactEntry {
    pub pipeline_path: Option<PathBuf>,
    pub gradient_boosted_path: Option<PathBuf>,
    pub categorical_boosted_path: Option<PathBuf>,
    pub features_path: Option<PathBuf>,
    pub metadata_path: Option<PathBuf>,
    /// Format used to load the model
    pub format: Option<ArtifactFormat>,
}

impl ArtifactEntry {
    fn register(&mut self, kind: ArtifactKind, path: PathBuf) {
        match kind {
            ArtifactKind::Model(format) => {
                match format {
                    ArtifactFormat::Pipeline => self.pipeline_path = Some(path),
                    ArtifactFormat::GradientBoosted => self.gradient_boosted_path = Some(path),
                    ArtifactFormat::CategoricalBoosted => {
                        self.categorical_boosted_path = Some(path)
                    }
                }
                // a pipeline export always wins, other formats only fill a gap
                if format == ArtifactFormat::Pipeline || self.format.is_none() {
                    self.format = Some(format);
                }
            }
            ArtifactKind::Features => self.features_path = Some(path),
            ArtifactKind::Metadata => self.metadata_path = Some(path),
        }
    }

    /// Model file for `format`, if present
    pub fn path_for(&self, format: ArtifactFormat) -> Option<&Path> {
        match format {
            ArtifactFormat::Pipeline => self.pipeline_path.as_deref(),
            ArtifactFormat::GradientBoosted => self.gradient_boosted_path.as_deref(),
            ArtifactFormat::CategoricalBoosted => self.categorical_boosted_path.as_deref(),
        }
    }

    /// Parsed metadata sidecar, if present
    pub fn metadata(&self) -> Result<Option<Value>> {
        let Some(path) = &self.metadata_path else {
            return Ok(None);
        };
        let text = std::fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&text)?))
    }
}

/// Index of the artifacts in a models directory
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    dir: PathBuf,
    entries: BTreeMap<ArtifactKey, ArtifactEntry>,
}

impl ModelRegistry {
    /// Scan `dir`. Files are visited in name order, so the result does not
    /// depend on directory listing order.
    pub fn scan<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let mut files: Vec<(String, PathBuf)> = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                files.push((name.to_string(), path.clone()));
            }
        }
        files.sort();

        let mut entries: BTreeMap<ArtifactKey, ArtifactEntry> = BTreeMap::new();
        for (name, path) in files {
            let Some((kind, stem)) = classify(&name) else {
                continue;
            };
            entries.entry(split_stem(stem)).or_default().register(kind, path);
        }

        debug!("{} artifact(s) in {}", entries.len(), dir.display());
        Ok(Self { dir, entries })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn get(&self, dataset: &str, model: &str) -> Option<&ArtifactEntry> {
        self.entries.get(&ArtifactKey::new(dataset, model))
    }

    /// Like [`get`](Self::get), failing with `ArtifactNotFound`
    pub fn lookup(&self, dataset: &str, model: &str) -> Result<&ArtifactEntry> {
        self.get(dataset, model)
            .ok_or_else(|| ModelError::ArtifactNotFound {
                dataset: dataset.to_string(),
                model: model.to_string(),
                reason: format!("not found in {}", self.dir.display()),
            })
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ArtifactKey, &ArtifactEntry)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A model dataset name split into the table it reads and the depth band
/// it predicts, e.g. `C2X-Complex_rhow_9x9_depth_in_0_1`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetName<'a> {
    pub table: &'a str,
    pub depth: &'a str,
}

impl<'a> DatasetName<'a> {
    pub fn parse(name: &'a str) -> Option<Self> {
        let (table, depth) = name.split_once("_depth_in_")?;
        (!table.is_empty() && !depth.is_empty()).then_some(Self { table, depth })
    }
}
