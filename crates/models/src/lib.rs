//! # Chlorocast Models
//!
//! Discovery, loading and invocation of trained regression artifacts.
//!
//! - `registry`: index of a models directory by (dataset, model)
//! - `runtime`: the `Regressor` trait and one runtime per artifact format
//! - `loader`: builds a runnable model from a registry entry
//! - `manifest`: the ordered feature columns an artifact expects
//! - `dispatch`: column alignment, inference and post-processing

pub mod dispatch;
pub mod error;
pub mod loader;
pub mod manifest;
pub mod registry;
pub mod runtime;

pub use dispatch::{align_features, predict, PredictOptions, Prediction, PredictionDispatcher};
pub use error::{ModelError, Result};
pub use loader::ModelLoader;
pub use manifest::{FeatureManifest, ManifestSource};
pub use registry::{ArtifactEntry, ArtifactFormat, ArtifactKey, DatasetName, ModelRegistry};
pub use runtime::{Capabilities, FeatureFrame, Regressor};
