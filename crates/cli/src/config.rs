//! TOML run configuration

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use chlorocast_algorithms::features::{DeriveParams, RatioDifference};
use chlorocast_algorithms::sampling::{ExtractParams, Grouping, NetworkSet};
use chlorocast_core::CRS;
use chlorocast_models::{DatasetName, PredictOptions};

/// One depth band: the model dataset and the model that predicts it
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Selection {
    /// e.g. `C2X-Complex_rhow_9x9_depth_in_0_1`
    pub dataset: String,
    /// e.g. `XGB`
    pub model: String,
}

impl Selection {
    fn new(dataset: &str, model: &str) -> Self {
        Self {
            dataset: dataset.to_string(),
            model: model.to_string(),
        }
    }
}

/// Settings for `run` and the defaults of `predict`
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    /// Directory holding the calibrated rasters; intermediate tables are
    /// written here as well
    pub raster_dir: PathBuf,
    pub models_dir: PathBuf,
    pub output_dir: PathBuf,
    /// GeoJSON polygon file delimiting the sampled area
    pub polygon: PathBuf,
    pub network: String,
    pub groupings: Vec<String>,
    pub clip_min: Option<f64>,
    pub strict: bool,
    /// EPSG code assumed for a polygon file without a CRS
    pub default_polygon_epsg: u32,
    /// `canonical` or `exhaustive`
    pub ratio_difference: String,
    /// Interpreter for pipeline and categorical-boosted artifacts
    pub python: String,
    pub selection: Vec<Selection>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            raster_dir: PathBuf::from("rasters"),
            models_dir: PathBuf::from("models"),
            output_dir: PathBuf::from("predictions"),
            polygon: PathBuf::from("polygon.geojson"),
            network: NetworkSet::C2xComplex.name().to_string(),
            groupings: vec!["5x5".into(), "9x9".into()],
            clip_min: Some(0.2),
            strict: true,
            default_polygon_epsg: 32630,
            ratio_difference: RatioDifference::Canonical.to_string(),
            python: "python3".into(),
            selection: vec![
                Selection::new("C2X-Complex_rhow_9x9_depth_in_0_1", "XGB"),
                Selection::new("C2X-Complex_rhow_9x9_depth_in_1_2", "CAT"),
                Selection::new("C2X-Complex_rhow_5x5_depth_in_2_3", "CAT"),
                Selection::new("C2X-Complex_rhow_5x5_depth_in_3_4", "RF"),
            ],
        }
    }
}

impl RunConfig {
    /// Read a configuration file; missing keys take their defaults
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check every string-valued setting parses
    pub fn validate(&self) -> Result<()> {
        self.network()?;
        self.groupings()?;
        self.ratio_difference()?;
        if self.selection.is_empty() {
            anyhow::bail!("selection is empty: nothing to predict");
        }
        for s in &self.selection {
            if DatasetName::parse(&s.dataset).is_none() {
                anyhow::bail!(
                    "dataset {} does not name a depth band (<table>_depth_in_<a>_<b>)",
                    s.dataset
                );
            }
        }
        Ok(())
    }

    pub fn network(&self) -> Result<NetworkSet> {
        Ok(self.network.parse()?)
    }

    /// Configured groupings, sorted and de-duplicated
    pub fn groupings(&self) -> Result<Vec<Grouping>> {
        if self.groupings.is_empty() {
            anyhow::bail!("groupings is empty");
        }
        let mut out = self
            .groupings
            .iter()
            .map(|g| g.parse::<Grouping>())
            .collect::<chlorocast_core::Result<Vec<_>>>()?;
        out.sort();
        out.dedup();
        Ok(out)
    }

    pub fn ratio_difference(&self) -> Result<RatioDifference> {
        Ok(self.ratio_difference.parse()?)
    }

    pub fn extract_params(&self, grouping: Grouping) -> Result<ExtractParams> {
        Ok(ExtractParams {
            network: self.network()?,
            grouping,
            default_polygon_crs: CRS::from_epsg(self.default_polygon_epsg),
        })
    }

    pub fn derive_params(&self) -> Result<DeriveParams> {
        Ok(DeriveParams {
            ratio_difference: self.ratio_difference()?,
        })
    }

    pub fn predict_options(&self) -> PredictOptions {
        PredictOptions {
            clip_min: self.clip_min,
            strict: self.strict,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_operational_run() {
        let config = RunConfig::from_toml_str("").unwrap();
        assert_eq!(config.network().unwrap(), NetworkSet::C2xComplex);
        assert_eq!(
            config.groupings().unwrap(),
            vec![Grouping::Window5, Grouping::Window9]
        );
        assert_eq!(config.clip_min, Some(0.2));
        assert!(config.strict);
        assert_eq!(config.selection.len(), 4);
        assert_eq!(config.selection[0].model, "XGB");
        assert_eq!(config.ratio_difference().unwrap(), RatioDifference::Canonical);
    }

    #[test]
    fn test_overrides_and_selection_table() {
        let text = r#"
            raster_dir = "/data/snap"
            groupings = ["9x9", "9x9", "3x3"]
            strict = false
            ratio_difference = "exhaustive"

            [[selection]]
            dataset = "TOA_9x9_depth_in_2_3"
            model = "KNN"
        "#;
        let config = RunConfig::from_toml_str(text).unwrap();
        assert_eq!(config.raster_dir, PathBuf::from("/data/snap"));
        assert_eq!(
            config.groupings().unwrap(),
            vec![Grouping::Window3, Grouping::Window9]
        );
        assert!(!config.predict_options().strict);
        assert_eq!(config.selection, vec![Selection::new("TOA_9x9_depth_in_2_3", "KNN")]);
        assert_eq!(
            config.derive_params().unwrap().ratio_difference,
            RatioDifference::Exhaustive
        );
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(RunConfig::from_toml_str(r#"network = "Polymer""#).is_err());
        assert!(RunConfig::from_toml_str(r#"groupings = ["4x4"]"#).is_err());
        assert!(RunConfig::from_toml_str("unknown_key = 1").is_err());
        assert!(RunConfig::from_toml_str("selection = []").is_err());
        assert!(
            RunConfig::from_toml_str(r#"selection = [{ dataset = "TOA_9x9", model = "KNN" }]"#)
                .is_err()
        );
    }

    #[test]
    fn test_extract_params_carry_default_crs() {
        let config = RunConfig {
            default_polygon_epsg: 25830,
            ..RunConfig::default()
        };
        let params = config.extract_params(Grouping::Window5).unwrap();
        assert_eq!(params.default_polygon_crs, CRS::from_epsg(25830));
        assert_eq!(params.grouping, Grouping::Window5);
    }
}
