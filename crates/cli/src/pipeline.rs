//! The operational run: sample, derive, predict every depth band, write

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::config::{RunConfig, Selection};
use chlorocast_algorithms::features::{prepare_datasets, rhow_dataset_name, SampledTable};
use chlorocast_algorithms::sampling::{extract_pixels, Grouping, NetworkSet};
use chlorocast_core::io::{read_geojson, read_table_csv, write_table_csv};
use chlorocast_core::{FeatureCollection, FeatureTable};
use chlorocast_models::{Capabilities, DatasetName, Prediction, PredictionDispatcher};

/// Where the sampled table of one network set, grouping and date is kept
pub fn sampled_csv_path(dir: &Path, network: NetworkSet, grouping: Grouping, date: NaiveDate) -> PathBuf {
    dir.join(format!(
        "df_tifs_{}_{}_{}.csv",
        network,
        grouping,
        date.format("%Y-%m-%d")
    ))
}

/// Where the predictions for `date` are written
pub fn prediction_csv_path(dir: &Path, date: NaiveDate) -> PathBuf {
    dir.join(format!("{}_pred.csv", date.format("%Y-%m-%d")))
}

/// Output column for a depth label such as `0_1`
pub fn depth_column(depth: &str) -> String {
    format!("Chl_pred_{}", depth)
}

/// Sample every configured grouping for `date` and persist the tables.
///
/// Fails when no raster of the configured network set exists for `date`.
pub fn extract_date(
    config: &RunConfig,
    polygons: &FeatureCollection,
    date: NaiveDate,
) -> Result<Vec<PathBuf>> {
    let network = config.network()?;
    let mut written = Vec::new();

    for grouping in config.groupings()? {
        let params = config.extract_params(grouping)?;
        let table = extract_pixels(&config.raster_dir, &[date], polygons, &params)
            .with_context(|| format!("Failed to sample {} {} for {}", network, grouping, date))?;
        if table.is_empty() {
            anyhow::bail!(
                "No {} pixels for {} in {}",
                network,
                date,
                config.raster_dir.display()
            );
        }

        let path = sampled_csv_path(&config.raster_dir, network, grouping, date);
        write_table_csv(&table, &path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("{} {}: {} rows -> {}", network, grouping, table.len(), path.display());
        written.push(path);
    }
    Ok(written)
}

/// Read back the sampled tables written by [`extract_date`]
pub fn load_sampled(config: &RunConfig, date: NaiveDate) -> Result<Vec<SampledTable>> {
    let network = config.network()?;
    config
        .groupings()?
        .into_iter()
        .map(|grouping| {
            let path = sampled_csv_path(&config.raster_dir, network, grouping, date);
            let table = read_table_csv(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Ok(SampledTable {
                network,
                grouping,
                table,
            })
        })
        .collect()
}

/// Predict one selection against the prepared datasets
fn predict_selection(
    dispatcher: &PredictionDispatcher,
    datasets: &BTreeMap<String, FeatureTable>,
    selection: &Selection,
    config: &RunConfig,
) -> Result<Prediction> {
    let name = DatasetName::parse(&selection.dataset)
        .with_context(|| format!("Unparseable dataset name {}", selection.dataset))?;
    let table = datasets
        .get(name.table)
        .with_context(|| format!("No prepared table {} for {}", name.table, selection.dataset))?;
    let prediction = dispatcher.predict(
        table,
        &selection.dataset,
        &selection.model,
        &config.predict_options(),
    )?;
    Ok(prediction)
}

/// Join predictions onto the rows of `base` by `(date, latitude, longitude)`.
///
/// Each entry becomes one column; `None` or a pixel missing from the
/// prediction leaves empty cells.
pub fn assemble_output(
    base: &FeatureTable,
    predictions: &[(String, Option<Prediction>)],
) -> Result<FeatureTable> {
    let mut out = FeatureTable::new(base.keys().to_vec())?;
    let positions = base.key_positions();

    for (column, prediction) in predictions {
        let mut values = vec![f64::NAN; base.len()];
        if let Some(p) = prediction {
            for (key, v) in p.keys.iter().zip(&p.values) {
                if let Some(&row) = positions.get(&key.bits()) {
                    values[row] = *v;
                }
            }
        }
        out.push_float(column.clone(), values)?;
    }
    Ok(out)
}

/// Full run for one date; returns the path of the prediction table.
///
/// A failing (dataset, model) pair is logged and leaves its column empty.
pub fn run_date(config: &RunConfig, date: NaiveDate, capabilities: Capabilities) -> Result<PathBuf> {
    let polygons = read_geojson(&config.polygon)
        .with_context(|| format!("Failed to read polygon {}", config.polygon.display()))?;

    extract_date(config, &polygons, date)?;
    let sampled = load_sampled(config, date)?;
    let datasets = prepare_datasets(sampled, &config.derive_params()?)
        .context("Failed to derive features")?;

    let network = config.network()?;
    let widest = config
        .groupings()?
        .into_iter()
        .max()
        .unwrap_or_default();
    let base_name = rhow_dataset_name(network, widest);
    let base = datasets
        .get(&base_name)
        .with_context(|| format!("Missing base table {}", base_name))?;

    let dispatcher = PredictionDispatcher::open(&config.models_dir, capabilities)
        .with_context(|| format!("Failed to scan {}", config.models_dir.display()))?;

    let mut predictions = Vec::with_capacity(config.selection.len());
    for selection in &config.selection {
        let depth = DatasetName::parse(&selection.dataset)
            .map(|d| d.depth)
            .unwrap_or(selection.dataset.as_str());
        let prediction = match predict_selection(&dispatcher, &datasets, selection, config) {
            Ok(p) => {
                info!("{} {}: {} prediction(s)", selection.dataset, selection.model, p.len());
                Some(p)
            }
            Err(e) => {
                warn!("{} {} skipped: {:#}", selection.dataset, selection.model, e);
                None
            }
        };
        predictions.push((depth_column(depth), prediction));
    }

    let output = assemble_output(base, &predictions)?;
    std::fs::create_dir_all(&config.output_dir)
        .with_context(|| format!("Failed to create {}", config.output_dir.display()))?;
    let path = prediction_csv_path(&config.output_dir, date);
    write_table_csv(&output, &path).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}
