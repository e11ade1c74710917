//! Chlorocast CLI - chlorophyll prediction from multispectral rasters

mod config;
mod pipeline;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use chlorocast_algorithms::features::{prepare_datasets, SampledTable};
use chlorocast_algorithms::sampling::{extract_pixels, Grouping, NetworkSet};
use chlorocast_core::io::{read_geojson, read_multiband, read_table_csv, write_table_csv};
use chlorocast_core::FeatureTable;
use chlorocast_models::{
    Capabilities, ManifestSource, ModelLoader, ModelRegistry, PredictionDispatcher,
};
use config::RunConfig;

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "chlorocast")]
#[command(author, version, about = "Chlorophyll prediction from multispectral rasters", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show information about a multiband raster
    Info {
        /// Input raster file
        input: PathBuf,
    },
    /// Sample raster pixels inside a polygon into a CSV table
    Extract {
        /// Directory holding the rasters
        #[arg(short, long)]
        raster_dir: PathBuf,
        /// GeoJSON polygon file
        #[arg(short, long)]
        polygon: PathBuf,
        /// Acquisition date (YYYY-MM-DD), repeatable
        #[arg(short, long = "date", required = true)]
        dates: Vec<NaiveDate>,
        /// Network set: C2X-Complex, C2X, C2RCC
        #[arg(short, long, default_value = "C2X-Complex")]
        network: NetworkSet,
        /// Median window: none, 3x3, 5x5, 9x9, 15x15
        #[arg(short, long, default_value = "none")]
        grouping: Grouping,
        /// EPSG code for a polygon file without a CRS
        #[arg(long, default_value = "32630")]
        default_epsg: u32,
        /// Output CSV file
        output: PathBuf,
    },
    /// Derive band-index features from sampled CSV tables
    Derive {
        /// Sampled tables as GROUPING=FILE, e.g. 9x9=df_tifs_9x9.csv
        #[arg(short, long = "input", required = true, value_parser = parse_grouped_input)]
        inputs: Vec<(Grouping, PathBuf)>,
        /// Network set the tables were sampled from
        #[arg(short, long, default_value = "C2X-Complex")]
        network: NetworkSet,
        /// Ratio-difference columns: canonical or exhaustive
        #[arg(short, long, default_value = "canonical")]
        ratio_difference: String,
        /// Directory receiving one CSV per dataset
        output_dir: PathBuf,
    },
    /// Predict with one model artifact over a feature table
    Predict {
        /// Feature table CSV
        input: PathBuf,
        /// Models directory
        #[arg(short, long)]
        models: PathBuf,
        /// Model dataset name, e.g. C2X-Complex_rhow_9x9_depth_in_0_1
        #[arg(short, long)]
        dataset: String,
        /// Model name, e.g. XGB
        #[arg(short = 'n', long)]
        model: String,
        /// Floor applied to predictions
        #[arg(short, long)]
        clip_min: Option<f64>,
        /// Fill missing feature columns instead of failing
        #[arg(long)]
        lenient: bool,
        /// Python interpreter for joblib and cbm artifacts
        #[arg(long, default_value = "python3")]
        python: String,
        /// Output CSV file
        output: PathBuf,
    },
    /// Full run: sample, derive and predict every configured depth band
    Run {
        /// TOML run configuration
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Acquisition date (YYYY-MM-DD), repeatable
        #[arg(short, long = "date", required = true)]
        dates: Vec<NaiveDate>,
    },
    /// List the artifacts of a models directory
    Models {
        /// Models directory
        dir: PathBuf,
        /// Python interpreter to probe for joblib and cbm support
        #[arg(long, default_value = "python3")]
        python: String,
        /// Load each model to report its feature manifest
        #[arg(long)]
        check: bool,
    },
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    if tracing::subscriber::set_global_default(subscriber).is_err() {
        eprintln!("Logging already initialised");
    }
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn read_table(path: &Path) -> Result<FeatureTable> {
    let pb = spinner("Reading table...");
    let table = read_table_csv(path)
        .with_context(|| format!("Failed to read table {}", path.display()))?;
    pb.finish_and_clear();
    info!("Input: {} rows x {} columns", table.len(), table.width());
    Ok(table)
}

fn write_table(table: &FeatureTable, path: &Path) -> Result<()> {
    let pb = spinner("Writing output...");
    write_table_csv(table, path).with_context(|| format!("Failed to write {}", path.display()))?;
    pb.finish_and_clear();
    Ok(())
}

fn done(name: &str, path: &Path, elapsed: std::time::Duration) {
    println!("{} saved to: {}", name, path.display());
    println!("  Processing time: {:.2?}", elapsed);
}

fn parse_grouped_input(s: &str) -> std::result::Result<(Grouping, PathBuf), String> {
    let (grouping, path) = s
        .split_once('=')
        .ok_or_else(|| format!("Expected GROUPING=FILE, got: {}", s))?;
    let grouping: Grouping = grouping.parse().map_err(|e| format!("{}", e))?;
    Ok((grouping, PathBuf::from(path)))
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    match cli.command {
        // ── Info ─────────────────────────────────────────────────────
        Commands::Info { input } => {
            let pb = spinner("Reading raster...");
            let raster = read_multiband(&input).context("Failed to read raster")?;
            pb.finish_and_clear();

            let (rows, cols) = raster.shape();
            let bounds = raster.bounds();
            let gt = raster.transform();

            println!("File: {}", input.display());
            println!("Dimensions: {} x {} ({} cells)", cols, rows, rows * cols);
            println!("Bands: {}", raster.band_count());
            println!("Pixel size: {} x {}", gt.pixel_width, gt.pixel_height.abs());
            println!(
                "Bounds: ({:.3}, {:.3}) - ({:.3}, {:.3})",
                bounds.0, bounds.1, bounds.2, bounds.3
            );
            if let Some(crs) = raster.crs() {
                println!("CRS: {}", crs);
            }
            if let Some(nodata) = raster.nodata() {
                println!("NoData: {}", nodata);
            }

            println!("\nBand ranges:");
            for b in 0..raster.band_count() {
                let Some(band) = raster.band(b) else { continue };
                let (min, max, valid) = band.iter().filter(|v| v.is_finite()).fold(
                    (f64::INFINITY, f64::NEG_INFINITY, 0usize),
                    |(lo, hi, n), &v| (lo.min(v), hi.max(v), n + 1),
                );
                if valid == 0 {
                    println!("  Band {:>2}: no valid cells", b + 1);
                } else {
                    println!(
                        "  Band {:>2}: {:.4} .. {:.4} ({} valid)",
                        b + 1,
                        min,
                        max,
                        valid
                    );
                }
            }
        }

        // ── Extract ──────────────────────────────────────────────────
        Commands::Extract {
            raster_dir,
            polygon,
            dates,
            network,
            grouping,
            default_epsg,
            output,
        } => {
            let polygons = read_geojson(&polygon)
                .with_context(|| format!("Failed to read polygon {}", polygon.display()))?;
            let params = chlorocast_algorithms::sampling::ExtractParams {
                network,
                grouping,
                default_polygon_crs: chlorocast_core::CRS::from_epsg(default_epsg),
            };

            let pb = spinner("Sampling rasters...");
            let start = Instant::now();
            let table = extract_pixels(&raster_dir, &dates, &polygons, &params)
                .context("Failed to sample rasters")?;
            let elapsed = start.elapsed();
            pb.finish_and_clear();

            if table.is_empty() {
                warn!("No pixels sampled for {} date(s)", dates.len());
            }
            write_table(&table, &output)?;
            done("Pixel table", &output, elapsed);
        }

        // ── Derive ───────────────────────────────────────────────────
        Commands::Derive {
            inputs,
            network,
            ratio_difference,
            output_dir,
        } => {
            let params = chlorocast_algorithms::features::DeriveParams {
                ratio_difference: ratio_difference.parse()?,
            };
            let sampled = inputs
                .iter()
                .map(|(grouping, path)| {
                    Ok(SampledTable {
                        network,
                        grouping: *grouping,
                        table: read_table(path)?,
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            let pb = spinner("Deriving features...");
            let start = Instant::now();
            let datasets = prepare_datasets(sampled, &params).context("Failed to derive features")?;
            let elapsed = start.elapsed();
            pb.finish_and_clear();

            std::fs::create_dir_all(&output_dir)
                .with_context(|| format!("Failed to create {}", output_dir.display()))?;
            for (name, table) in &datasets {
                let path = output_dir.join(format!("{}.csv", name));
                write_table(table, &path)?;
                println!("{}: {} rows x {} columns", name, table.len(), table.width());
            }
            done("Datasets", &output_dir, elapsed);
        }

        // ── Predict ──────────────────────────────────────────────────
        Commands::Predict {
            input,
            models,
            dataset,
            model,
            clip_min,
            lenient,
            python,
            output,
        } => {
            let table = read_table(&input)?;
            let dispatcher = PredictionDispatcher::open(&models, Capabilities::probe(&python))
                .with_context(|| format!("Failed to scan {}", models.display()))?;

            let pb = spinner("Running inference...");
            let start = Instant::now();
            let options = chlorocast_models::PredictOptions {
                clip_min,
                strict: !lenient,
            };
            let prediction = dispatcher
                .predict(&table, &dataset, &model, &options)
                .with_context(|| format!("Prediction with {} for {} failed", model, dataset))?;
            let elapsed = start.elapsed();
            pb.finish_and_clear();

            let mut out = FeatureTable::new(prediction.keys.clone())?;
            out.push_float(prediction.name.clone(), prediction.values)?;
            write_table(&out, &output)?;
            done("Predictions", &output, elapsed);
        }

        // ── Run ──────────────────────────────────────────────────────
        Commands::Run { config, dates } => {
            let config = match config {
                Some(path) => RunConfig::load(&path)?,
                None => {
                    let config = RunConfig::default();
                    config.validate()?;
                    config
                }
            };
            let capabilities = Capabilities::probe(&config.python);

            let mut failed = 0;
            for date in &dates {
                let pb = spinner(&format!("Processing {}...", date));
                let start = Instant::now();
                let result = pipeline::run_date(&config, *date, capabilities.clone());
                pb.finish_and_clear();
                match result {
                    Ok(path) => done("Predictions", &path, start.elapsed()),
                    Err(e) => {
                        failed += 1;
                        warn!("{} failed: {:#}", date, e);
                    }
                }
            }
            if failed > 0 {
                anyhow::bail!("{} of {} date(s) failed", failed, dates.len());
            }
        }

        // ── Models ───────────────────────────────────────────────────
        Commands::Models { dir, python, check } => {
            let registry = ModelRegistry::scan(&dir)
                .with_context(|| format!("Failed to scan {}", dir.display()))?;
            let capabilities = Capabilities::probe(&python);
            let loader = ModelLoader::new(capabilities.clone());

            println!("{} artifact(s) in {}", registry.len(), dir.display());
            for (key, entry) in registry.iter() {
                let format = entry
                    .format
                    .map(|f| {
                        let state = if capabilities.supports(f) { "" } else { ", no runtime" };
                        format!("{}{}", f, state)
                    })
                    .unwrap_or_else(|| "no model file".to_string());
                println!("\n{} [{}]", key, format);

                if let Some(path) = &entry.features_path {
                    println!("  features: {}", path.display());
                }
                match entry.metadata() {
                    Ok(Some(metadata)) => println!("  metadata: {}", metadata),
                    Ok(None) => {}
                    Err(e) => println!("  metadata: unreadable ({})", e),
                }

                if check {
                    let manifest = loader.load(key, entry).and_then(|model| {
                        chlorocast_models::manifest::resolve_manifest(key, entry, model.as_ref())
                    });
                    match manifest {
                        Ok(m) => {
                            let source = match &m.source {
                                ManifestSource::Sidecar(_) => "sidecar",
                                ManifestSource::Model => "model",
                            };
                            println!("  {} feature column(s) from {}", m.columns.len(), source);
                        }
                        Err(e) => println!("  check failed: {}", e),
                    }
                }
            }
        }
    }

    Ok(())
}
