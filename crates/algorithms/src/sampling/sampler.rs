//! Per-pixel sampling of multiband rasters inside a polygon mask

use chrono::NaiveDate;
use ndarray::{s, Array2};
use std::path::Path;
use tracing::{debug, info, warn};

use super::grouping::{median, Grouping};
use super::mask::{geometry_mask, masked_cells};
use super::select::{candidate_rasters, select_raster, NetworkSet};
use crate::features::raw_band_name;
use crate::maybe_rayon::*;
use chlorocast_core::io::read_multiband;
use chlorocast_core::{
    Error, FeatureCollection, FeatureTable, MultibandRaster, Result, RowKey, CRS,
};

/// One sampled pixel: its key and one value per band
#[derive(Debug, Clone, PartialEq)]
pub struct PixelRecord {
    pub date: NaiveDate,
    /// Northing (y) of the pixel centre
    pub latitude: f64,
    /// Easting (x) of the pixel centre
    pub longitude: f64,
    pub values: Vec<f64>,
}

/// Parameters for [`extract_pixels`]
#[derive(Debug, Clone)]
pub struct ExtractParams {
    pub network: NetworkSet,
    pub grouping: Grouping,
    /// CRS assumed for a polygon file that does not declare one
    pub default_polygon_crs: CRS,
}

impl Default for ExtractParams {
    fn default() -> Self {
        Self {
            network: NetworkSet::C2xComplex,
            grouping: Grouping::Single,
            default_polygon_crs: CRS::from_epsg(32630),
        }
    }
}

/// Sample every masked pixel of `raster`.
///
/// With a grouping window each band value is the median over the window
/// clipped to the raster. A pixel that cannot be sampled is logged and
/// skipped. Records come back in row-major order.
///
/// # Arguments
/// * `raster` - Band stack to sample
/// * `mask` - Cells to sample, same shape as the raster grid
/// * `date` - Acquisition date stored on every record
/// * `grouping` - Aggregation window
pub fn sample_raster(
    raster: &MultibandRaster,
    mask: &Array2<bool>,
    date: NaiveDate,
    grouping: Grouping,
) -> Result<Vec<PixelRecord>> {
    let (rows, cols) = raster.shape();
    if mask.dim() != (rows, cols) {
        return Err(Error::SizeMismatch {
            expected: rows * cols,
            actual: mask.len(),
        });
    }

    let cells = masked_cells(mask);
    debug!("Sampling {} masked pixel(s) with {} grouping", cells.len(), grouping);

    let records: Vec<PixelRecord> = cells
        .into_par_iter()
        .filter_map(|(row, col)| match sample_pixel(raster, row, col, date, grouping) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("Skipping pixel ({}, {}): {}", row, col, e);
                None
            }
        })
        .collect();

    Ok(records)
}

fn sample_pixel(
    raster: &MultibandRaster,
    row: usize,
    col: usize,
    date: NaiveDate,
    grouping: Grouping,
) -> Result<PixelRecord> {
    let (x, y) = raster.transform().checked_pixel_center(row, col)?;

    let values = if grouping.offset() == 0 {
        raster.pixel(row, col)?
    } else {
        let (rows, cols) = raster.shape();
        let (row_range, col_range) = grouping.window(row, col, rows, cols);
        let view = raster.view();
        (0..raster.band_count())
            .map(|band| {
                let mut window: Vec<f64> = view
                    .slice(s![band, row_range.clone(), col_range.clone()])
                    .iter()
                    .copied()
                    .collect();
                median(&mut window)
            })
            .collect()
    };

    Ok(PixelRecord {
        date,
        latitude: y,
        longitude: x,
        values,
    })
}

/// Build a table with one `Band_<i>` column per band
pub fn records_to_table(records: &[PixelRecord], band_count: usize) -> Result<FeatureTable> {
    let keys = records
        .iter()
        .map(|r| RowKey::new(r.date, r.latitude, r.longitude))
        .collect();
    let mut table = FeatureTable::new(keys)?;

    for band in 0..band_count {
        let values = records
            .iter()
            .map(|r| {
                r.values.get(band).copied().ok_or(Error::SizeMismatch {
                    expected: band_count,
                    actual: r.values.len(),
                })
            })
            .collect::<Result<Vec<f64>>>()?;
        table.push_float(raw_band_name(band + 1), values)?;
    }
    Ok(table)
}

/// Fail when the polygon and raster CRS are both known and differ
pub fn check_crs(polygon_crs: Option<&CRS>, raster_crs: Option<&CRS>) -> Result<()> {
    let (Some(p), Some(r)) = (polygon_crs, raster_crs) else {
        return Ok(());
    };
    let comparable =
        (p.epsg().is_some() && r.epsg().is_some()) || (p.wkt().is_some() && r.wkt().is_some());
    if comparable && !p.is_equivalent(r) {
        return Err(Error::CrsMismatch(p.identifier(), r.identifier()));
    }
    Ok(())
}

/// Sample the rasters of `dir` for each date inside `polygons`.
///
/// Dates are de-duplicated and processed in order. A date without a
/// matching raster is skipped. All rasters must share one band count.
pub fn extract_pixels(
    dir: &Path,
    dates: &[NaiveDate],
    polygons: &FeatureCollection,
    params: &ExtractParams,
) -> Result<FeatureTable> {
    let mut dates = dates.to_vec();
    dates.sort();
    dates.dedup();

    let candidates = candidate_rasters(dir, params.network)?;
    let polygon_crs = polygons
        .crs()
        .cloned()
        .unwrap_or_else(|| params.default_polygon_crs.clone());
    let shapes = polygons.polygons();

    let mut records = Vec::new();
    let mut band_count = None;

    for date in dates {
        let Some(path) = select_raster(&candidates, date) else {
            debug!("No {} raster for {}", params.network, date);
            continue;
        };
        info!("Processing {}", path.display());

        let raster = read_multiband(&path)?;
        check_crs(Some(&polygon_crs), raster.crs())?;

        match band_count {
            Some(n) if n != raster.band_count() => {
                return Err(Error::InvalidDimensions {
                    bands: raster.band_count(),
                    width: raster.cols(),
                    height: raster.rows(),
                });
            }
            _ => band_count = Some(raster.band_count()),
        }

        let mask = geometry_mask(&shapes, raster.transform(), raster.rows(), raster.cols())?;
        let sampled = sample_raster(&raster, &mask, date, params.grouping)?;
        info!("{}: {} pixel(s) sampled", date, sampled.len());
        records.extend(sampled);
    }

    records_to_table(&records, band_count.unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chlorocast_core::GeoTransform;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 1, 20).unwrap()
    }

    /// 2 bands over 4x4; band 0 holds row * 4 + col, band 1 holds 100 + that
    fn raster() -> MultibandRaster {
        let mut data: Vec<f64> = (0..16).map(|v| v as f64).collect();
        data.extend((0..16).map(|v| 100.0 + v as f64));
        MultibandRaster::from_vec(data, 2, 4, 4)
            .unwrap()
            .with_transform(GeoTransform::new(1000.0, 2000.0, 10.0, -10.0))
    }

    #[test]
    fn test_single_pixel_values_and_coords() {
        let r = raster();
        let mut mask = Array2::from_elem((4, 4), false);
        mask[[1, 2]] = true;

        let records = sample_raster(&r, &mask, date(), Grouping::Single).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].values, vec![6.0, 106.0]);
        assert_relative_eq!(records[0].longitude, 1025.0);
        assert_relative_eq!(records[0].latitude, 1985.0);
    }

    #[test]
    fn test_window_median_clipped_at_corner() {
        let r = raster();
        let mut mask = Array2::from_elem((4, 4), false);
        mask[[0, 0]] = true;

        let records = sample_raster(&r, &mask, date(), Grouping::Window3).unwrap();
        // window rows 0..2, cols 0..2 -> values 0, 1, 4, 5
        assert_relative_eq!(records[0].values[0], 3.0);
        assert_relative_eq!(records[0].values[1], 103.0);
    }

    #[test]
    fn test_nan_in_window_poisons_median() {
        let mut data = vec![1.0; 9];
        data[8] = f64::NAN;
        let r = MultibandRaster::from_vec(data, 1, 3, 3)
            .unwrap()
            .with_transform(GeoTransform::new(0.0, 3.0, 1.0, -1.0));
        let mask = Array2::from_elem((3, 3), true);

        let records = sample_raster(&r, &mask, date(), Grouping::Window3).unwrap();
        // only windows reaching the bottom-right cell are affected
        assert_eq!(records[0].values[0], 1.0);
        assert_eq!(records[2].values[0], 1.0);
        assert!(records[4].values[0].is_nan());
        assert!(records[8].values[0].is_nan());
    }

    #[test]
    fn test_degenerate_transform_skips_pixels() {
        let r = raster().with_transform(GeoTransform::new(0.0, 0.0, 0.0, 0.0));
        let mask = Array2::from_elem((4, 4), true);
        let records = sample_raster(&r, &mask, date(), Grouping::Single).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn test_mask_shape_checked() {
        let mask = Array2::from_elem((3, 4), true);
        assert!(sample_raster(&raster(), &mask, date(), Grouping::Single).is_err());
    }

    #[test]
    fn test_records_to_table() {
        let r = raster();
        let mask = Array2::from_elem((4, 4), true);
        let records = sample_raster(&r, &mask, date(), Grouping::Single).unwrap();
        let table = records_to_table(&records, 2).unwrap();

        assert_eq!(table.len(), 16);
        assert_eq!(table.column_names(), &["Band_1".to_string(), "Band_2".to_string()]);
        assert_eq!(table.float_column("Band_2").unwrap()[15], 115.0);
    }

    #[test]
    fn test_check_crs() {
        let utm = CRS::from_epsg(32630);
        assert!(check_crs(Some(&utm), Some(&CRS::from_epsg(32630))).is_ok());
        assert!(check_crs(Some(&utm), None).is_ok());
        assert!(matches!(
            check_crs(Some(&utm), Some(&CRS::from_epsg(4326))),
            Err(Error::CrsMismatch(_, _))
        ));
    }
}
