//! Band layout of the processed rasters
//!
//! Rasters carry 21 bands: 13 top-of-atmosphere reflectances followed by
//! 8 water-leaving reflectances.

use chlorocast_core::{FeatureTable, Result};

/// Top-of-atmosphere reflectance bands, raster bands 1 to 13
pub const TOA_BANDS: [&str; 13] = [
    "rtoa_B1", "rtoa_B2", "rtoa_B3", "rtoa_B4", "rtoa_B5", "rtoa_B6", "rtoa_B7", "rtoa_B8",
    "rtoa_B8A", "rtoa_B9", "rtoa_B10", "rtoa_B11", "rtoa_B12",
];

/// Water-leaving reflectance bands, raster bands 14 to 21
pub const RHOW_BANDS: [&str; 8] = [
    "rhow_B1", "rhow_B2", "rhow_B3", "rhow_B4", "rhow_B5", "rhow_B6", "rhow_B7", "rhow_B8A",
];

/// Total bands expected in a processed raster
pub const BAND_COUNT: usize = TOA_BANDS.len() + RHOW_BANDS.len();

/// Reflectance family of a band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReflectanceType {
    TopOfAtmosphere,
    WaterLeaving,
}

/// Name of a raw raster band column, 1-based
pub fn raw_band_name(band: usize) -> String {
    format!("Band_{}", band)
}

/// Semantic name of a raw `Band_<i>` column
pub fn semantic_band_name(raw: &str) -> Option<&'static str> {
    let index: usize = raw.strip_prefix("Band_")?.parse().ok()?;
    let i = index.checked_sub(1)?;
    TOA_BANDS
        .iter()
        .chain(RHOW_BANDS.iter())
        .nth(i)
        .copied()
}

/// Rename `Band_<i>` columns to their semantic names; other columns are kept
pub fn rename_bands(table: &mut FeatureTable) -> Result<()> {
    table.rename_columns(|name| semantic_band_name(name).map(str::to_string))
}
