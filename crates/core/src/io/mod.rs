//! Reading and writing rasters, polygon files and feature tables

mod csv_table;
#[cfg(feature = "gdal")]
mod gdal_io;
mod native;

use std::path::Path;

use crate::error::Result;
use crate::vector::FeatureCollection;

#[cfg(feature = "gdal")]
pub use gdal_io::read_multiband;

#[cfg(not(feature = "gdal"))]
pub use native::read_multiband;

// Buffer-based I/O (always available, no filesystem dependency)
pub use native::{read_multiband_from_buffer, write_multiband, write_multiband_to_buffer};

pub use csv_table::{format_float, read_table_csv, read_table_from, write_table_csv};

/// Read a GeoJSON polygon file
pub fn read_geojson<P: AsRef<Path>>(path: P) -> Result<FeatureCollection> {
    let text = std::fs::read_to_string(path.as_ref())?;
    FeatureCollection::from_geojson_str(&text)
}
