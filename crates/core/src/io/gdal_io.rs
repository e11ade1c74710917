//! Multi-band raster reading using GDAL

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, MultibandRaster};
use gdal::Dataset;
use std::path::Path;
use tracing::debug;

/// Read every band of a raster file through GDAL.
///
/// Any format GDAL can open is accepted, including the band-sequential
/// GeoTIFFs the native reader cannot decode.
pub fn read_multiband<P: AsRef<Path>>(path: P) -> Result<MultibandRaster> {
    let dataset = Dataset::open(path.as_ref())?;
    let (cols, rows) = dataset.raster_size();
    let band_count = dataset.raster_count() as usize;

    let mut data = Vec::with_capacity(band_count * rows * cols);
    let mut nodata = None;
    for band_idx in 1..=band_count {
        let band = dataset.rasterband(band_idx)?;
        let buffer = band.read_as::<f64>((0, 0), (cols, rows), (cols, rows), None)?;
        data.extend_from_slice(buffer.data());
        if band_idx == 1 {
            nodata = band.no_data_value();
        }
    }

    let transform = dataset
        .geo_transform()
        .map(GeoTransform::from_gdal)
        .unwrap_or_default();
    let crs = dataset.spatial_ref().ok().and_then(|srs| match srs.auth_code() {
        Ok(code) => Some(CRS::from_epsg(code as u32)),
        Err(_) => srs.to_wkt().ok().map(CRS::from_wkt),
    });

    let mut raster = MultibandRaster::from_vec(data, band_count, rows, cols)?
        .with_transform(transform)
        .with_crs(crs);

    raster.set_nodata(nodata);
    debug!("GDAL decoded {} band(s) of {}x{}", band_count, cols, rows);

    if raster.band_count() == 0 {
        return Err(Error::InvalidDimensions {
            bands: 0,
            width: cols,
            height: rows,
        });
    }
    Ok(raster)
}
