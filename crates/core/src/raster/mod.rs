//! Raster data structures

mod geotransform;
mod multiband;

pub use geotransform::GeoTransform;
pub use multiband::MultibandRaster;
