//! # Chlorocast Core
//!
//! Core types and I/O for the chlorocast prediction pipeline.
//!
//! This crate provides:
//! - `MultibandRaster`: band-stacked reflectance grid
//! - `GeoTransform`: Affine transformation for georeferencing
//! - `CRS`: Coordinate Reference System handling
//! - `FeatureCollection`: polygon masks read from GeoJSON
//! - `FeatureTable`: per-pixel tables keyed by date and coordinates
//! - I/O for GeoTIFF, GeoJSON and CSV

pub mod crs;
pub mod error;
pub mod io;
pub mod raster;
pub mod table;
pub mod vector;

pub use crs::CRS;
pub use error::{Error, Result};
pub use raster::{GeoTransform, MultibandRaster};
pub use table::{Column, FeatureTable, RowKey};
pub use vector::{Feature, FeatureCollection};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result};
    pub use crate::raster::{GeoTransform, MultibandRaster};
    pub use crate::table::{Column, FeatureTable, RowKey};
    pub use crate::vector::{Feature, FeatureCollection};
}
