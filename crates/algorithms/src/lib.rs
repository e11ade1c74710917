//! # Chlorocast Algorithms
//!
//! Pixel sampling and feature derivation for chlorocast.
//!
//! ## Modules
//!
//! - **sampling**: raster selection, polygon masks, windowed median sampling
//! - **features**: band renaming, reflectance datasets, band-index
//!   features, name compaction, season encoding

mod maybe_rayon;

pub mod features;
pub mod sampling;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::features::{
        derive_features, prepare_datasets, DeriveParams, IndexPlan, RatioDifference,
        SampledTable, Season,
    };
    pub use crate::sampling::{
        extract_pixels, sample_raster, ExtractParams, Grouping, NetworkSet, PixelRecord,
    };
    pub use chlorocast_core::prelude::*;
}
