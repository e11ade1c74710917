//! Raster sampling inside a polygon mask
//!
//! - **grouping**: window sizes and the NaN-aware median
//! - **mask**: polygon rasterization onto the raster grid
//! - **select**: choosing the raster file for a date and network set
//! - **sampler**: per-pixel records and multi-date extraction

mod grouping;
mod mask;
mod sampler;
mod select;

pub use grouping::{median, Grouping};
pub use mask::{geometry_mask, masked_cells};
pub use sampler::{
    check_crs, extract_pixels, records_to_table, sample_raster, ExtractParams, PixelRecord,
};
pub use select::{candidate_rasters, select_raster, NetworkSet};
