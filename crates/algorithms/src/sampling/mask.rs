//! Polygon masks over a raster grid

use geo::{BoundingRect, Contains, MultiPolygon, Point, Polygon, Rect};
use ndarray::Array2;

use crate::maybe_rayon::*;
use chlorocast_core::raster::GeoTransform;
use chlorocast_core::{Error, Result};

/// Rasterize `polygons` onto a `rows x cols` grid.
///
/// A cell is `true` when its centre lies inside any polygon. Cells whose
/// centre falls exactly on a boundary are left out.
pub fn geometry_mask(
    polygons: &MultiPolygon<f64>,
    transform: &GeoTransform,
    rows: usize,
    cols: usize,
) -> Result<Array2<bool>> {
    let candidates: Vec<(Rect<f64>, &Polygon<f64>)> = polygons
        .0
        .iter()
        .filter_map(|p| p.bounding_rect().map(|r| (r, p)))
        .collect();

    let data: Vec<bool> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![false; cols];
            for (col, cell) in row_data.iter_mut().enumerate() {
                let (x, y) = transform.pixel_center(row, col);
                let point = Point::new(x, y);
                *cell = candidates.iter().any(|(bbox, polygon)| {
                    x >= bbox.min().x
                        && x <= bbox.max().x
                        && y >= bbox.min().y
                        && y <= bbox.max().y
                        && polygon.contains(&point)
                });
            }
            row_data
        })
        .collect();

    Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))
}

/// `(row, col)` of every masked cell in row-major order
pub fn masked_cells(mask: &Array2<bool>) -> Vec<(usize, usize)> {
    mask.indexed_iter()
        .filter(|(_, inside)| **inside)
        .map(|(idx, _)| idx)
        .collect()
}
