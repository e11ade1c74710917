//! Multi-band raster grid

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::GeoTransform;
use ndarray::{s, Array3, ArrayView2, ArrayView3};

/// A georeferenced stack of bands sharing one grid.
///
/// Values are stored as `f64` in band-major order `(band, row, col)`.
/// The stack is read once per raster file and never mutated afterwards.
///
/// # Example
///
/// ```ignore
/// use chlorocast_core::MultibandRaster;
///
/// let stack = MultibandRaster::from_vec(vec![0.0; 2 * 3 * 4], 2, 3, 4)?;
/// assert_eq!(stack.band_count(), 2);
/// let px = stack.pixel(2, 3)?;
/// ```
#[derive(Debug, Clone)]
pub struct MultibandRaster {
    data: Array3<f64>,
    transform: GeoTransform,
    crs: Option<CRS>,
    nodata: Option<f64>,
}

impl MultibandRaster {
    /// Create a stack from band-major data
    pub fn from_vec(data: Vec<f64>, bands: usize, rows: usize, cols: usize) -> Result<Self> {
        if bands == 0 || data.len() != bands * rows * cols {
            return Err(Error::InvalidDimensions {
                bands,
                width: cols,
                height: rows,
            });
        }

        let array = Array3::from_shape_vec((bands, rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;

        Ok(Self::from_array(array))
    }

    /// Create a stack from an existing `(band, row, col)` array
    pub fn from_array(data: Array3<f64>) -> Self {
        Self {
            data,
            transform: GeoTransform::default(),
            crs: None,
            nodata: None,
        }
    }

    /// Builder-style transform setter
    pub fn with_transform(mut self, transform: GeoTransform) -> Self {
        self.transform = transform;
        self
    }

    /// Builder-style CRS setter
    pub fn with_crs(mut self, crs: Option<CRS>) -> Self {
        self.crs = crs;
        self
    }

    // Dimensions

    /// Number of bands
    pub fn band_count(&self) -> usize {
        self.data.dim().0
    }

    /// Number of rows
    pub fn rows(&self) -> usize {
        self.data.dim().1
    }

    /// Number of columns
    pub fn cols(&self) -> usize {
        self.data.dim().2
    }

    /// Grid shape as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        (self.rows(), self.cols())
    }

    // Data access

    /// All band values at (row, col)
    pub fn pixel(&self, row: usize, col: usize) -> Result<Vec<f64>> {
        if row >= self.rows() || col >= self.cols() {
            return Err(Error::IndexOutOfBounds {
                row,
                col,
                rows: self.rows(),
                cols: self.cols(),
            });
        }
        Ok(self.data.slice(s![.., row, col]).to_vec())
    }

    /// View of a single band
    pub fn band(&self, band: usize) -> Option<ArrayView2<'_, f64>> {
        (band < self.band_count()).then(|| self.data.slice(s![band, .., ..]))
    }

    /// View of the whole stack
    pub fn view(&self) -> ArrayView3<'_, f64> {
        self.data.view()
    }

    // Metadata

    /// Get the geotransform
    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    /// Get the CRS
    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    /// Get the no-data value declared by the source file
    pub fn nodata(&self) -> Option<f64> {
        self.nodata
    }

    /// Set the no-data value
    pub fn set_nodata(&mut self, nodata: Option<f64>) {
        self.nodata = nodata;
    }

    /// Geographic bounds (min_x, min_y, max_x, max_y)
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.transform.bounds(self.cols(), self.rows())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stack() -> MultibandRaster {
        // band b, row r, col c = 100*b + 10*r + c
        let data: Vec<f64> = (0..2)
            .flat_map(|b| (0..3).flat_map(move |r| (0..4).map(move |c| (100 * b + 10 * r + c) as f64)))
            .collect();
        MultibandRaster::from_vec(data, 2, 3, 4).unwrap()
    }

    #[test]
    fn test_dimensions() {
        let s = stack();
        assert_eq!(s.band_count(), 2);
        assert_eq!(s.shape(), (3, 4));
    }

    #[test]
    fn test_access() {
        let s = stack();
        assert_eq!(s.pixel(1, 2).unwrap(), vec![12.0, 112.0]);
        assert!(s.pixel(3, 0).is_err());
        assert_eq!(s.band(1).unwrap()[[2, 3]], 123.0);
        assert!(s.band(2).is_none());
    }

    #[test]
    fn test_rejects_bad_length() {
        let err = MultibandRaster::from_vec(vec![0.0; 5], 2, 3, 4).unwrap_err();
        assert!(matches!(err, Error::InvalidDimensions { bands: 2, .. }));
    }
}
