//! Affine geotransformation for rasters

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Affine transformation coefficients for georeferencing rasters.
///
/// Converts between pixel coordinates (col, row) and geographic coordinates (x, y):
/// ```text
/// x = origin_x + col * pixel_width + row * row_rotation
/// y = origin_y + col * col_rotation + row * pixel_height
/// ```
///
/// For north-up images, `row_rotation` and `col_rotation` are typically 0,
/// and `pixel_height` is negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    /// X coordinate of the upper-left corner
    pub origin_x: f64,
    /// Y coordinate of the upper-left corner
    pub origin_y: f64,
    /// Pixel width (cell size in X direction)
    pub pixel_width: f64,
    /// Pixel height (cell size in Y direction, usually negative)
    pub pixel_height: f64,
    /// Rotation about X axis (usually 0)
    pub row_rotation: f64,
    /// Rotation about Y axis (usually 0)
    pub col_rotation: f64,
}

impl GeoTransform {
    /// Create a new GeoTransform with no rotation (north-up image)
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
            row_rotation: 0.0,
            col_rotation: 0.0,
        }
    }

    /// Create from GDAL-style array [origin_x, pixel_width, row_rotation, origin_y, col_rotation, pixel_height]
    pub fn from_gdal(coeffs: [f64; 6]) -> Self {
        Self {
            origin_x: coeffs[0],
            pixel_width: coeffs[1],
            row_rotation: coeffs[2],
            origin_y: coeffs[3],
            col_rotation: coeffs[4],
            pixel_height: coeffs[5],
        }
    }

    /// Build from the GeoTIFF ModelPixelScale + ModelTiepoint pair.
    ///
    /// `tiepoint` is `[I, J, K, X, Y, Z]`, `scale` is `[ScaleX, ScaleY, ScaleZ]`.
    pub fn from_scale_tiepoint(scale: &[f64], tiepoint: &[f64]) -> Option<Self> {
        if scale.len() < 2 || tiepoint.len() < 6 {
            return None;
        }
        let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
        let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
        Some(Self::new(origin_x, origin_y, scale[0], -scale[1]))
    }

    /// Build from the GeoTIFF ModelTransformation 4x4 row-major matrix
    pub fn from_model_transformation(t: &[f64]) -> Option<Self> {
        if t.len() < 16 {
            return None;
        }
        Some(Self {
            origin_x: t[3],
            origin_y: t[7],
            pixel_width: t[0],
            pixel_height: t[5],
            row_rotation: t[1],
            col_rotation: t[4],
        })
    }

    /// Geographic coordinates of the center of pixel (row, col).
    ///
    /// Returns `(x, y)`, i.e. easting/longitude first.
    pub fn pixel_center(&self, row: usize, col: usize) -> (f64, f64) {
        let col_f = col as f64 + 0.5;
        let row_f = row as f64 + 0.5;

        let x = self.origin_x + col_f * self.pixel_width + row_f * self.row_rotation;
        let y = self.origin_y + col_f * self.col_rotation + row_f * self.pixel_height;

        (x, y)
    }

    /// Like [`pixel_center`](Self::pixel_center) but fails on a degenerate
    /// transform or a non-finite result instead of returning garbage.
    pub fn checked_pixel_center(&self, row: usize, col: usize) -> Result<(f64, f64)> {
        if self.determinant().abs() < 1e-12 {
            return Err(Error::SamplingSkipped {
                row,
                col,
                reason: "degenerate geotransform".into(),
            });
        }

        let (x, y) = self.pixel_center(row, col);
        if !x.is_finite() || !y.is_finite() {
            return Err(Error::SamplingSkipped {
                row,
                col,
                reason: format!("non-finite coordinate ({}, {})", x, y),
            });
        }
        Ok((x, y))
    }

    /// Calculate the bounding box `(min_x, min_y, max_x, max_y)` for a raster of given dimensions
    pub fn bounds(&self, width: usize, height: usize) -> (f64, f64, f64, f64) {
        let corner = |col: usize, row: usize| {
            let (c, r) = (col as f64, row as f64);
            (
                self.origin_x + c * self.pixel_width + r * self.row_rotation,
                self.origin_y + c * self.col_rotation + r * self.pixel_height,
            )
        };
        let corners = [
            corner(0, 0),
            corner(width, 0),
            corner(0, height),
            corner(width, height),
        ];

        corners.iter().fold(
            (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
            |(min_x, min_y, max_x, max_y), &(x, y)| {
                (min_x.min(x), min_y.min(y), max_x.max(x), max_y.max(y))
            },
        )
    }

    fn determinant(&self) -> f64 {
        self.pixel_width * self.pixel_height - self.row_rotation * self.col_rotation
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, -1.0)
    }
}
