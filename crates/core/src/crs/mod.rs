//! Coordinate Reference System handling

use serde::{Deserialize, Serialize};
use std::fmt;

/// Coordinate reference system of a raster or polygon collection.
///
/// Only identity matters here: the pipeline never reprojects, it only
/// checks that the mask and the raster are expressed in the same system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CRS {
    /// EPSG code if known
    epsg: Option<u32>,
    /// WKT representation (GDAL reader only)
    wkt: Option<String>,
}

impl CRS {
    /// Create a CRS from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        Self {
            epsg: Some(code),
            wkt: None,
        }
    }

    /// Create a CRS from a WKT string
    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        Self {
            epsg: None,
            wkt: Some(wkt.into()),
        }
    }

    /// Parse an authority string.
    ///
    /// Accepts `EPSG:32630`, `epsg:32630` and the OGC URN forms
    /// `urn:ogc:def:crs:EPSG::32630` / `urn:ogc:def:crs:EPSG:9.9:32630`.
    /// The legacy GeoJSON name `urn:ogc:def:crs:OGC:1.3:CRS84` maps to
    /// EPSG:4326.
    pub fn parse(name: &str) -> Option<Self> {
        let trimmed = name.trim();
        if trimmed.eq_ignore_ascii_case("urn:ogc:def:crs:OGC:1.3:CRS84") {
            return Some(Self::from_epsg(4326));
        }

        let upper = trimmed.to_ascii_uppercase();
        let rest = upper
            .strip_prefix("URN:OGC:DEF:CRS:EPSG:")
            .or_else(|| upper.strip_prefix("EPSG:"))?;

        // URN form may carry an empty or explicit version before the code
        let code = rest.rsplit(':').next()?;
        code.parse::<u32>().ok().map(Self::from_epsg)
    }

    /// Get EPSG code if known
    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    /// Get WKT representation
    pub fn wkt(&self) -> Option<&str> {
        self.wkt.as_deref()
    }

    /// Check if two CRS are equivalent
    pub fn is_equivalent(&self, other: &CRS) -> bool {
        if let (Some(a), Some(b)) = (self.epsg, other.epsg) {
            return a == b;
        }

        // Textual WKT comparison is the best we can do without PROJ
        if let (Some(a), Some(b)) = (&self.wkt, &other.wkt) {
            return a == b;
        }

        false
    }

    /// Get a string identifier for this CRS
    pub fn identifier(&self) -> String {
        if let Some(code) = self.epsg {
            return format!("EPSG:{}", code);
        }
        if let Some(wkt) = &self.wkt {
            return format!("WKT:{}", wkt.chars().take(50).collect::<String>());
        }
        "Unknown".to_string()
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}
