//! Polygon feature collections
//!
//! Regions of interest arrive as GeoJSON feature collections. Only the
//! polygonal part of each feature is kept: the pipeline uses them to build
//! a pixel mask and nothing else.

use geo_types::{Coord, LineString, MultiPolygon, Polygon};
use serde_json::{Map, Value};
use tracing::warn;

use crate::crs::CRS;
use crate::error::{Error, Result};

/// A polygonal feature with its GeoJSON properties
#[derive(Debug, Clone)]
pub struct Feature {
    /// Feature geometry (a single polygon is stored as a one-member multipolygon)
    pub geometry: MultiPolygon<f64>,
    /// Feature attributes, kept verbatim
    pub properties: Map<String, Value>,
    /// Optional feature ID
    pub id: Option<String>,
}

impl Feature {
    pub fn new(geometry: MultiPolygon<f64>) -> Self {
        Self {
            geometry,
            properties: Map::new(),
            id: None,
        }
    }
}

/// Collection of polygonal features plus the CRS they are expressed in
#[derive(Debug, Clone, Default)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
    crs: Option<CRS>,
}

impl FeatureCollection {
    pub fn new(features: Vec<Feature>, crs: Option<CRS>) -> Self {
        Self { features, crs }
    }

    /// Parse a GeoJSON document.
    ///
    /// Accepts a `FeatureCollection`, a single `Feature`, or a bare
    /// `Polygon` / `MultiPolygon` geometry. A legacy top-level `crs` member
    /// (`{"type": "name", "properties": {"name": "EPSG:32630"}}`) is honoured.
    pub fn from_geojson_str(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_geojson_value(&value)
    }

    pub fn from_geojson_value(value: &Value) -> Result<Self> {
        let crs = parse_named_crs(value);

        let features = match value.get("type").and_then(Value::as_str) {
            Some("FeatureCollection") => {
                let items = value
                    .get("features")
                    .and_then(Value::as_array)
                    .ok_or_else(|| Error::InvalidGeometry("FeatureCollection without features".into()))?;

                let mut features = Vec::with_capacity(items.len());
                for (i, item) in items.iter().enumerate() {
                    match parse_feature(item)? {
                        Some(feature) => features.push(feature),
                        None => warn!("Feature {} has no polygonal geometry, ignored", i),
                    }
                }
                features
            }
            Some("Feature") => parse_feature(value)?.into_iter().collect(),
            Some(_) => vec![Feature::new(parse_geometry(value)?.ok_or_else(|| {
                Error::InvalidGeometry("geometry is not polygonal".into())
            })?)],
            None => return Err(Error::InvalidGeometry("missing GeoJSON type".into())),
        };

        Ok(Self { features, crs })
    }

    /// CRS declared by the source document, or assigned afterwards
    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    /// Assign `crs` when the document did not declare one
    pub fn with_default_crs(mut self, crs: CRS) -> Self {
        if self.crs.is_none() {
            self.crs = Some(crs);
        }
        self
    }

    /// All polygons of all features, flattened
    pub fn polygons(&self) -> MultiPolygon<f64> {
        MultiPolygon::new(
            self.features
                .iter()
                .flat_map(|f| f.geometry.0.iter().cloned())
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.features.iter()
    }
}

fn parse_named_crs(value: &Value) -> Option<CRS> {
    let name = value.get("crs")?.get("properties")?.get("name")?.as_str()?;
    let crs = CRS::parse(name);
    if crs.is_none() {
        warn!("Unrecognised GeoJSON crs name '{}', treating as undeclared", name);
    }
    crs
}

fn parse_feature(value: &Value) -> Result<Option<Feature>> {
    let geometry = match value.get("geometry") {
        Some(Value::Null) | None => return Ok(None),
        Some(g) => parse_geometry(g)?,
    };

    let Some(geometry) = geometry else {
        return Ok(None);
    };

    let properties = value
        .get("properties")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    let id = value.get("id").map(|id| match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    });

    Ok(Some(Feature {
        geometry,
        properties,
        id,
    }))
}

/// Returns `None` for non-polygonal geometry types
fn parse_geometry(value: &Value) -> Result<Option<MultiPolygon<f64>>> {
    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::InvalidGeometry("geometry without type".into()))?;
    let coords = value.get("coordinates");

    match (kind, coords) {
        ("Polygon", Some(c)) => {
            let rings: Vec<Vec<Vec<f64>>> = serde_json::from_value(c.clone())?;
            Ok(Some(MultiPolygon::new(vec![build_polygon(rings)?])))
        }
        ("MultiPolygon", Some(c)) => {
            let polys: Vec<Vec<Vec<Vec<f64>>>> = serde_json::from_value(c.clone())?;
            let polygons = polys
                .into_iter()
                .map(build_polygon)
                .collect::<Result<Vec<_>>>()?;
            Ok(Some(MultiPolygon::new(polygons)))
        }
        ("GeometryCollection", _) => {
            let members = value
                .get("geometries")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();
            let mut polygons = Vec::new();
            for member in &members {
                if let Some(mp) = parse_geometry(member)? {
                    polygons.extend(mp.0);
                }
            }
            Ok((!polygons.is_empty()).then(|| MultiPolygon::new(polygons)))
        }
        ("Polygon" | "MultiPolygon", None) => Err(Error::InvalidGeometry(format!(
            "{} without coordinates",
            kind
        ))),
        _ => Ok(None),
    }
}

fn build_polygon(rings: Vec<Vec<Vec<f64>>>) -> Result<Polygon<f64>> {
    let mut rings = rings.into_iter().map(build_ring);
    let exterior = rings
        .next()
        .ok_or_else(|| Error::InvalidGeometry("polygon without rings".into()))??;
    let interiors = rings.collect::<Result<Vec<_>>>()?;
    Ok(Polygon::new(exterior, interiors))
}

fn build_ring(positions: Vec<Vec<f64>>) -> Result<LineString<f64>> {
    if positions.len() < 4 {
        return Err(Error::InvalidGeometry(format!(
            "linear ring needs at least 4 positions, got {}",
            positions.len()
        )));
    }
    positions
        .into_iter()
        .map(|p| match p.as_slice() {
            [x, y, ..] => Ok(Coord { x: *x, y: *y }),
            _ => Err(Error::InvalidGeometry("position with fewer than 2 ordinates".into())),
        })
        .collect::<Result<Vec<_>>>()
        .map(LineString::new)
}
