use std::collections::HashMap;
use std::fs;
use std::path::Path;

use foundation::{Aabb2, Crs, Transform};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::LoadError;

/// Property names tried after the configured one.
const FALLBACK_NAME_FIELDS: [&str; 3] = ["ADMIN", "name", "NAME"];

#[derive(Debug, Clone, PartialEq)]
pub struct Country {
    pub name: String,
    pub geometry: MultiPolygon<f64>,
    /// `None` only for a geometry without any vertex.
    pub bounds: Option<Aabb2>,
}

impl Country {
    pub fn new(name: impl Into<String>, geometry: MultiPolygon<f64>) -> Self {
        let bounds = exterior_bounds(&geometry);
        Self {
            name: name.into(),
            geometry,
            bounds,
        }
    }
}

fn exterior_bounds(geometry: &MultiPolygon<f64>) -> Option<Aabb2> {
    Aabb2::from_points(
        geometry
            .iter()
            .flat_map(|poly| poly.exterior().coords().map(|c| (c.x, c.y))),
    )
}

/// Country polygons tagged with the reference system they are expressed in.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundarySet {
    pub crs: Crs,
    pub countries: Vec<Country>,
}

#[derive(Debug, Clone)]
pub struct BoundaryOptions {
    /// Feature property holding the country name.
    pub name_field: String,
    /// Overrides whatever the file declares.
    pub crs_override: Option<Crs>,
}

impl Default for BoundaryOptions {
    fn default() -> Self {
        Self {
            name_field: "ADMIN".to_string(),
            crs_override: None,
        }
    }
}

pub fn load_boundaries(
    path: impl AsRef<Path>,
    options: &BoundaryOptions,
) -> Result<BoundarySet, LoadError> {
    let path = path.as_ref();
    let payload = fs::read_to_string(path).map_err(|e| LoadError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    let set = BoundarySet::from_geojson_str(&payload, options)?;
    info!(
        "loaded {} country boundaries from {}",
        set.countries.len(),
        path.display()
    );
    Ok(set)
}

impl BoundarySet {
    pub fn new(crs: Crs, countries: Vec<Country>) -> Self {
        Self { crs, countries }
    }

    pub fn len(&self) -> usize {
        self.countries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.countries.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.countries.iter().map(|c| c.name.as_str())
    }

    pub fn from_geojson_str(payload: &str, options: &BoundaryOptions) -> Result<Self, LoadError> {
        let value: Value = serde_json::from_str(payload)?;
        Self::from_geojson_value(&value, options)
    }

    /// Parses a FeatureCollection and normalises it to WGS84.
    ///
    /// Without a declared CRS the coordinates are taken as WGS84 unchanged;
    /// a declared non-WGS84 CRS is reprojected vertex by vertex.
    pub fn from_geojson_value(value: &Value, options: &BoundaryOptions) -> Result<Self, LoadError> {
        let obj = value.as_object().ok_or(LoadError::NotAFeatureCollection)?;
        let ty = obj
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or(LoadError::NotAFeatureCollection)?;
        if ty != "FeatureCollection" {
            return Err(LoadError::NotAFeatureCollection);
        }

        let declared = options.crs_override.clone().or_else(|| declared_crs(obj));
        let transform = match &declared {
            None => {
                debug!("boundary file declares no CRS; assuming EPSG:4326");
                Crs::Wgs84.to_wgs84()
            }
            Some(crs) => crs.to_wgs84(),
        }
        .ok_or_else(|| {
            LoadError::UnsupportedCrs(declared.as_ref().map(Crs::to_string).unwrap_or_default())
        })?;
        if let Some(crs) = declared.as_ref().filter(|c| **c != Crs::Wgs84) {
            info!("reprojecting boundaries from {crs} to EPSG:4326");
        }

        let features_val = obj
            .get("features")
            .and_then(|v| v.as_array())
            .ok_or(LoadError::NotAFeatureCollection)?;

        let mut countries: Vec<Country> = Vec::with_capacity(features_val.len());
        let mut by_name: HashMap<String, usize> = HashMap::new();
        let mut dropped = 0usize;

        for (index, feat_val) in features_val.iter().enumerate() {
            let feat_obj = feat_val.as_object().ok_or(LoadError::InvalidFeature {
                index,
                reason: "feature must be an object".to_string(),
            })?;

            let feat_type = feat_obj.get("type").and_then(|v| v.as_str()).ok_or(
                LoadError::InvalidFeature {
                    index,
                    reason: "feature missing type".to_string(),
                },
            )?;
            if feat_type != "Feature" {
                return Err(LoadError::InvalidFeature {
                    index,
                    reason: format!("unexpected feature type: {feat_type}"),
                });
            }

            let geometry_val = match feat_obj.get("geometry") {
                None | Some(Value::Null) => {
                    dropped += 1;
                    continue;
                }
                Some(v) => v,
            };
            let geometry = parse_geometry(geometry_val, transform)
                .map_err(|reason| LoadError::InvalidFeature { index, reason })?;

            let properties = feat_obj.get("properties").and_then(|v| v.as_object());
            let name = properties
                .and_then(|props| feature_name(props, &options.name_field))
                .ok_or_else(|| LoadError::InvalidFeature {
                    index,
                    reason: format!("feature has no '{}' property", options.name_field),
                })?;

            let existing = by_name.get(&name).copied();
            match existing {
                Some(i) => {
                    let existing = &mut countries[i];
                    let mut polygons = std::mem::take(&mut existing.geometry.0);
                    polygons.extend(geometry.0);
                    *existing = Country::new(name, MultiPolygon::new(polygons));
                }
                None => {
                    by_name.insert(name.clone(), countries.len());
                    countries.push(Country::new(name, geometry));
                }
            }
        }

        if dropped > 0 {
            debug!("dropped {dropped} boundary features with null geometry");
        }

        Ok(Self {
            crs: Crs::Wgs84,
            countries,
        })
    }
}

/// Legacy GeoJSON (2008) named CRS member.
fn declared_crs(obj: &Map<String, Value>) -> Option<Crs> {
    obj.get("crs")?
        .get("properties")?
        .get("name")?
        .as_str()
        .map(Crs::parse)
}

fn feature_name(props: &Map<String, Value>, field: &str) -> Option<String> {
    std::iter::once(field)
        .chain(FALLBACK_NAME_FIELDS)
        .find_map(|key| match props.get(key)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        })
}

fn parse_geometry(value: &Value, transform: Transform) -> Result<MultiPolygon<f64>, String> {
    let obj = value
        .as_object()
        .ok_or("geometry must be an object".to_string())?;
    let ty = obj
        .get("type")
        .and_then(|v| v.as_str())
        .ok_or("geometry missing type".to_string())?;

    let coords = obj
        .get("coordinates")
        .ok_or("geometry missing coordinates".to_string())?;

    match ty {
        "Polygon" => Ok(MultiPolygon::new(vec![parse_polygon(coords, transform)?])),
        "MultiPolygon" => parse_multi_polygon(coords, transform),
        other => Err(format!("unsupported boundary geometry type: {other}")),
    }
}

fn parse_coord(coords: &Value, transform: Transform) -> Result<Coord<f64>, String> {
    let arr = coords
        .as_array()
        .ok_or("position must be an array".to_string())?;
    if arr.len() < 2 {
        return Err("position must have [x, y]".to_string());
    }
    let x = arr[0].as_f64().ok_or("x must be a number".to_string())?;
    let y = arr[1].as_f64().ok_or("y must be a number".to_string())?;
    let (x, y) = transform(x, y);
    Ok(Coord { x, y })
}

fn parse_ring(coords: &Value, transform: Transform) -> Result<LineString<f64>, String> {
    let arr = coords
        .as_array()
        .ok_or("ring must be an array".to_string())?;
    let mut out = Vec::with_capacity(arr.len());
    for item in arr {
        out.push(parse_coord(item, transform)?);
    }
    Ok(LineString::new(out))
}

fn parse_polygon(coords: &Value, transform: Transform) -> Result<Polygon<f64>, String> {
    let rings = coords
        .as_array()
        .ok_or("Polygon coordinates must be an array of rings".to_string())?;
    let mut iter = rings.iter();
    let exterior = match iter.next() {
        Some(ring) => parse_ring(ring, transform)?,
        None => return Err("Polygon has no exterior ring".to_string()),
    };
    let mut interiors = Vec::with_capacity(rings.len().saturating_sub(1));
    for ring in iter {
        interiors.push(parse_ring(ring, transform)?);
    }
    Ok(Polygon::new(exterior, interiors))
}

fn parse_multi_polygon(coords: &Value, transform: Transform) -> Result<MultiPolygon<f64>, String> {
    let polys = coords
        .as_array()
        .ok_or("MultiPolygon coordinates must be an array of polygons".to_string())?;
    let mut out = Vec::with_capacity(polys.len());
    for poly in polys {
        out.push(parse_polygon(poly, transform)?);
    }
    Ok(MultiPolygon::new(out))
}
