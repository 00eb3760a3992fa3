use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use geo::{BooleanOps, MapCoords, MultiPolygon, Simplify};
use thiserror::Error;
use tracing::warn;

use frame_core::{pad_key, KeyTable};

mod reproject;

pub use reproject::utm33_to_lonlat;

/// Attribute holding the sub-district key in the source shapefile.
pub const KEY_FIELD: &str = "SCHLUESSEL";

#[derive(Debug, Error)]
pub enum GeoError {
    #[error("failed to read shapefile {path}: {message}")]
    Shapefile { path: PathBuf, message: String },
    #[error("shapefile record {index} has no usable {field} attribute")]
    MissingKey { index: usize, field: &'static str },
    #[error("sub-district {key} has an unusable polygon shape")]
    BadShape { key: String },
}

/// One sub-district polygon, reprojected to lon/lat.
#[derive(Debug, Clone, PartialEq)]
pub struct SubDistrictShape {
    pub key_2: String,
    pub geometry: MultiPolygon<f64>,
}

/// One dissolved district polygon.
#[derive(Debug, Clone, PartialEq)]
pub struct DistrictShape {
    pub key_1: String,
    pub geometry: MultiPolygon<f64>,
}

/// Read sub-district polygons from the EPSG:25833 shapefile, reproject
/// coordinates to geographic lon/lat, and re-pad the key attribute.
pub fn load_subdistricts(path: &Path) -> Result<Vec<SubDistrictShape>, GeoError> {
    let shapes = shapefile::read_as::<_, shapefile::Polygon, shapefile::dbase::Record>(path)
        .map_err(|e| GeoError::Shapefile {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    let mut out = Vec::with_capacity(shapes.len());
    for (index, (polygon, record)) in shapes.into_iter().enumerate() {
        let key_2 = match record.get(KEY_FIELD) {
            Some(shapefile::dbase::FieldValue::Character(Some(s))) => pad_key(s.trim()),
            Some(shapefile::dbase::FieldValue::Numeric(Some(n))) => pad_key(*n as i64),
            _ => {
                return Err(GeoError::MissingKey {
                    index,
                    field: KEY_FIELD,
                })
            }
        };
        let geometry: MultiPolygon<f64> =
            polygon.try_into().map_err(|_| GeoError::BadShape {
                key: key_2.clone(),
            })?;
        let geometry = geometry.map_coords(|c| {
            let (lon, lat) = utm33_to_lonlat(c.x, c.y);
            geo::Coord { x: lon, y: lat }
        });
        out.push(SubDistrictShape { key_2, geometry });
    }
    Ok(out)
}

/// Join sub-districts to their district key and union each group into one
/// polygon per district. Sub-districts absent from the key table are dropped
/// and logged — silent data loss here would be invisible on the map.
pub fn dissolve(subdistricts: Vec<SubDistrictShape>, keys: &KeyTable) -> Vec<DistrictShape> {
    let mut groups: BTreeMap<String, Vec<MultiPolygon<f64>>> = BTreeMap::new();
    for sub in subdistricts {
        match keys.district_for(&sub.key_2) {
            Some(key_1) => groups
                .entry(key_1.to_string())
                .or_default()
                .push(sub.geometry),
            None => {
                warn!(key_2 = %sub.key_2, "sub-district has no district mapping, dropping");
            }
        }
    }

    groups
        .into_iter()
        .map(|(key_1, mut members)| {
            let mut geometry = members.remove(0);
            for other in &members {
                geometry = geometry.union(other);
            }
            DistrictShape { key_1, geometry }
        })
        .collect()
}

/// Simplify every district polygon with the given tolerance (in the
/// coordinate units of the geometry). Lossy and one-directional; trades
/// vertex count for render speed.
pub fn simplify_districts(districts: &mut [DistrictShape], tolerance: f64) {
    for district in districts.iter_mut() {
        district.geometry = district.geometry.simplify(&tolerance);
    }
}

/// GeoJSON feature collection with `key_1` as the feature id, which is what
/// the choropleth trace joins its `locations` against.
pub fn district_feature_collection(districts: &[DistrictShape]) -> geojson::FeatureCollection {
    let features = districts
        .iter()
        .map(|d| {
            let mut properties = serde_json::Map::new();
            properties.insert(
                "key_1".to_string(),
                serde_json::Value::String(d.key_1.clone()),
            );
            geojson::Feature {
                bbox: None,
                geometry: Some(geojson::Geometry::new(geojson::Value::from(&d.geometry))),
                id: Some(geojson::feature::Id::String(d.key_1.clone())),
                properties: Some(properties),
                foreign_members: None,
            }
        })
        .collect();

    geojson::FeatureCollection {
        bbox: None,
        features,
        foreign_members: None,
    }
}
