//! GeoJSON loading for region polygons.

use super::region::{RegionFeature, RegionSource};
use crate::error::{Result, TallyError};
use geo::Coord;
use geojson::{Feature, GeoJson, Value, feature::Id};

/// Parses a GeoJSON document into region features.
///
/// Accepts a `FeatureCollection` or a single `Feature`. The region id is read
/// from `id_property`, falling back to the feature's own `id`. Each polygon
/// of a `MultiPolygon` becomes its own [`RegionFeature`] sharing that id, so
/// counts for the parts add up under one key. Features without an id or with
/// non-polygonal geometry are skipped.
///
/// # Examples
///
/// ```
/// use geotally::compute::geojson::regions_from_geojson;
///
/// let doc = r#"{
///   "type": "FeatureCollection",
///   "features": [{
///     "type": "Feature",
///     "properties": { "zip": "87102" },
///     "geometry": {
///       "type": "Polygon",
///       "coordinates": [[[0, 0], [0, 10], [10, 10], [10, 0], [0, 0]]]
///     }
///   }]
/// }"#;
/// let regions = regions_from_geojson(doc, "zip").unwrap();
/// assert_eq!(regions.len(), 1);
/// assert_eq!(regions[0].id, "87102");
/// ```
pub fn regions_from_geojson(text: &str, id_property: &str) -> Result<Vec<RegionFeature>> {
    let parsed: GeoJson = text
        .parse()
        .map_err(|e| TallyError::GeoJson(format!("Failed to parse GeoJSON: {}", e)))?;

    let features = match parsed {
        GeoJson::FeatureCollection(collection) => collection.features,
        GeoJson::Feature(feature) => vec![feature],
        GeoJson::Geometry(_) => {
            return Err(TallyError::GeoJson(
                "Expected a Feature or FeatureCollection, got a bare geometry".to_string(),
            ));
        }
    };

    let mut regions = Vec::with_capacity(features.len());
    let mut skipped = 0usize;

    for (idx, feature) in features.iter().enumerate() {
        let Some(id) = region_id(feature, id_property) else {
            log::warn!("Feature at index {} has no '{}' id, skipping", idx, id_property);
            skipped += 1;
            continue;
        };

        match feature.geometry.as_ref().map(|g| &g.value) {
            Some(Value::Polygon(rings)) => regions.push(RegionFeature::new(id, to_rings(rings))),
            Some(Value::MultiPolygon(polygons)) => {
                for rings in polygons {
                    regions.push(RegionFeature::new(id.clone(), to_rings(rings)));
                }
            }
            _ => {
                log::warn!("Region {} has no polygon geometry, skipping", id);
                skipped += 1;
            }
        }
    }

    if skipped > 0 {
        log::warn!("Skipped {} GeoJSON features", skipped);
    }

    Ok(regions)
}

fn region_id(feature: &Feature, id_property: &str) -> Option<String> {
    let from_property = feature
        .properties
        .as_ref()
        .and_then(|props| props.get(id_property))
        .and_then(|value| match value {
            serde_json::Value::String(s) => Some(s.clone()),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        });

    from_property.or_else(|| {
        feature.id.as_ref().map(|id| match id {
            Id::String(s) => s.clone(),
            Id::Number(n) => n.to_string(),
        })
    })
}

fn to_rings(rings: &[Vec<Vec<f64>>]) -> Vec<Vec<Coord>> {
    rings
        .iter()
        .map(|ring| {
            ring.iter()
                .filter(|position| position.len() >= 2)
                .map(|position| Coord {
                    x: position[0],
                    y: position[1],
                })
                .collect()
        })
        .collect()
}

/// In-memory GeoJSON document acting as a [`RegionSource`].
///
/// Stands in for the network fetch when the document is already at hand.
#[derive(Debug, Clone)]
pub struct GeoJsonSource {
    text: String,
    id_property: String,
}

impl GeoJsonSource {
    pub fn new(text: impl Into<String>, id_property: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            id_property: id_property.into(),
        }
    }
}

impl RegionSource for GeoJsonSource {
    fn load_regions(&self) -> Result<Vec<RegionFeature>> {
        regions_from_geojson(&self.text, &self.id_property)
    }
}
