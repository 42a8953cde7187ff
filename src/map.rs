//! Vector world map asset
//!
//! A GeoJSON FeatureCollection of country shapes. Each feature becomes a
//! region addressable by its id and by its name/label/code properties. A
//! `viewBox` foreign member (`[min_x, min_y, w, h]` or `"0 0 w h"`) declares
//! the map's logical size; without one the size is derived as 360×180.

use crate::geo::{lat_lon_to_xy, GeoPoint, ViewBox};
use serde_json::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Properties whose string values address a region.
const LABEL_KEYS: [&str; 16] = [
    "name", "NAME", "name_long", "NAME_LONG", "admin", "ADMIN", "sovereignt", "SOVEREIGNT",
    "label", "class", "iso_a2", "ISO_A2", "iso_a3", "ISO_A3", "adm0_a3", "ADM0_A3",
];

#[derive(Debug, Error)]
pub enum MapError {
    #[error("cannot read map asset {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
    #[error("cannot fetch map asset: {0}")]
    Http(#[from] Box<ureq::Error>),
    #[error("map asset is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("map asset is not a GeoJSON FeatureCollection")]
    NotFeatureCollection,
    #[error("map asset contains no drawable regions")]
    Empty,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegionId(pub usize);

/// One drawable region (a country or a territory of one).
#[derive(Clone, Debug)]
pub struct Region {
    pub id: RegionId,
    /// Display name, the first label found.
    pub name: String,
    /// Every id/name/code this region answers to, lowercased.
    pub labels: Vec<String>,
    /// Outer rings in map space.
    pub rings: Vec<Vec<GeoPoint>>,
}

#[derive(Clone, Debug)]
pub struct MapAsset {
    view_box: ViewBox,
    regions: Vec<Region>,
}

impl MapAsset {
    pub fn load(path: &Path) -> Result<Self, MapError> {
        let content = fs::read_to_string(path).map_err(|source| MapError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    pub fn fetch(url: &str, timeout: Duration) -> Result<Self, MapError> {
        let body = ureq::get(url)
            .timeout(timeout)
            .call()
            .map_err(Box::new)?
            .into_string()
            .map_err(|source| MapError::Io {
                path: PathBuf::from(url),
                source,
            })?;
        Self::parse(&body)
    }

    pub fn parse(content: &str) -> Result<Self, MapError> {
        let root: Value = serde_json::from_str(content)?;
        if root.get("type").and_then(Value::as_str) != Some("FeatureCollection") {
            return Err(MapError::NotFeatureCollection);
        }
        let features = root
            .get("features")
            .and_then(Value::as_array)
            .ok_or(MapError::NotFeatureCollection)?;

        let view_box = root.get("viewBox").and_then(parse_view_box).unwrap_or_default();

        let mut regions = Vec::new();
        for feature in features {
            let rings = feature
                .get("geometry")
                .map(|g| geometry_rings(g, view_box))
                .unwrap_or_default();
            if rings.is_empty() {
                continue;
            }
            let labels = feature_labels(feature);
            let name = labels.first().cloned().unwrap_or_default();
            regions.push(Region {
                id: RegionId(regions.len()),
                name,
                labels: labels.iter().map(|l| l.to_lowercase()).collect(),
                rings,
            });
        }

        if regions.is_empty() {
            return Err(MapError::Empty);
        }
        Ok(Self { view_box, regions })
    }

    pub fn view_box(&self) -> ViewBox {
        self.view_box
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn region_name(&self, id: RegionId) -> Option<&str> {
        self.regions.get(id.0).map(|r| r.name.as_str())
    }
}

/// Default asset location: `<config dir>/threatmap/world.geojson`.
pub fn default_asset_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("threatmap")
        .join("world.geojson")
}

fn parse_view_box(v: &Value) -> Option<ViewBox> {
    let nums: Vec<f64> = match v {
        Value::Array(items) => items.iter().filter_map(Value::as_f64).collect(),
        Value::String(s) => s
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|p| !p.is_empty())
            .filter_map(|p| p.parse().ok())
            .collect(),
        _ => return None,
    };
    match nums.as_slice() {
        [_, _, w, h] if *w > 0.0 && *h > 0.0 => Some(ViewBox { width: *w, height: *h }),
        _ => None,
    }
}

fn feature_labels(feature: &Value) -> Vec<String> {
    let mut labels = Vec::new();
    match feature.get("id") {
        Some(Value::String(s)) if !s.trim().is_empty() => labels.push(s.trim().to_string()),
        Some(Value::Number(n)) => labels.push(n.to_string()),
        _ => {}
    }
    if let Some(props) = feature.get("properties").and_then(Value::as_object) {
        for key in LABEL_KEYS {
            if let Some(s) = props.get(key).and_then(Value::as_str) {
                let s = s.trim();
                // Natural Earth uses "-99" for missing codes
                if !s.is_empty() && s != "-99" && !labels.iter().any(|l: &String| l.eq_ignore_ascii_case(s)) {
                    labels.push(s.to_string());
                }
            }
        }
    }
    // Prefer a human name over a code for display
    if let Some(pos) = labels.iter().position(|l| l.chars().count() > 3) {
        labels.swap(0, pos);
    }
    labels
}

fn geometry_rings(geometry: &Value, view_box: ViewBox) -> Vec<Vec<GeoPoint>> {
    let coords = geometry.get("coordinates");
    match geometry.get("type").and_then(Value::as_str) {
        Some("Polygon") => coords
            .and_then(|c| c.as_array())
            .and_then(|rings| rings.first())
            .and_then(|ring| ring_points(ring, view_box))
            .into_iter()
            .collect(),
        Some("MultiPolygon") => coords
            .and_then(|c| c.as_array())
            .map(|polys| {
                polys
                    .iter()
                    .filter_map(|poly| poly.as_array()?.first())
                    .filter_map(|ring| ring_points(ring, view_box))
                    .collect()
            })
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// GeoJSON ring `[[lon, lat], ...]` projected into map space.
fn ring_points(ring: &Value, view_box: ViewBox) -> Option<Vec<GeoPoint>> {
    let points: Vec<GeoPoint> = ring
        .as_array()?
        .iter()
        .filter_map(|pt| {
            let arr = pt.as_array()?;
            let lon = arr.first()?.as_f64()?;
            let lat = arr.get(1)?.as_f64()?;
            Some(lat_lon_to_xy(lat, lon, view_box))
        })
        .collect();
    (points.len() >= 3).then_some(points)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Small asset: France as two territories, Germany, and a feature with
    /// only an ISO code.
    pub(crate) const SAMPLE: &str = r#"{
        "type": "FeatureCollection",
        "viewBox": [0, 0, 1000, 500],
        "features": [
            {"type": "Feature", "id": "FRA", "properties": {"name": "France", "iso_a2": "FR"},
             "geometry": {"type": "MultiPolygon", "coordinates": [
                [[[-4.0, 48.0], [8.0, 49.0], [7.0, 43.0], [-1.0, 43.5], [-4.0, 48.0]]],
                [[[8.5, 42.5], [9.5, 42.5], [9.3, 41.4], [8.5, 42.5]]]
             ]}},
            {"type": "Feature", "id": "GUF", "properties": {"name": "French Guiana", "iso_a2": "GF"},
             "geometry": {"type": "Polygon", "coordinates": [[[-54.0, 5.5], [-51.6, 4.2], [-52.5, 2.2], [-54.0, 5.5]]]}},
            {"type": "Feature", "id": "DEU", "properties": {"name": "Germany", "iso_a2": "DE"},
             "geometry": {"type": "Polygon", "coordinates": [[[6.0, 51.0], [14.0, 54.0], [14.5, 51.0], [10.0, 47.5], [6.0, 51.0]]]}},
            {"type": "Feature", "properties": {"ISO_A3": "USA"},
             "geometry": {"type": "Polygon", "coordinates": [[[-124.0, 48.0], [-67.0, 45.0], [-80.0, 25.0], [-117.0, 32.0], [-124.0, 48.0]]]}},
            {"type": "Feature", "id": "XXX", "properties": {"name": "No Geometry"}, "geometry": null}
        ]
    }"#;

    #[test]
    fn parses_regions_and_view_box() {
        let asset = MapAsset::parse(SAMPLE).unwrap();
        assert_eq!(asset.view_box(), ViewBox { width: 1000.0, height: 500.0 });
        assert_eq!(asset.regions().len(), 4);

        let france = &asset.regions()[0];
        assert_eq!(france.name, "France");
        assert_eq!(france.rings.len(), 2);
        assert!(france.labels.contains(&"fra".to_string()));
        assert!(france.labels.contains(&"fr".to_string()));
        assert_eq!(asset.region_name(RegionId(2)), Some("Germany"));
        assert_eq!(asset.region_name(RegionId(9)), None);
    }

    #[test]
    fn rings_are_projected() {
        let asset = MapAsset::parse(SAMPLE).unwrap();
        let germany = &asset.regions()[2];
        let first = germany.rings[0][0];
        let expected = lat_lon_to_xy(51.0, 6.0, asset.view_box());
        assert!((first.x - expected.x).abs() < 1e-9);
        assert!((first.y - expected.y).abs() < 1e-9);
    }

    #[test]
    fn view_box_string_and_derived_default() {
        assert_eq!(
            parse_view_box(&Value::String("0 0 2000 1000".into())),
            Some(ViewBox { width: 2000.0, height: 1000.0 })
        );
        let derived = MapAsset::parse(
            r#"{"type":"FeatureCollection","features":[{"type":"Feature","properties":{"name":"Box"},
            "geometry":{"type":"Polygon","coordinates":[[[0,0],[10,0],[10,10],[0,0]]]}}]}"#,
        )
        .unwrap();
        assert_eq!(derived.view_box(), ViewBox::default());
    }

    #[test]
    fn rejects_non_collections_and_empty_assets() {
        assert!(matches!(MapAsset::parse(r#"{"type":"Feature"}"#), Err(MapError::NotFeatureCollection)));
        assert!(matches!(
            MapAsset::parse(r#"{"type":"FeatureCollection","features":[]}"#),
            Err(MapError::Empty)
        ));
        assert!(matches!(MapAsset::parse("<svg/>"), Err(MapError::Json(_))));
    }

    #[test]
    fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = MapAsset::load(&dir.path().join("absent.geojson")).unwrap_err();
        assert!(matches!(err, MapError::Io { .. }));
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("world.geojson");
        std::fs::write(&path, SAMPLE).unwrap();
        let asset = MapAsset::load(&path).unwrap();
        assert_eq!(asset.regions().len(), 4);
    }
}
