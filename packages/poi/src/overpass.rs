//! `OpenStreetMap` features from an Overpass API interpreter.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use async_trait::async_trait;
use catchment_poi_models::{OsmFeature, PoiSelection};
use geo::{Coord, Geometry, LineString, MultiLineString, MultiPolygon, Point, Polygon};
use serde::Deserialize;

use crate::{FeaturesProvider, PoiError};

/// Default public Overpass interpreter.
pub const DEFAULT_INTERPRETER_URL: &str = "https://overpass-api.de/api/interpreter";

/// Server-side query timeout, in seconds.
const QUERY_TIMEOUT_SECS: u32 = 90;

#[derive(Deserialize)]
struct OverpassResponse {
    elements: Vec<OverpassElement>,
}

#[derive(Deserialize)]
struct OverpassElement {
    #[serde(rename = "type")]
    element_type: String,
    id: i64,
    lat: Option<f64>,
    lon: Option<f64>,
    /// Way vertices. Entries are null for nodes the server could not
    /// resolve.
    #[serde(default)]
    geometry: Vec<Option<LatLon>>,
    #[serde(default)]
    members: Vec<OverpassMember>,
    bounds: Option<OverpassBounds>,
    tags: Option<BTreeMap<String, String>>,
}

#[derive(Deserialize)]
struct LatLon {
    lat: f64,
    lon: f64,
}

#[derive(Deserialize)]
struct OverpassMember {
    #[serde(default)]
    role: String,
    #[serde(default)]
    geometry: Vec<Option<LatLon>>,
}

#[derive(Deserialize)]
struct OverpassBounds {
    minlat: f64,
    minlon: f64,
    maxlat: f64,
    maxlon: f64,
}

impl OverpassBounds {
    fn center(&self) -> Point<f64> {
        Point::new(
            f64::midpoint(self.minlon, self.maxlon),
            f64::midpoint(self.minlat, self.maxlat),
        )
    }
}

/// [`FeaturesProvider`] backed by an Overpass interpreter.
pub struct OverpassClient {
    client: reqwest::Client,
    interpreter_url: String,
}

impl OverpassClient {
    /// Creates a client for `interpreter_url`. Overpass operators ask for
    /// an identifying `user_agent`.
    ///
    /// # Errors
    ///
    /// Returns [`PoiError`] if the HTTP client cannot be built.
    pub fn new(interpreter_url: &str, user_agent: &str) -> Result<Self, PoiError> {
        let client = reqwest::Client::builder().user_agent(user_agent).build()?;
        Ok(Self {
            client,
            interpreter_url: interpreter_url.to_string(),
        })
    }
}

#[async_trait]
impl FeaturesProvider for OverpassClient {
    async fn features_in_polygon(
        &self,
        polygon: &MultiPolygon<f64>,
        selection: &PoiSelection,
    ) -> Result<Vec<OsmFeature>, PoiError> {
        let query = build_query(polygon, selection);
        log::info!(
            "Querying Overpass for {}={}...",
            selection.key,
            selection.values.join(",")
        );
        log::debug!("Overpass query: {query}");

        let resp = self
            .client
            .post(&self.interpreter_url)
            .form(&[("data", query)])
            .send()
            .await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            let snippet: String = body.chars().take(256).collect();
            return Err(PoiError::Conversion {
                message: format!("Overpass returned HTTP {status}: {snippet}"),
            });
        }

        let features = parse_elements(&body)?;
        log::info!("Overpass returned {} features", features.len());
        Ok(features)
    }
}

/// Builds an Overpass QL query for nodes, ways and relations inside each
/// polygon of `polygon` whose `selection.key` tag exactly matches one of
/// `selection.values`. Ways and relations are returned with their full
/// geometry.
#[must_use]
pub fn build_query(polygon: &MultiPolygon<f64>, selection: &PoiSelection) -> String {
    let key = escape_string(&selection.key);
    let values = selection
        .values
        .iter()
        .map(|v| escape_string(&escape_regex(v)))
        .collect::<Vec<_>>()
        .join("|");

    let mut query = format!("[out:json][timeout:{QUERY_TIMEOUT_SECS}];(");
    for poly in &polygon.0 {
        let _ = write!(
            query,
            "nwr[\"{key}\"~\"^({values})$\"](poly:\"{}\");",
            poly_filter(poly)
        );
    }
    query.push_str(");out geom;");
    query
}

/// `"lat lon lat lon ..."` for the exterior ring, without the closing
/// coordinate.
fn poly_filter(polygon: &geo::Polygon<f64>) -> String {
    let coords = &polygon.exterior().0;
    let open = coords.len().saturating_sub(usize::from(polygon.exterior().is_closed()));
    coords[..open]
        .iter()
        .map(|c| format!("{:.6} {:.6}", c.y, c.x))
        .collect::<Vec<_>>()
        .join(" ")
}

fn escape_string(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

fn escape_regex(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if "\\.^$|?*+()[]{}".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Parses an Overpass JSON response.
///
/// Nodes become points. Closed ways become polygons and open ways become
/// lines. Relations become the polygons of their closed `outer` members,
/// or the lines of all members when no outer ring closes on its own way.
/// Elements with no usable geometry fall back to their bounds center, or
/// are skipped.
///
/// # Errors
///
/// Returns [`PoiError`] if the body is not an Overpass JSON response.
pub fn parse_elements(body: &str) -> Result<Vec<OsmFeature>, PoiError> {
    let response: OverpassResponse = serde_json::from_str(body)?;

    Ok(response
        .elements
        .into_iter()
        .filter_map(|element| {
            let geometry = match element.element_type.as_str() {
                "node" => element
                    .lat
                    .zip(element.lon)
                    .map(|(lat, lon)| Point::new(lon, lat).into()),
                "way" => way_geometry(&element.geometry),
                "relation" => relation_geometry(&element.members),
                _ => None,
            }
            .or_else(|| element.bounds.as_ref().map(|b| b.center().into()));

            let Some(geometry) = geometry else {
                log::debug!(
                    "Skipping {} {} without coordinates",
                    element.element_type,
                    element.id
                );
                return None;
            };
            Some(OsmFeature {
                geometry,
                tags: element.tags.unwrap_or_default(),
            })
        })
        .collect())
}

fn line(coords: &[Option<LatLon>]) -> LineString<f64> {
    coords
        .iter()
        .flatten()
        .map(|c| Coord { x: c.lon, y: c.lat })
        .collect()
}

fn closed_ring(line: &LineString<f64>) -> bool {
    line.0.len() >= 4 && line.is_closed()
}

fn way_geometry(coords: &[Option<LatLon>]) -> Option<Geometry<f64>> {
    let line = line(coords);
    match line.0.len() {
        0 => None,
        1 => Some(Point::from(line.0[0]).into()),
        _ if closed_ring(&line) => Some(Polygon::new(line, vec![]).into()),
        _ => Some(line.into()),
    }
}

fn relation_geometry(members: &[OverpassMember]) -> Option<Geometry<f64>> {
    let rings: Vec<Polygon<f64>> = members
        .iter()
        .filter(|m| m.role == "outer")
        .map(|m| line(&m.geometry))
        .filter(closed_ring)
        .map(|ring| Polygon::new(ring, vec![]))
        .collect();
    if !rings.is_empty() {
        return Some(MultiPolygon(rings).into());
    }

    let lines: Vec<LineString<f64>> = members
        .iter()
        .map(|m| line(&m.geometry))
        .filter(|l| l.0.len() >= 2)
        .collect();
    (!lines.is_empty()).then(|| MultiLineString(lines).into())
}

#[cfg(test)]
mod tests {
    use geo::polygon;

    use super::*;

    #[test]
    fn builds_poly_query() {
        let polygon = MultiPolygon(vec![polygon![
            (x: -87.7, y: 41.8),
            (x: -87.6, y: 41.8),
            (x: -87.6, y: 41.9),
            (x: -87.7, y: 41.8),
        ]]);
        let selection: PoiSelection = "amenity=cafe,fast_food".parse().unwrap();

        assert_eq!(
            build_query(&polygon, &selection),
            "[out:json][timeout:90];(\
             nwr[\"amenity\"~\"^(cafe|fast_food)$\"]\
             (poly:\"41.800000 -87.700000 41.800000 -87.600000 41.900000 -87.600000\");\
             );out geom;"
        );
    }

    #[test]
    fn escapes_regex_metacharacters() {
        assert_eq!(escape_regex("a.b(c)"), "a\\.b\\(c\\)");
        assert_eq!(escape_string("say \"hi\""), "say \\\"hi\\\"");
    }

    #[test]
    fn parses_nodes_and_way_shapes() {
        let body = serde_json::json!({
            "elements": [
                {
                    "type": "node", "id": 1, "lat": 41.88, "lon": -87.63,
                    "tags": { "amenity": "cafe", "name": "Intelligentsia" }
                },
                {
                    "type": "way", "id": 2,
                    "bounds": { "minlat": 41.0, "minlon": -88.0, "maxlat": 42.0, "maxlon": -87.0 },
                    "geometry": [
                        { "lat": 41.0, "lon": -88.0 },
                        { "lat": 41.0, "lon": -87.9 },
                        { "lat": 41.1, "lon": -87.9 },
                        { "lat": 41.0, "lon": -88.0 }
                    ],
                    "tags": { "amenity": "restaurant" }
                },
                {
                    "type": "way", "id": 3,
                    "geometry": [{ "lat": 41.5, "lon": -87.5 }, null, { "lat": 41.6, "lon": -87.5 }]
                },
                { "type": "relation", "id": 4 }
            ]
        })
        .to_string();

        let features = parse_elements(&body).unwrap();
        assert_eq!(features.len(), 3);
        assert_eq!(
            features[0].geometry,
            Geometry::Point(Point::new(-87.63, 41.88))
        );
        assert_eq!(features[0].name(), Some("Intelligentsia"));
        assert!(matches!(features[1].geometry, Geometry::Polygon(_)));
        assert_eq!(features[1].name(), None);
        let Geometry::LineString(open_way) = &features[2].geometry else {
            panic!("expected a line");
        };
        assert_eq!(open_way.0.len(), 2);
    }

    #[test]
    fn polygon_centroid_differs_from_bounds_center() {
        // An L-shaped building: its centroid sits away from the bbox middle.
        let body = serde_json::json!({
            "elements": [{
                "type": "way", "id": 1,
                "bounds": { "minlat": 0.0, "minlon": 0.0, "maxlat": 2.0, "maxlon": 2.0 },
                "geometry": [
                    { "lat": 0.0, "lon": 0.0 }, { "lat": 0.0, "lon": 2.0 },
                    { "lat": 1.0, "lon": 2.0 }, { "lat": 1.0, "lon": 1.0 },
                    { "lat": 2.0, "lon": 1.0 }, { "lat": 2.0, "lon": 0.0 },
                    { "lat": 0.0, "lon": 0.0 }
                ]
            }]
        })
        .to_string();

        let features = parse_elements(&body).unwrap();
        let centroid = geo::Centroid::centroid(&features[0].geometry).unwrap();
        assert!((centroid.x() - 5.0 / 6.0).abs() < 1e-9);
        assert!((centroid.y() - 5.0 / 6.0).abs() < 1e-9);
    }

    #[test]
    fn relations_use_outer_rings_or_member_lines() {
        let ring = serde_json::json!([
            { "lat": 0.0, "lon": 0.0 }, { "lat": 0.0, "lon": 1.0 },
            { "lat": 1.0, "lon": 1.0 }, { "lat": 0.0, "lon": 0.0 }
        ]);
        let body = serde_json::json!({
            "elements": [
                {
                    "type": "relation", "id": 1,
                    "members": [
                        { "type": "way", "ref": 10, "role": "outer", "geometry": ring },
                        { "type": "way", "ref": 11, "role": "inner", "geometry": ring }
                    ]
                },
                {
                    "type": "relation", "id": 2,
                    "members": [
                        { "type": "way", "ref": 20, "role": "outer",
                          "geometry": [{ "lat": 0.0, "lon": 0.0 }, { "lat": 0.0, "lon": 1.0 }] },
                        { "type": "way", "ref": 21, "role": "outer",
                          "geometry": [{ "lat": 0.0, "lon": 1.0 }, { "lat": 1.0, "lon": 1.0 }] }
                    ]
                },
                {
                    "type": "relation", "id": 3,
                    "bounds": { "minlat": 4.0, "minlon": 6.0, "maxlat": 6.0, "maxlon": 8.0 }
                }
            ]
        })
        .to_string();

        let features = parse_elements(&body).unwrap();
        let Geometry::MultiPolygon(outer) = &features[0].geometry else {
            panic!("expected polygons");
        };
        assert_eq!(outer.0.len(), 1);
        let Geometry::MultiLineString(split) = &features[1].geometry else {
            panic!("expected lines");
        };
        assert_eq!(split.0.len(), 2);
        assert_eq!(features[2].geometry, Geometry::Point(Point::new(7.0, 5.0)));
    }

    #[test]
    fn rejects_non_json() {
        assert!(parse_elements("<html>rate limited</html>").is_err());
    }
}
