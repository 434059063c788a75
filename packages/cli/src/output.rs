//! JSON report printed by `catchment generate`.

use catchment_census_models::VariableSummary;
use catchment_models::{CatchmentSpec, IsochroneProperties, Location};
use catchment_poi_models::{CategoryCount, NameRanking, PoiMetric, PoiSelection, PoiStatus};
use geo::MultiPolygon;
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatchmentReport {
    pub location: Location,
    pub spec: CatchmentSpec,
    pub year: u16,
    pub area_sq_miles: f64,
    pub total_population: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iso_properties: Option<IsochroneProperties>,
    pub census_tracts: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub demographics: Vec<VariableSummary>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub points_of_interest: Vec<PoiReport>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoiReport {
    pub selection: PoiSelection,
    pub status: PoiStatus,
    pub categories: Vec<CategoryCount>,
    pub ranked_by: PoiMetric,
    pub top_locations: Vec<NameRanking>,
}

/// Wraps the report as a single-feature GeoJSON collection, with the
/// catchment polygon as geometry and the report as properties.
///
/// # Errors
///
/// Returns an error if the report does not serialize to a JSON object.
pub fn to_feature_collection(
    geometry: &MultiPolygon<f64>,
    report: &CatchmentReport,
) -> Result<geojson::FeatureCollection, serde_json::Error> {
    let properties = match serde_json::to_value(report)? {
        serde_json::Value::Object(map) => Some(map),
        _ => None,
    };

    let feature = geojson::Feature {
        bbox: None,
        geometry: Some(geojson::Geometry::new(geojson::Value::from(geometry))),
        id: None,
        properties,
        foreign_members: None,
    };

    Ok(geojson::FeatureCollection {
        bbox: None,
        features: vec![feature],
        foreign_members: None,
    })
}

#[cfg(test)]
mod tests {
    use geo::polygon;

    use super::*;

    #[test]
    fn report_becomes_one_feature() {
        let geometry = MultiPolygon(vec![polygon![
            (x: -87.7, y: 41.8),
            (x: -87.6, y: 41.8),
            (x: -87.6, y: 41.9),
            (x: -87.7, y: 41.8),
        ]]);
        let report = CatchmentReport {
            location: Location::new(41.85, -87.65, "Chicago, IL"),
            spec: CatchmentSpec::Distance { miles: 5.0 },
            year: 2022,
            area_sq_miles: 12.5,
            total_population: 1000.0,
            iso_properties: None,
            census_tracts: 3,
            demographics: Vec::new(),
            points_of_interest: Vec::new(),
        };

        let collection = to_feature_collection(&geometry, &report).unwrap();
        assert_eq!(collection.features.len(), 1);

        let feature = &collection.features[0];
        let properties = feature.properties.as_ref().unwrap();
        assert_eq!(properties["areaSqMiles"], serde_json::json!(12.5));
        assert_eq!(properties["censusTracts"], serde_json::json!(3));
        assert!(!properties.contains_key("demographics"));
        assert!(matches!(
            feature.geometry.as_ref().unwrap().value,
            geojson::Value::MultiPolygon(_)
        ));
    }
}
