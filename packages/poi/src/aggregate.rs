//! Distinct-location counts and rankings.
//!
//! A single store can be mapped as several adjoining fragments that share
//! a name, so counts are of distinct names rather than feature instances.

use std::collections::BTreeSet;

use catchment_poi_models::{
    CategoryCount, DENSITY_PER_PERSONS, METERS_PER_MILE, NameRanking, OsmFeature, PoiAddress,
    PoiMetric, PoiOutcome, PoiRecord, PoiSelection, PoiStatus, TOP_LOCATIONS_LIMIT,
};
use geo::{Centroid, Distance, Geodesic, MultiPolygon, Point};

use crate::FeaturesProvider;

/// Looks up the features for `selection` inside `catchment`.
///
/// Never fails: an empty response yields [`PoiStatus::NoData`] and a
/// provider error yields [`PoiStatus::Failed`] with the cause, both with
/// no records.
pub async fn find_pois(
    provider: &dyn FeaturesProvider,
    catchment: &MultiPolygon<f64>,
    reference: Point<f64>,
    selection: &PoiSelection,
) -> PoiOutcome {
    let features = match provider.features_in_polygon(catchment, selection).await {
        Ok(features) => features,
        Err(e) => {
            log::warn!("POI lookup for {} failed: {e}", selection.key);
            return PoiOutcome {
                selection: selection.clone(),
                records: Vec::new(),
                status: PoiStatus::Failed {
                    cause: e.to_string(),
                },
            };
        }
    };

    let records = build_records(features, selection, reference);

    let status = if records.is_empty() {
        log::warn!(
            "No data returned for {}={} within the catchment area",
            selection.key,
            selection.values.join(",")
        );
        PoiStatus::NoData
    } else {
        PoiStatus::Found
    };

    PoiOutcome {
        selection: selection.clone(),
        records,
        status,
    }
}

/// Turns raw features into records, dropping unnamed features and
/// measuring each one's distance from `reference` in miles.
#[must_use]
pub fn build_records(
    features: Vec<OsmFeature>,
    selection: &PoiSelection,
    reference: Point<f64>,
) -> Vec<PoiRecord> {
    let total = features.len();

    let records: Vec<PoiRecord> = features
        .into_iter()
        .filter_map(|feature| {
            let name = feature.name()?.to_string();
            let category_value = feature.tags.get(&selection.key)?.clone();
            let centroid = feature.geometry.centroid()?;

            Some(PoiRecord {
                category_key: selection.key.clone(),
                category_value,
                name,
                address: PoiAddress::from_tags(&feature.tags),
                distance_miles: Geodesic.distance(centroid, reference) / METERS_PER_MILE,
                geometry: feature.geometry,
            })
        })
        .collect();

    if records.len() < total {
        log::debug!("Dropped {} unnamed features", total - records.len());
    }

    records
}

/// Locations per 10,000 persons, or `None` for an unpopulated catchment.
#[must_use]
pub fn density(count: usize, total_population: f64) -> Option<f64> {
    #[allow(clippy::cast_precision_loss)]
    let count = count as f64;
    (total_population > 0.0).then(|| count / total_population * DENSITY_PER_PERSONS)
}

/// Distinct named locations per category value, most first. Ties keep the
/// order in which categories first appear.
#[must_use]
pub fn category_counts(records: &[PoiRecord], total_population: f64) -> Vec<CategoryCount> {
    let mut categories: Vec<(&str, BTreeSet<&str>)> = Vec::new();

    for record in records {
        let position = if let Some(i) = categories
            .iter()
            .position(|(value, _)| *value == record.category_value)
        {
            i
        } else {
            categories.push((record.category_value.as_str(), BTreeSet::new()));
            categories.len() - 1
        };
        categories[position].1.insert(record.name.as_str());
    }

    let mut counts: Vec<CategoryCount> = categories
        .into_iter()
        .map(|(value, names)| CategoryCount {
            category_value: value.to_string(),
            distinct_locations: names.len(),
            per_10k_persons: density(names.len(), total_population),
        })
        .collect();

    counts.sort_by(|a, b| b.distinct_locations.cmp(&a.distinct_locations));
    counts
}

/// The top names by `metric`.
///
/// Records are grouped by name: `count` is the number of instances and
/// `min_distance_miles` the closest one. Count and per-capita rankings put
/// the largest first, distance rankings the closest first. Ties keep the
/// order in which names first appear.
#[must_use]
pub fn top_locations(
    records: &[PoiRecord],
    metric: PoiMetric,
    total_population: f64,
) -> Vec<NameRanking> {
    let mut groups: Vec<(&str, usize, f64)> = Vec::new();

    for record in records {
        if let Some(group) = groups.iter_mut().find(|(name, ..)| *name == record.name) {
            group.1 += 1;
            group.2 = group.2.min(record.distance_miles);
        } else {
            groups.push((record.name.as_str(), 1, record.distance_miles));
        }
    }

    match metric {
        PoiMetric::Count | PoiMetric::PerCapita => {
            groups.sort_by(|a, b| b.1.cmp(&a.1));
        }
        PoiMetric::Distance => {
            groups.sort_by(|a, b| a.2.total_cmp(&b.2));
        }
    }

    groups
        .into_iter()
        .take(TOP_LOCATIONS_LIMIT)
        .map(|(name, count, min_distance_miles)| {
            #[allow(clippy::cast_precision_loss)]
            let value = match metric {
                PoiMetric::Count => Some(count as f64),
                PoiMetric::PerCapita => density(count, total_population),
                PoiMetric::Distance => Some(min_distance_miles),
            };
            NameRanking {
                name: name.to_string(),
                count,
                min_distance_miles,
                metric: value,
            }
        })
        .collect()
}
