//! Tract coverage computation.
//!
//! Coverage is the share of a tract's area that lies inside the catchment,
//! measured as a ratio of planar areas in longitude/latitude. Population
//! is assumed uniform within a tract, so a tract's counts scale by its
//! coverage.

use std::collections::BTreeSet;

use catchment_geography_models::{StateBoundary, TractBoundary, TractRecord};
use geo::{Area, BooleanOps, Intersects, MultiPolygon};

use crate::index::BoundaryIndex;
use crate::{BoundaryProvider, GeoError};

/// Which overlapping tracts are kept.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum CoveragePolicy {
    /// Keep every tract with a non-empty intersection.
    #[default]
    AnyOverlap,
    /// Keep tracts whose coverage is strictly greater than the fraction.
    MinimumFraction(f64),
}

impl CoveragePolicy {
    #[must_use]
    pub fn admits(self, coverage: f64) -> bool {
        match self {
            Self::AnyOverlap => coverage > 0.0,
            Self::MinimumFraction(minimum) => coverage > minimum,
        }
    }
}

/// FIPS codes of the states whose boundaries intersect `catchment`, in
/// provider order.
#[must_use]
pub fn find_intersecting_states(
    catchment: &MultiPolygon<f64>,
    states: &[StateBoundary],
) -> Vec<String> {
    let index = BoundaryIndex::new(states.iter().map(|s| &s.geometry));

    index
        .candidates(catchment)
        .into_iter()
        .map(|i| &states[i])
        .filter(|state| state.geometry.intersects(catchment))
        .map(|state| state.geoid.clone())
        .collect()
}

/// Clips `tracts` to `catchment` and computes each tract's coverage.
///
/// Tracts with no land area (`ALAND == 0`), an empty intersection, or a
/// coverage the policy rejects are dropped. Each record's geometry is the
/// intersection. GEOIDs are unique: later duplicates are ignored.
#[must_use]
pub fn clip_tracts(
    catchment: &MultiPolygon<f64>,
    tracts: &[TractBoundary],
    policy: CoveragePolicy,
) -> Vec<TractRecord> {
    let index = BoundaryIndex::new(tracts.iter().map(|t| &t.geometry));
    let mut seen = BTreeSet::new();
    let mut records = Vec::new();

    for tract in index.candidates(catchment).into_iter().map(|i| &tracts[i]) {
        if tract.aland <= 0.0 || seen.contains(&tract.geoid) {
            continue;
        }

        let tract_area = tract.geometry.unsigned_area();
        if tract_area <= 0.0 || !tract.geometry.intersects(catchment) {
            continue;
        }

        let intersection = tract.geometry.intersection(catchment);
        if intersection.0.is_empty() {
            continue;
        }

        let coverage = (intersection.unsigned_area() / tract_area).clamp(0.0, 1.0);
        if !policy.admits(coverage) {
            continue;
        }

        seen.insert(tract.geoid.clone());
        records.push(TractRecord {
            geoid: tract.geoid.clone(),
            geometry: intersection,
            coverage_percentage: coverage,
            aland: tract.aland,
        });
    }

    records
}

/// Finds every tract overlapping `catchment` for census vintage `year`.
///
/// Only the tract layers of states that intersect the catchment are
/// requested. A catchment touching no state yields an empty set.
///
/// # Errors
///
/// Returns [`GeoError`] if the boundary provider fails.
pub async fn overlapping_tracts(
    provider: &dyn BoundaryProvider,
    catchment: &MultiPolygon<f64>,
    year: u16,
    policy: CoveragePolicy,
) -> Result<Vec<TractRecord>, GeoError> {
    let states = provider.state_boundaries(year).await?;
    let state_codes = find_intersecting_states(catchment, &states);

    if state_codes.is_empty() {
        log::warn!("Catchment does not intersect any state boundary for {year}");
        return Ok(Vec::new());
    }

    log::info!(
        "Catchment intersects {} state(s): {}",
        state_codes.len(),
        state_codes.join(", ")
    );

    let mut seen = BTreeSet::new();
    let mut overlapping = Vec::new();

    for state in &state_codes {
        let tracts = provider.tract_boundaries(state, year).await?;
        let clipped = clip_tracts(catchment, &tracts, policy);
        log::debug!(
            "State {state}: {} of {} tracts overlap the catchment",
            clipped.len(),
            tracts.len()
        );

        overlapping.extend(
            clipped
                .into_iter()
                .filter(|record| seen.insert(record.geoid.clone())),
        );
    }

    log::info!("{} tracts overlap the catchment", overlapping.len());

    Ok(overlapping)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use geo::{Rect, coord};

    use super::*;

    fn rect(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> MultiPolygon<f64> {
        MultiPolygon(vec![
            Rect::new(coord! { x: min_x, y: min_y }, coord! { x: max_x, y: max_y }).to_polygon(),
        ])
    }

    fn tract(geoid: &str, aland: f64, geometry: MultiPolygon<f64>) -> TractBoundary {
        TractBoundary {
            geoid: geoid.to_string(),
            aland,
            geometry,
        }
    }

    fn catchment() -> MultiPolygon<f64> {
        rect(0.0, 0.0, 1.0, 1.0)
    }

    #[test]
    fn contained_tract_has_full_coverage() {
        let tracts = [tract("17031000100", 1.0, rect(0.2, 0.2, 0.4, 0.4))];
        let records = clip_tracts(&catchment(), &tracts, CoveragePolicy::AnyOverlap);
        assert_eq!(records.len(), 1);
        assert!((records[0].coverage_percentage - 1.0).abs() < 1e-6);
    }

    #[test]
    fn half_covered_tract() {
        let tracts = [tract("17031000200", 1.0, rect(0.5, 0.2, 1.5, 0.4))];
        let records = clip_tracts(&catchment(), &tracts, CoveragePolicy::AnyOverlap);
        assert_eq!(records.len(), 1);
        assert!((records[0].coverage_percentage - 0.5).abs() < 1e-6);
        // Geometry is replaced by the clipped shape.
        assert!((records[0].geometry.unsigned_area() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn disjoint_and_touching_tracts_are_dropped() {
        let tracts = [
            tract("17031000300", 1.0, rect(2.0, 2.0, 3.0, 3.0)),
            tract("17031000400", 1.0, rect(1.0, 0.0, 2.0, 1.0)),
        ];
        let records = clip_tracts(&catchment(), &tracts, CoveragePolicy::AnyOverlap);
        assert!(records.is_empty());
    }

    #[test]
    fn water_only_tracts_are_dropped() {
        let tracts = [tract("17031990000", 0.0, rect(0.2, 0.2, 0.4, 0.4))];
        assert!(clip_tracts(&catchment(), &tracts, CoveragePolicy::AnyOverlap).is_empty());
    }

    #[test]
    fn minimum_fraction_policy() {
        let tracts = [
            tract("17031000500", 1.0, rect(0.9, 0.0, 1.9, 0.5)),
            tract("17031000600", 1.0, rect(0.5, 0.5, 1.5, 0.9)),
        ];
        let records = clip_tracts(
            &catchment(),
            &tracts,
            CoveragePolicy::MinimumFraction(0.3),
        );
        let geoids: Vec<&str> = records.iter().map(|r| r.geoid.as_str()).collect();
        assert_eq!(geoids, vec!["17031000600"]);
    }

    #[test]
    fn duplicate_geoids_are_kept_once() {
        let tracts = [
            tract("17031000700", 1.0, rect(0.1, 0.1, 0.2, 0.2)),
            tract("17031000700", 1.0, rect(0.3, 0.3, 0.4, 0.4)),
        ];
        assert_eq!(
            clip_tracts(&catchment(), &tracts, CoveragePolicy::AnyOverlap).len(),
            1
        );
    }

    #[test]
    fn finds_states_by_intersection() {
        let states = [
            StateBoundary {
                geoid: "17".to_string(),
                name: Some("Illinois".to_string()),
                geometry: rect(-1.0, -1.0, 0.5, 2.0),
            },
            StateBoundary {
                geoid: "18".to_string(),
                name: Some("Indiana".to_string()),
                geometry: rect(0.5, -1.0, 2.0, 2.0),
            },
            StateBoundary {
                geoid: "06".to_string(),
                name: Some("California".to_string()),
                geometry: rect(10.0, 10.0, 11.0, 11.0),
            },
        ];
        assert_eq!(
            find_intersecting_states(&catchment(), &states),
            vec!["17".to_string(), "18".to_string()]
        );
    }

    struct FixtureBoundaries {
        states: Vec<StateBoundary>,
        tracts: Vec<(String, Vec<TractBoundary>)>,
        tract_requests: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl BoundaryProvider for FixtureBoundaries {
        async fn state_boundaries(&self, _year: u16) -> Result<Vec<StateBoundary>, GeoError> {
            Ok(self.states.clone())
        }

        async fn tract_boundaries(
            &self,
            state_fips: &str,
            _year: u16,
        ) -> Result<Vec<TractBoundary>, GeoError> {
            self.tract_requests
                .lock()
                .unwrap()
                .push(state_fips.to_string());
            Ok(self
                .tracts
                .iter()
                .find(|(state, _)| state == state_fips)
                .map(|(_, tracts)| tracts.clone())
                .unwrap_or_default())
        }
    }

    #[tokio::test]
    async fn only_intersecting_states_are_loaded() {
        let provider = FixtureBoundaries {
            states: vec![
                StateBoundary {
                    geoid: "17".to_string(),
                    name: None,
                    geometry: rect(-1.0, -1.0, 2.0, 2.0),
                },
                StateBoundary {
                    geoid: "06".to_string(),
                    name: None,
                    geometry: rect(10.0, 10.0, 11.0, 11.0),
                },
            ],
            tracts: vec![(
                "17".to_string(),
                vec![
                    tract("17031000100", 1.0, rect(0.2, 0.2, 0.4, 0.4)),
                    tract("17031000800", 1.0, rect(1.5, 1.5, 1.9, 1.9)),
                ],
            )],
            tract_requests: Mutex::new(Vec::new()),
        };

        let records = overlapping_tracts(&provider, &catchment(), 2022, CoveragePolicy::default())
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].geoid, "17031000100");
        assert_eq!(*provider.tract_requests.lock().unwrap(), vec!["17"]);
    }

    #[tokio::test]
    async fn no_intersecting_state_is_empty_not_error() {
        let provider = FixtureBoundaries {
            states: vec![StateBoundary {
                geoid: "06".to_string(),
                name: None,
                geometry: rect(10.0, 10.0, 11.0, 11.0),
            }],
            tracts: vec![],
            tract_requests: Mutex::new(Vec::new()),
        };

        let records = overlapping_tracts(&provider, &catchment(), 2022, CoveragePolicy::default())
            .await
            .unwrap();
        assert!(records.is_empty());
        assert!(provider.tract_requests.lock().unwrap().is_empty());
    }
}
