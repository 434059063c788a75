//! Coverage-weighted aggregation of tract estimates.
//!
//! Count variables are scaled by each tract's coverage fraction. Other
//! metrics keep the tract's value and are summarized with a
//! population-weighted average over the tracts reporting a positive value.

use std::collections::{BTreeMap, BTreeSet};

use catchment_census_models::{
    Normalization, StatisticsRow, SummaryKind, TOTAL_POPULATION_VARIABLE, VariableDescriptor,
    VariableSummary, VariableType,
};
use catchment_geography_models::TractRecord;
use serde::Serialize;

use crate::{CensusError, StatisticsProvider};

/// Variable codes per ACS request. The API rejects more than 50 `get`
/// columns.
pub const MAX_CODES_PER_REQUEST: usize = 49;

/// One overlapping tract's estimates after interpolation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TractEstimate {
    pub geoid: String,
    pub coverage_percentage: f64,
    /// Total population scaled by coverage.
    pub population: Option<f64>,
    /// Values by variable code. Count variables are scaled by coverage.
    /// Absent when the provider did not return the column.
    pub values: BTreeMap<String, Option<f64>>,
    /// `value / population` by variable code, when normalization is on.
    /// `None` for tracts with no population.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub population_normalized: BTreeMap<String, Option<f64>>,
}

/// Per-tract estimates for a catchment plus the variables they cover.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DemographicTable {
    pub variables: Vec<VariableDescriptor>,
    pub normalization: Normalization,
    pub tracts: Vec<TractEstimate>,
}

impl DemographicTable {
    /// A table with no tracts.
    #[must_use]
    pub const fn empty(variables: Vec<VariableDescriptor>, normalization: Normalization) -> Self {
        Self {
            variables,
            normalization,
            tracts: Vec::new(),
        }
    }

    /// Sum of the coverage-scaled tract populations. Tracts whose
    /// population is missing or a negative sentinel contribute nothing.
    #[must_use]
    pub fn total_population(&self) -> f64 {
        self.tracts.iter().filter_map(|t| t.population).sum()
    }

    /// Sum of a variable over the catchment. Negative values are provider
    /// sentinels for missing estimates and are skipped.
    ///
    /// Returns `None` when no tract carries the variable.
    #[must_use]
    pub fn total(&self, code: &str) -> Option<f64> {
        let mut present = false;
        let mut sum = 0.0;

        for value in self.tracts.iter().filter_map(|t| t.values.get(code)) {
            present = true;
            if let Some(v) = value.filter(|v| *v >= 0.0) {
                sum += v;
            }
        }

        present.then_some(sum)
    }

    /// Population-weighted average of a variable.
    ///
    /// Only tracts with a positive value contribute, to both the numerator
    /// and the weights. Returns `None` when the variable is missing or no
    /// contributing tract has population.
    #[must_use]
    pub fn weighted_average(&self, code: &str) -> Option<f64> {
        let mut weighted = 0.0;
        let mut weights = 0.0;

        for tract in &self.tracts {
            let (Some(Some(value)), Some(population)) = (tract.values.get(code), tract.population)
            else {
                continue;
            };
            if *value > 0.0 {
                weighted += value * population;
                weights += population;
            }
        }

        (weights > 0.0).then(|| weighted / weights)
    }

    /// One summary per requested variable, in request order.
    #[must_use]
    pub fn summaries(&self) -> Vec<VariableSummary> {
        self.variables
            .iter()
            .map(|variable| {
                let kind = variable.summary_kind();
                let value = match kind {
                    SummaryKind::Sum => self.total(&variable.code),
                    SummaryKind::WeightedAverage => self.weighted_average(&variable.code),
                };
                VariableSummary {
                    code: variable.code.clone(),
                    display_name: variable.display_name.clone(),
                    kind,
                    value,
                }
            })
            .collect()
    }
}

/// Joins provider rows with the overlapping tracts and applies coverage
/// scaling.
///
/// Rows for tracts outside `tracts` are ignored, as are repeated GEOIDs.
/// The result follows row order.
#[must_use]
pub fn build_table(
    tracts: &[TractRecord],
    rows: &[StatisticsRow],
    variables: &[VariableDescriptor],
    normalization: Normalization,
) -> DemographicTable {
    let coverage: BTreeMap<&str, f64> = tracts
        .iter()
        .map(|t| (t.geoid.as_str(), t.coverage_percentage))
        .collect();

    let mut seen = BTreeSet::new();
    let mut estimates = Vec::with_capacity(tracts.len());

    for row in rows {
        let geoid = row.geoid();
        let Some(&fraction) = coverage.get(geoid.as_str()) else {
            continue;
        };
        if !seen.insert(geoid.clone()) {
            continue;
        }

        // Negative populations are sentinels for a suppressed estimate.
        let population = row
            .values
            .get(TOTAL_POPULATION_VARIABLE)
            .copied()
            .flatten()
            .filter(|p| *p >= 0.0)
            .map(|p| p * fraction);

        let mut values = BTreeMap::new();
        for variable in variables {
            let Some(raw) = row.values.get(&variable.code).copied() else {
                continue;
            };
            let value = match variable.variable_type {
                VariableType::PopulationCount => raw.map(|v| v * fraction),
                VariableType::OtherMetric => raw,
            };
            values.insert(variable.code.clone(), value);
        }

        let population_normalized = match normalization {
            Normalization::Off => BTreeMap::new(),
            Normalization::ByPopulation => values
                .iter()
                .map(|(code, value)| {
                    let ratio = match (value, population) {
                        (Some(v), Some(p)) if p > 0.0 => Some(v / p),
                        _ => None,
                    };
                    (code.clone(), ratio)
                })
                .collect(),
        };

        estimates.push(TractEstimate {
            geoid,
            coverage_percentage: fraction,
            population,
            values,
            population_normalized,
        });
    }

    if estimates.len() < tracts.len() {
        log::debug!(
            "{} of {} overlapping tracts had no statistics row",
            tracts.len() - estimates.len(),
            tracts.len()
        );
    }

    DemographicTable {
        variables: variables.to_vec(),
        normalization,
        tracts: estimates,
    }
}

/// Fetches estimates for `variables` over `tracts` and builds the
/// interpolated table.
///
/// Requests are made per (state, county) pair, with at most
/// [`MAX_CODES_PER_REQUEST`] variable codes each. Rows from the requests
/// for one county are merged by GEOID. Total population is always
/// requested alongside `variables`. No requests are made for an empty
/// tract set.
///
/// # Errors
///
/// Returns [`CensusError`] if any provider request fails.
pub async fn fetch_tract_estimates(
    provider: &dyn StatisticsProvider,
    tracts: &[TractRecord],
    variables: &[VariableDescriptor],
    normalization: Normalization,
    year: u16,
) -> Result<DemographicTable, CensusError> {
    if tracts.is_empty() {
        return Ok(DemographicTable::empty(variables.to_vec(), normalization));
    }

    let mut codes: Vec<String> = vec![TOTAL_POPULATION_VARIABLE.to_string()];
    for variable in variables {
        if !codes.contains(&variable.code) {
            codes.push(variable.code.clone());
        }
    }

    let mut counties: BTreeSet<(&str, &str)> = BTreeSet::new();
    for tract in tracts {
        match (tract.state_fips(), tract.county_fips()) {
            (Some(state), Some(county)) => {
                counties.insert((state, county));
            }
            _ => log::warn!("Skipping tract with malformed GEOID '{}'", tract.geoid),
        }
    }

    log::info!(
        "Fetching {} variables for {} tracts across {} counties",
        codes.len(),
        tracts.len(),
        counties.len()
    );

    let mut rows = Vec::new();
    for (state, county) in counties {
        let mut county_rows: Vec<StatisticsRow> = Vec::new();
        for chunk in codes.chunks(MAX_CODES_PER_REQUEST) {
            let fetched = provider.tract_statistics(chunk, state, county, year).await?;
            merge_rows(&mut county_rows, fetched);
        }
        rows.extend(county_rows);
    }

    Ok(build_table(tracts, &rows, variables, normalization))
}

/// Adds the columns of `fetched` to the rows of `merged` with the same
/// GEOID. Rows not yet in `merged` are appended in order.
fn merge_rows(merged: &mut Vec<StatisticsRow>, fetched: Vec<StatisticsRow>) {
    let mut positions: BTreeMap<String, usize> = merged
        .iter()
        .enumerate()
        .map(|(i, row)| (row.geoid(), i))
        .collect();

    for row in fetched {
        let geoid = row.geoid();
        if let Some(&i) = positions.get(&geoid) {
            merged[i].values.extend(row.values);
        } else {
            positions.insert(geoid, merged.len());
            merged.push(row);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use catchment_census_models::CatalogEntry;
    use geo::MultiPolygon;

    use super::*;

    const INCOME: &str = "B19013_001E";
    const MALE: &str = "B01001_002E";

    fn tract(geoid: &str, coverage: f64) -> TractRecord {
        TractRecord {
            geoid: geoid.to_string(),
            geometry: MultiPolygon(vec![]),
            coverage_percentage: coverage,
            aland: 1.0,
        }
    }

    fn row(geoid: &str, values: &[(&str, Option<f64>)]) -> StatisticsRow {
        StatisticsRow {
            state: geoid[..2].to_string(),
            county: geoid[2..5].to_string(),
            tract: geoid[5..].to_string(),
            values: values
                .iter()
                .map(|(code, value)| ((*code).to_string(), *value))
                .collect(),
        }
    }

    fn variables() -> Vec<VariableDescriptor> {
        vec![
            VariableDescriptor::total_population(),
            VariableDescriptor::new(MALE, "SEX BY AGE", "Total: Male:"),
            VariableDescriptor::new(
                INCOME,
                "MEDIAN HOUSEHOLD INCOME",
                "Median household income in the past 12 months",
            ),
        ]
    }

    #[test]
    fn scales_counts_by_coverage() {
        let tracts = [tract("17031000100", 1.0), tract("17031000200", 0.5)];
        let rows = [
            row(
                "17031000100",
                &[
                    (TOTAL_POPULATION_VARIABLE, Some(4000.0)),
                    (MALE, Some(1900.0)),
                    (INCOME, Some(50_000.0)),
                ],
            ),
            row(
                "17031000200",
                &[
                    (TOTAL_POPULATION_VARIABLE, Some(2000.0)),
                    (MALE, Some(1000.0)),
                    (INCOME, Some(80_000.0)),
                ],
            ),
        ];

        let table = build_table(&tracts, &rows, &variables(), Normalization::Off);

        assert!((table.total_population() - 5000.0).abs() < 1e-9);
        assert_eq!(table.total(TOTAL_POPULATION_VARIABLE), Some(5000.0));
        assert_eq!(table.total(MALE), Some(2400.0));
        // Medians are not scaled.
        assert_eq!(table.tracts[1].values[INCOME], Some(80_000.0));
        // (50000 * 4000 + 80000 * 1000) / 5000
        let average = table.weighted_average(INCOME).unwrap();
        assert!((average - 56_000.0).abs() < 1e-6);
    }

    #[test]
    fn interpolated_population_matches_coverage_weighted_sum() {
        let tracts = [
            tract("17031000100", 0.25),
            tract("17031000200", 0.8),
            tract("17031000300", 1.0),
        ];
        let populations = [1200.0, 3150.0, 40.0];
        let rows: Vec<StatisticsRow> = tracts
            .iter()
            .zip(populations)
            .map(|(t, p)| row(&t.geoid, &[(TOTAL_POPULATION_VARIABLE, Some(p))]))
            .collect();

        let table = build_table(&tracts, &rows, &[], Normalization::Off);
        let expected: f64 = tracts
            .iter()
            .zip(populations)
            .map(|(t, p)| t.coverage_percentage * p)
            .sum();
        assert!((table.total_population() - expected).abs() < 1e-9);
    }

    #[test]
    fn uniform_values_average_to_themselves() {
        let tracts = [tract("17031000100", 0.3), tract("17031000200", 0.9)];
        let rows = [
            row(
                "17031000100",
                &[(TOTAL_POPULATION_VARIABLE, Some(800.0)), (INCOME, Some(42.5))],
            ),
            row(
                "17031000200",
                &[(TOTAL_POPULATION_VARIABLE, Some(2600.0)), (INCOME, Some(42.5))],
            ),
        ];
        let table = build_table(&tracts, &rows, &variables(), Normalization::Off);
        assert!((table.weighted_average(INCOME).unwrap() - 42.5).abs() < 1e-9);
    }

    #[test]
    fn non_positive_values_are_excluded_from_weights() {
        let tracts = [tract("17031000100", 1.0), tract("17031000200", 1.0)];
        let rows = [
            row(
                "17031000100",
                &[(TOTAL_POPULATION_VARIABLE, Some(1000.0)), (INCOME, Some(60_000.0))],
            ),
            row(
                "17031000200",
                &[
                    (TOTAL_POPULATION_VARIABLE, Some(3000.0)),
                    (INCOME, Some(-666_666_666.0)),
                ],
            ),
        ];
        let table = build_table(&tracts, &rows, &variables(), Normalization::Off);
        assert_eq!(table.weighted_average(INCOME), Some(60_000.0));
    }

    #[test]
    fn negative_population_is_a_missing_estimate() {
        let tracts = [tract("17031000100", 1.0), tract("17031000200", 1.0)];
        let rows = [
            row(
                "17031000100",
                &[(TOTAL_POPULATION_VARIABLE, Some(4000.0)), (INCOME, Some(50_000.0))],
            ),
            row(
                "17031000200",
                &[
                    (TOTAL_POPULATION_VARIABLE, Some(-666_666_666.0)),
                    (INCOME, Some(90_000.0)),
                ],
            ),
        ];
        let table = build_table(&tracts, &rows, &variables(), Normalization::ByPopulation);

        assert_eq!(table.tracts[1].population, None);
        assert!((table.total_population() - 4000.0).abs() < 1e-9);
        assert_eq!(table.total(TOTAL_POPULATION_VARIABLE), Some(4000.0));
        assert_eq!(table.weighted_average(INCOME), Some(50_000.0));
        assert_eq!(table.tracts[1].population_normalized[INCOME], None);
    }

    #[test]
    fn missing_columns_and_zero_population_yield_none() {
        let tracts = [tract("17031000100", 1.0)];
        let rows = [row(
            "17031000100",
            &[(TOTAL_POPULATION_VARIABLE, Some(0.0)), (INCOME, Some(61_000.0))],
        )];
        let table = build_table(&tracts, &rows, &variables(), Normalization::ByPopulation);

        assert_eq!(table.total(MALE), None);
        assert_eq!(table.weighted_average(MALE), None);
        assert_eq!(table.weighted_average(INCOME), None);
        assert_eq!(table.tracts[0].population_normalized[INCOME], None);
        assert!(!table.tracts[0].population_normalized.contains_key(MALE));
    }

    #[test]
    fn normalizes_by_population() {
        let tracts = [tract("17031000100", 0.5)];
        let rows = [row(
            "17031000100",
            &[(TOTAL_POPULATION_VARIABLE, Some(2000.0)), (MALE, Some(900.0))],
        )];
        let table = build_table(&tracts, &rows, &variables(), Normalization::ByPopulation);

        let ratio = table.tracts[0].population_normalized[MALE].unwrap();
        assert!((ratio - 0.45).abs() < 1e-9);
    }

    #[test]
    fn ignores_rows_outside_the_catchment() {
        let tracts = [tract("17031000100", 1.0)];
        let rows = [
            row("17031000100", &[(TOTAL_POPULATION_VARIABLE, Some(10.0))]),
            row("17031000999", &[(TOTAL_POPULATION_VARIABLE, Some(99.0))]),
            row("17031000100", &[(TOTAL_POPULATION_VARIABLE, Some(10.0))]),
        ];
        let table = build_table(&tracts, &rows, &[], Normalization::Off);
        assert_eq!(table.tracts.len(), 1);
        assert!((table.total_population() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn summaries_follow_variable_names() {
        let tracts = [tract("17031000100", 1.0)];
        let rows = [row(
            "17031000100",
            &[
                (TOTAL_POPULATION_VARIABLE, Some(100.0)),
                (MALE, Some(40.0)),
                (INCOME, Some(70_000.0)),
            ],
        )];
        let summaries = build_table(&tracts, &rows, &variables(), Normalization::Off).summaries();

        let kinds: Vec<SummaryKind> = summaries.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![SummaryKind::Sum, SummaryKind::Sum, SummaryKind::WeightedAverage]
        );
        assert_eq!(summaries[1].value, Some(40.0));
        assert_eq!(summaries[2].value, Some(70_000.0));
    }

    struct FixtureStatistics {
        rows: Vec<StatisticsRow>,
        requests: Mutex<Vec<(Vec<String>, String, String)>>,
    }

    #[async_trait]
    impl StatisticsProvider for FixtureStatistics {
        async fn tract_statistics(
            &self,
            codes: &[String],
            state: &str,
            county: &str,
            _year: u16,
        ) -> Result<Vec<StatisticsRow>, CensusError> {
            self.requests.lock().unwrap().push((
                codes.to_vec(),
                state.to_string(),
                county.to_string(),
            ));
            Ok(self
                .rows
                .iter()
                .filter(|r| r.state == state && r.county == county)
                .map(|r| StatisticsRow {
                    values: r
                        .values
                        .iter()
                        .filter(|(code, _)| codes.contains(code))
                        .map(|(code, value)| (code.clone(), *value))
                        .collect(),
                    ..r.clone()
                })
                .collect())
        }

        async fn variable_catalog(&self, _year: u16) -> Result<Vec<CatalogEntry>, CensusError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn requests_once_per_county() {
        let provider = FixtureStatistics {
            rows: vec![
                row("17031000100", &[(TOTAL_POPULATION_VARIABLE, Some(100.0))]),
                row("17031000200", &[(TOTAL_POPULATION_VARIABLE, Some(200.0))]),
                row("18089000100", &[(TOTAL_POPULATION_VARIABLE, Some(300.0))]),
            ],
            requests: Mutex::new(Vec::new()),
        };
        let tracts = [
            tract("17031000100", 1.0),
            tract("17031000200", 1.0),
            tract("18089000100", 0.5),
        ];

        let table = fetch_tract_estimates(
            &provider,
            &tracts,
            &[VariableDescriptor::new(INCOME, "", "Median")],
            Normalization::Off,
            2022,
        )
        .await
        .unwrap();

        assert!((table.total_population() - 450.0).abs() < 1e-9);

        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(
            requests[0].0,
            vec![TOTAL_POPULATION_VARIABLE.to_string(), INCOME.to_string()]
        );
        assert_eq!((requests[1].1.as_str(), requests[1].2.as_str()), ("18", "089"));
    }

    #[tokio::test]
    async fn splits_wide_requests_and_merges_rows() {
        let codes: Vec<String> = (1..=60).map(|i| format!("B25001_{i:03}E")).collect();
        let descriptors: Vec<VariableDescriptor> = codes
            .iter()
            .map(|code| VariableDescriptor::new(code, "HOUSING UNITS", "Total:"))
            .collect();

        let mut values = vec![(TOTAL_POPULATION_VARIABLE, Some(1000.0))];
        values.extend(codes.iter().map(|code| (code.as_str(), Some(10.0))));
        let provider = FixtureStatistics {
            rows: vec![row("17031000100", &values)],
            requests: Mutex::new(Vec::new()),
        };

        let table = fetch_tract_estimates(
            &provider,
            &[tract("17031000100", 0.5)],
            &descriptors,
            Normalization::Off,
            2022,
        )
        .await
        .unwrap();

        let requests = provider.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests.iter().all(|r| r.0.len() <= MAX_CODES_PER_REQUEST));
        assert_eq!(requests[0].0[0], TOTAL_POPULATION_VARIABLE);
        assert_eq!(requests.iter().map(|r| r.0.len()).sum::<usize>(), 61);

        assert_eq!(table.tracts.len(), 1);
        assert!((table.total_population() - 500.0).abs() < 1e-9);
        assert_eq!(table.tracts[0].values.len(), 60);
        assert_eq!(table.total("B25001_001E"), Some(5.0));
        assert_eq!(table.total("B25001_060E"), Some(5.0));
    }

    #[tokio::test]
    async fn empty_tract_set_makes_no_requests() {
        let provider = FixtureStatistics {
            rows: vec![],
            requests: Mutex::new(Vec::new()),
        };
        let table = fetch_tract_estimates(&provider, &[], &variables(), Normalization::Off, 2022)
            .await
            .unwrap();
        assert!(table.tracts.is_empty());
        assert!(table.total_population().abs() < f64::EPSILON);
        assert!(provider.requests.lock().unwrap().is_empty());
    }
}
