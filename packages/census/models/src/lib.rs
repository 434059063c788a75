#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Census variable types.
//!
//! A [`VariableDescriptor`] names an ACS estimate and says how it behaves
//! under areal interpolation. Count-like ("extensive") variables are
//! scaled by a tract's coverage fraction; rate- and average-like
//! ("intensive") variables are taken as representative of the whole tract
//! and combined with a population-weighted average.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// ACS code for total population, fetched with every request as the
/// weighting denominator.
pub const TOTAL_POPULATION_VARIABLE: &str = "B01003_001E";

/// How a variable is interpolated across partially covered tracts.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum VariableType {
    /// Additive count; scaled by coverage.
    PopulationCount,
    /// Rate, median or average; not scaled.
    OtherMetric,
}

impl VariableType {
    /// Classifies a cleaned variable name: names starting with `"Total:"`
    /// are population counts, everything else is another metric.
    #[must_use]
    pub fn classify(display_name: &str) -> Self {
        if display_name.starts_with("Total:") {
            Self::PopulationCount
        } else {
            Self::OtherMetric
        }
    }
}

/// How a variable is summarized over a whole catchment.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SummaryKind {
    /// Sum of scaled tract values.
    Sum,
    /// Population-weighted average of tract values.
    WeightedAverage,
}

impl SummaryKind {
    /// `"Total..."` and `"Aggregate..."` variables are summed; everything
    /// else is averaged.
    #[must_use]
    pub fn for_display_name(display_name: &str) -> Self {
        if display_name.starts_with("Total") || display_name.starts_with("Aggregate") {
            Self::Sum
        } else {
            Self::WeightedAverage
        }
    }
}

/// A selectable census variable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableDescriptor {
    /// Provider variable id (e.g. `"B19013_001E"`).
    pub code: String,
    /// Thematic group (the ACS concept, e.g. `"MEDIAN HOUSEHOLD INCOME"`).
    pub group: String,
    /// Cleaned label (e.g. `"Total: Male"`).
    pub display_name: String,
    pub variable_type: VariableType,
}

impl VariableDescriptor {
    /// Builds a descriptor, classifying it from its display name.
    #[must_use]
    pub fn new(
        code: impl Into<String>,
        group: impl Into<String>,
        display_name: impl Into<String>,
    ) -> Self {
        let display_name = display_name.into();
        Self {
            code: code.into(),
            group: group.into(),
            variable_type: VariableType::classify(&display_name),
            display_name,
        }
    }

    /// The total-population variable, always treated as a count.
    #[must_use]
    pub fn total_population() -> Self {
        Self {
            code: TOTAL_POPULATION_VARIABLE.to_string(),
            group: "TOTAL POPULATION".to_string(),
            display_name: "Total".to_string(),
            variable_type: VariableType::PopulationCount,
        }
    }

    #[must_use]
    pub fn summary_kind(&self) -> SummaryKind {
        SummaryKind::for_display_name(&self.display_name)
    }
}

/// A raw entry of the provider's variable catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub code: String,
    /// Raw label (e.g. `"Estimate!!Total:!!Male:"`).
    pub label: String,
    /// Raw concept, used as the variable group.
    pub concept: Option<String>,
}

/// One tract's values as returned by the statistics provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsRow {
    /// Two-digit state FIPS code.
    pub state: String,
    /// Three-digit county FIPS code.
    pub county: String,
    /// Six-digit tract code.
    pub tract: String,
    /// Values by variable code. `None` when the provider returned null or
    /// a non-numeric value; absent when the column was not returned.
    pub values: BTreeMap<String, Option<f64>>,
}

impl StatisticsRow {
    /// The tract GEOID (state + county + tract).
    #[must_use]
    pub fn geoid(&self) -> String {
        format!("{}{}{}", self.state, self.county, self.tract)
    }
}

/// Whether per-tract values are also reported as a share of population.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Normalization {
    #[default]
    Off,
    /// Report `value / population` per tract.
    ByPopulation,
}

/// A variable's catchment-level summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableSummary {
    pub code: String,
    pub display_name: String,
    pub kind: SummaryKind,
    /// `None` when the variable was not returned or has no usable values.
    pub value: Option<f64>,
}
