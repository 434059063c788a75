#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Point-of-interest types.

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use thiserror::Error;

/// Rankings keep this many names.
pub const TOP_LOCATIONS_LIMIT: usize = 20;

/// Densities are reported per this many persons.
pub const DENSITY_PER_PERSONS: f64 = 10_000.0;

/// Meters per statute mile, for POI distances.
pub const METERS_PER_MILE: f64 = 1609.344;

/// A tag key and the values of interest for it, e.g.
/// `amenity=cafe,restaurant`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoiSelection {
    pub key: String,
    pub values: Vec<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SelectionParseError {
    #[error("POI selection '{0}' must look like key=value1,value2")]
    Malformed(String),
}

impl FromStr for PoiSelection {
    type Err = SelectionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key, values) = s
            .split_once('=')
            .ok_or_else(|| SelectionParseError::Malformed(s.to_string()))?;

        let key = key.trim();
        let values: Vec<String> = values
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(String::from)
            .collect();

        if key.is_empty() || values.is_empty() {
            return Err(SelectionParseError::Malformed(s.to_string()));
        }

        Ok(Self {
            key: key.to_string(),
            values,
        })
    }
}

/// A raw feature returned by the features provider.
#[derive(Debug, Clone, PartialEq)]
pub struct OsmFeature {
    pub geometry: geo::Geometry<f64>,
    pub tags: BTreeMap<String, String>,
}

impl OsmFeature {
    /// The feature's `name` tag, if non-empty.
    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.tags
            .get("name")
            .map(|n| n.trim())
            .filter(|n| !n.is_empty())
    }
}

/// Street address fields from `addr:*` tags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoiAddress {
    pub housenumber: Option<String>,
    pub street: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postcode: Option<String>,
}

impl PoiAddress {
    #[must_use]
    pub fn from_tags(tags: &BTreeMap<String, String>) -> Self {
        let tag = |key: &str| tags.get(key).filter(|v| !v.is_empty()).cloned();
        Self {
            housenumber: tag("addr:housenumber"),
            street: tag("addr:street"),
            city: tag("addr:city"),
            state: tag("addr:state"),
            postcode: tag("addr:postcode"),
        }
    }

    /// Present fields joined with `", "`.
    #[must_use]
    pub fn display(&self) -> String {
        [
            &self.housenumber,
            &self.street,
            &self.city,
            &self.state,
            &self.postcode,
        ]
        .into_iter()
        .flatten()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(", ")
    }
}

/// A named feature inside a catchment.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoiRecord {
    /// Selection key the feature matched (e.g. `"amenity"`).
    pub category_key: String,
    /// The feature's value for that key (e.g. `"cafe"`).
    pub category_value: String,
    pub name: String,
    #[serde(skip)]
    pub geometry: geo::Geometry<f64>,
    pub address: PoiAddress,
    /// Geodesic distance from the feature's centroid to the catchment
    /// location, in miles.
    pub distance_miles: f64,
}

/// Whether a POI lookup produced anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PoiStatus {
    Found,
    /// The provider returned no named features.
    NoData,
    /// The provider request failed.
    Failed { cause: String },
}

/// The result of one selection's lookup.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoiOutcome {
    pub selection: PoiSelection,
    pub records: Vec<PoiRecord>,
    pub status: PoiStatus,
}

impl PoiOutcome {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Ordering for name rankings.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum PoiMetric {
    /// Most locations first.
    #[default]
    Count,
    /// Most locations per 10,000 persons first.
    PerCapita,
    /// Closest first.
    Distance,
}

/// Distinct locations for one category value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryCount {
    pub category_value: String,
    pub distinct_locations: usize,
    /// Locations per 10,000 persons; `None` for an unpopulated catchment.
    pub per_10k_persons: Option<f64>,
}

/// One name's entry in a ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NameRanking {
    pub name: String,
    /// Feature instances carrying this name.
    pub count: usize,
    pub min_distance_miles: f64,
    /// The value ranked on. `None` for per-capita rankings of an
    /// unpopulated catchment.
    pub metric: Option<f64>,
}
