#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Demographic aggregation over catchment tracts.
//!
//! Fetches tract-level estimates for the counties a catchment touches,
//! joins them with the tracts' coverage fractions and combines them into
//! catchment-level totals and population-weighted averages. Estimates are
//! served in production by the ACS 5-year API ([`acs`]).

pub mod acs;
pub mod aggregate;
pub mod catalog;

use async_trait::async_trait;
use catchment_census_models::{CatalogEntry, StatisticsRow};
use thiserror::Error;

/// Errors that can occur while fetching or aggregating census data.
#[derive(Debug, Error)]
pub enum CensusError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The provider returned something other than the expected table.
    #[error("Conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },

    /// A requested variable is not in the catalog.
    #[error("Unsupported variable: {code}")]
    UnsupportedVariable {
        /// The unknown variable code.
        code: String,
    },
}

/// A source of tract-level statistics.
#[async_trait]
pub trait StatisticsProvider: Send + Sync {
    /// Returns one row per tract of `county` in `state` with values for
    /// `codes`.
    ///
    /// # Errors
    ///
    /// Returns [`CensusError`] if the request or response parsing fails.
    async fn tract_statistics(
        &self,
        codes: &[String],
        state: &str,
        county: &str,
        year: u16,
    ) -> Result<Vec<StatisticsRow>, CensusError>;

    /// Returns the raw variable catalog for `year`.
    ///
    /// # Errors
    ///
    /// Returns [`CensusError`] if the request or response parsing fails.
    async fn variable_catalog(&self, year: u16) -> Result<Vec<CatalogEntry>, CensusError>;
}
