#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Areal interpolation of census tracts against catchment polygons.
//!
//! Finds the states a catchment touches, loads only those states' tract
//! boundaries from a [`BoundaryProvider`], clips every tract to the
//! catchment and records the fraction of the tract's area that falls
//! inside it. Boundaries are served in production by the Census Bureau
//! `TIGERweb` REST API ([`tigerweb`]).

pub mod index;
pub mod interpolate;
pub mod tigerweb;

use async_trait::async_trait;
use catchment_geography_models::{StateBoundary, TractBoundary};
use thiserror::Error;

/// Errors that can occur during geography operations.
#[derive(Debug, Error)]
pub enum GeoError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Data conversion error.
    #[error("Conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}

/// A source of census boundary polygons for a given vintage year.
#[async_trait]
pub trait BoundaryProvider: Send + Sync {
    /// Returns every state boundary for `year`.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError`] if the boundaries cannot be fetched or parsed.
    async fn state_boundaries(&self, year: u16) -> Result<Vec<StateBoundary>, GeoError>;

    /// Returns every tract boundary in the state with FIPS code
    /// `state_fips` for `year`.
    ///
    /// # Errors
    ///
    /// Returns [`GeoError`] if the boundaries cannot be fetched or parsed.
    async fn tract_boundaries(
        &self,
        state_fips: &str,
        year: u16,
    ) -> Result<Vec<TractBoundary>, GeoError>;
}
