#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Points of interest within a catchment.
//!
//! Features matching a tag selection are fetched from a
//! [`FeaturesProvider`] (`OpenStreetMap` via Overpass in production, see
//! [`overpass`]), unnamed features are dropped, and the rest are counted
//! and ranked by distinct name.

pub mod aggregate;
pub mod overpass;

use async_trait::async_trait;
use catchment_poi_models::{OsmFeature, PoiSelection};
use geo::MultiPolygon;
use thiserror::Error;

/// Errors that can occur while fetching features.
#[derive(Debug, Error)]
pub enum PoiError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Unexpected response contents.
    #[error("Conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}

/// A source of tagged map features.
#[async_trait]
pub trait FeaturesProvider: Send + Sync {
    /// Returns every feature inside `polygon` whose `selection.key` tag
    /// has one of `selection.values`.
    ///
    /// # Errors
    ///
    /// Returns [`PoiError`] if the request or response parsing fails.
    async fn features_in_polygon(
        &self,
        polygon: &MultiPolygon<f64>,
        selection: &PoiSelection,
    ) -> Result<Vec<OsmFeature>, PoiError>;
}
