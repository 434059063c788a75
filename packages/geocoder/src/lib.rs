#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Address geocoding.
//!
//! Resolves the free-form address a catchment is requested for into a
//! [`Location`]. The production [`Geocoder`] is the public Nominatim /
//! `OpenStreetMap` search API ([`nominatim`]).

pub mod nominatim;

use async_trait::async_trait;
use catchment_models::Location;
use thiserror::Error;

/// Errors that can occur during geocoding.
#[derive(Debug, Error)]
pub enum GeocodeError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Response could not be interpreted.
    #[error("Parse error: {message}")]
    Parse {
        /// Description of what went wrong.
        message: String,
    },

    /// Rate limit exceeded.
    #[error("Rate limited by geocoding service")]
    RateLimited,
}

/// Resolves addresses to coordinates.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Returns the best match for `address`, or `None` if nothing matched.
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError`] if the request or response parsing fails.
    async fn geocode(&self, address: &str) -> Result<Option<Location>, GeocodeError>;
}
