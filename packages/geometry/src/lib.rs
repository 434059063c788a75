#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Catchment polygon construction and measurement.
//!
//! Turns a [`Location`](catchment_models::Location) and a
//! [`CatchmentSpec`](catchment_models::CatchmentSpec) into a single
//! `MultiPolygon` in WGS84 longitude/latitude:
//!
//! - **Distance** catchments are circles buffered in an azimuthal
//!   equidistant projection centered on the location and projected back,
//!   so the radius is exact on the ellipsoid instead of being a circle in
//!   degrees.
//! - **Travel-time** catchments are isochrones requested from a
//!   [`routing::Router`] (`OpenRouteService` in production).
//!
//! [`area::area_sq_miles`] measures any catchment in an Albers equal-area
//! projection fitted to the polygon's own latitude span.

pub mod area;
pub mod builder;
pub mod openrouteservice;
pub mod projection;
pub mod routing;

use thiserror::Error;

/// Errors that can occur while building catchment geometry.
#[derive(Debug, Error)]
pub enum GeometryError {
    /// The request cannot be satisfied as given (missing location or
    /// routing client).
    #[error("Invalid input: {message}")]
    InvalidInput {
        /// Description of what is missing or malformed.
        message: String,
    },

    /// The routing provider failed.
    #[error("Routing error: {0}")]
    Routing(#[from] RoutingError),
}

/// Errors from routing provider requests.
#[derive(Debug, Error)]
pub enum RoutingError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The provider answered with an error status or an unusable body.
    #[error("Response error: {message}")]
    Response {
        /// Description of what went wrong.
        message: String,
    },
}
