#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Census state and tract boundary types.
//!
//! Boundaries come from the boundary provider in WGS84 longitude/latitude.
//! A [`TractRecord`] is what remains of a tract after it has been clipped
//! to a catchment: its geometry is the intersection, not the full tract.

pub mod geoid;

use geo::MultiPolygon;
use serde::Serialize;

/// A state boundary polygon.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StateBoundary {
    /// Two-digit state FIPS code (e.g. "17").
    pub geoid: String,
    /// State name, when the provider supplies one.
    pub name: Option<String>,
    #[serde(skip)]
    pub geometry: MultiPolygon<f64>,
}

/// A full census tract boundary as published by the boundary provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TractBoundary {
    /// Census GEOID (state FIPS + county FIPS + tract code, e.g. "17031081500").
    pub geoid: String,
    /// Land area in square meters (`ALAND`).
    pub aland: f64,
    #[serde(skip)]
    pub geometry: MultiPolygon<f64>,
}

/// A census tract clipped to a catchment.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TractRecord {
    /// Census GEOID, unique within a tract set.
    pub geoid: String,
    /// Intersection of the tract with the catchment.
    #[serde(skip)]
    pub geometry: MultiPolygon<f64>,
    /// Fraction of the original tract's area inside the catchment, in
    /// `[0, 1]`.
    pub coverage_percentage: f64,
    /// Land area of the original tract in square meters (`ALAND`).
    pub aland: f64,
}

impl TractRecord {
    /// Two-digit state FIPS code derived from the GEOID.
    #[must_use]
    pub fn state_fips(&self) -> Option<&str> {
        geoid::state_fips(&self.geoid)
    }

    /// Three-digit county FIPS code derived from the GEOID.
    #[must_use]
    pub fn county_fips(&self) -> Option<&str> {
        geoid::county_fips(&self.geoid)
    }
}
