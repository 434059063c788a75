//! Routing provider abstraction for travel-time isochrones.

use async_trait::async_trait;
use catchment_models::IsochroneProperties;
use geo::MultiPolygon;
use serde::Serialize;

use crate::RoutingError;

/// How the isochrone `range` is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RangeType {
    /// Seconds of travel.
    Time,
}

/// Extra attributes the provider computes for each isochrone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IsochroneAttribute {
    /// Isochrone area.
    Area,
    /// Population living inside the isochrone.
    TotalPop,
}

/// An isochrone request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IsochroneRequest {
    /// Routing profile identifier (e.g. `"foot-walking"`). Sent as part of
    /// the endpoint path, not the body.
    #[serde(skip)]
    pub profile: &'static str,
    /// Origins as `[longitude, latitude]` pairs.
    pub locations: Vec<[f64; 2]>,
    /// Range values, in seconds for [`RangeType::Time`].
    pub range: Vec<u32>,
    pub range_type: RangeType,
    pub attributes: Vec<IsochroneAttribute>,
}

impl IsochroneRequest {
    /// A single-origin, single-range travel-time request asking for the
    /// `area` and `total_pop` attributes.
    #[must_use]
    pub fn travel_time(profile: &'static str, longitude: f64, latitude: f64, seconds: u32) -> Self {
        Self {
            profile,
            locations: vec![[longitude, latitude]],
            range: vec![seconds],
            range_type: RangeType::Time,
            attributes: vec![IsochroneAttribute::Area, IsochroneAttribute::TotalPop],
        }
    }
}

/// One isochrone feature returned by the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Isochrone {
    /// Isochrone polygon in WGS84 longitude/latitude.
    pub geometry: MultiPolygon<f64>,
    /// Provider-supplied properties.
    pub properties: IsochroneProperties,
}

/// A routing service able to draw isochrones.
#[async_trait]
pub trait Router: Send + Sync {
    /// Requests isochrones, one per `(location, range)` pair, in the
    /// provider's order.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError`] if the request fails or the response
    /// cannot be parsed.
    async fn isochrones(&self, request: &IsochroneRequest)
    -> Result<Vec<Isochrone>, RoutingError>;
}
