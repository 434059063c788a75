//! Catchment geometry construction.

use std::f64::consts::TAU;

use catchment_models::{CatchmentSpec, IsochroneProperties, Location, TravelProfile};
use geo::{Coord, LineString, MultiPolygon, Polygon};

use crate::GeometryError;
use crate::projection::AzimuthalEquidistant;
use crate::routing::{IsochroneRequest, Router};

/// Meters per mile used to convert distance radii.
pub const METERS_PER_MILE: f64 = 1609.34;

/// Number of vertices used to approximate a circle.
pub const CIRCLE_SEGMENTS: usize = 64;

/// A freshly built catchment polygon.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedGeometry {
    /// Catchment polygon in WGS84 longitude/latitude.
    pub geometry: MultiPolygon<f64>,
    /// Isochrone properties, for travel-time catchments.
    pub iso_properties: Option<IsochroneProperties>,
}

/// Builds the catchment polygon for `spec` around `location`.
///
/// # Errors
///
/// * [`GeometryError::InvalidInput`] if `location` is missing, or if a
///   travel-time catchment is requested without a router
/// * [`GeometryError::Routing`] if the routing provider fails or returns
///   no isochrone
pub async fn generate_geometry(
    location: Option<&Location>,
    spec: &CatchmentSpec,
    router: Option<&dyn Router>,
) -> Result<GeneratedGeometry, GeometryError> {
    match *spec {
        CatchmentSpec::Distance { miles } => Ok(GeneratedGeometry {
            geometry: MultiPolygon(vec![draw_circle(location, miles)?]),
            iso_properties: None,
        }),
        CatchmentSpec::TravelTime { minutes, profile } => {
            let (geometry, properties) =
                draw_isochrone(location, minutes, profile, router).await?;
            Ok(GeneratedGeometry {
                geometry,
                iso_properties: Some(properties),
            })
        }
    }
}

/// Draws a circle of `radius_miles` around `location`.
///
/// The disk is buffered in an azimuthal equidistant projection centered
/// exactly on the location and each vertex is projected back to
/// longitude/latitude.
///
/// # Errors
///
/// Returns [`GeometryError::InvalidInput`] if `location` is missing or the
/// radius is not a positive finite number.
pub fn draw_circle(
    location: Option<&Location>,
    radius_miles: f64,
) -> Result<Polygon<f64>, GeometryError> {
    let location = location.ok_or_else(|| GeometryError::InvalidInput {
        message: "Invalid location.".to_string(),
    })?;

    if !radius_miles.is_finite() || radius_miles <= 0.0 {
        return Err(GeometryError::InvalidInput {
            message: format!("Invalid radius: {radius_miles} miles"),
        });
    }

    let radius_meters = radius_miles * METERS_PER_MILE;
    let projection = AzimuthalEquidistant::new(location.longitude, location.latitude);

    #[allow(clippy::cast_precision_loss)]
    let ring: Vec<Coord<f64>> = (0..CIRCLE_SEGMENTS)
        .map(|i| {
            let angle = TAU * i as f64 / CIRCLE_SEGMENTS as f64;
            projection.inverse(Coord {
                x: radius_meters * angle.cos(),
                y: radius_meters * angle.sin(),
            })
        })
        .collect();

    log::debug!(
        "Drew {radius_miles} mile circle around ({}, {})",
        location.latitude,
        location.longitude
    );

    Ok(Polygon::new(LineString::from(ring), vec![]))
}

/// Requests a travel-time isochrone around `location` and returns the
/// first feature's geometry and properties.
///
/// # Errors
///
/// * [`GeometryError::InvalidInput`] if `location` or `router` is missing
/// * [`GeometryError::Routing`] if the request fails or returns no
///   features
pub async fn draw_isochrone(
    location: Option<&Location>,
    minutes: u32,
    profile: TravelProfile,
    router: Option<&dyn Router>,
) -> Result<(MultiPolygon<f64>, IsochroneProperties), GeometryError> {
    let (Some(location), Some(router)) = (location, router) else {
        return Err(GeometryError::InvalidInput {
            message: "Invalid location or routing client not configured.".to_string(),
        });
    };

    let request = IsochroneRequest::travel_time(
        profile.routing_profile(),
        location.longitude,
        location.latitude,
        minutes.saturating_mul(60),
    );

    log::info!(
        "Requesting {minutes} minute {} isochrone for {}",
        profile.routing_profile(),
        location.address
    );

    let first = router
        .isochrones(&request)
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| crate::RoutingError::Response {
            message: "Routing provider returned no isochrone features".to_string(),
        })?;

    Ok((first.geometry, first.properties))
}
