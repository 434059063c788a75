#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Catchment areas and their enrichment.
//!
//! A [`CatchmentArea`] is created for one location and [`CatchmentSpec`],
//! gets its polygon once from [`CatchmentArea::generate_geometry`], and is
//! then enriched on demand with area, population, census variables and
//! points of interest. External services are passed in explicitly through
//! [`Collaborators`] on every call.

pub mod catchment;

pub use catchment::CatchmentArea;

use catchment_census::{CensusError, StatisticsProvider};
use catchment_census_models::{TOTAL_POPULATION_VARIABLE, VariableDescriptor};
use catchment_geocoder::{GeocodeError, Geocoder};
use catchment_geography::{BoundaryProvider, GeoError};
use catchment_geometry::GeometryError;
use catchment_geometry::routing::Router;
use catchment_models::{CatchmentSpec, Location, SpecError};
use catchment_poi::FeaturesProvider;
use strum_macros::{AsRefStr, Display};
use thiserror::Error;

/// The external service behind an [`CatchmentError::ExternalService`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Service {
    Geocoder,
    Routing,
    Boundaries,
    Statistics,
    Features,
}

/// Errors surfaced by catchment operations.
#[derive(Debug, Error)]
pub enum CatchmentError {
    /// Missing or invalid location, radius or mode, or an unconfigured
    /// client. Retrying without changing the input will fail again.
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// Unknown travel profile or unsupported variable.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Enrichment was requested before the geometry was generated.
    #[error("Catchment geometry has not been generated")]
    NotReady,

    /// An external service request failed.
    #[error("{service} service error: {source}")]
    ExternalService {
        service: Service,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl CatchmentError {
    fn external(service: Service, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::ExternalService {
            service,
            source: Box::new(source),
        }
    }

    fn missing_client(service: Service) -> Self {
        Self::InvalidInput {
            message: format!("{service} client not configured"),
        }
    }
}

impl From<SpecError> for CatchmentError {
    fn from(e: SpecError) -> Self {
        match e {
            SpecError::UnknownTravelProfile { .. } => Self::Configuration {
                message: e.to_string(),
            },
            SpecError::InvalidRadius { .. }
            | SpecError::MissingTravelProfile
            | SpecError::UnknownMode { .. } => Self::InvalidInput {
                message: e.to_string(),
            },
        }
    }
}

impl From<GeometryError> for CatchmentError {
    fn from(e: GeometryError) -> Self {
        match e {
            GeometryError::InvalidInput { message } => Self::InvalidInput { message },
            GeometryError::Routing(e) => Self::external(Service::Routing, e),
        }
    }
}

impl From<GeoError> for CatchmentError {
    fn from(e: GeoError) -> Self {
        Self::external(Service::Boundaries, e)
    }
}

impl From<CensusError> for CatchmentError {
    fn from(e: CensusError) -> Self {
        match e {
            CensusError::UnsupportedVariable { .. } => Self::Configuration {
                message: e.to_string(),
            },
            e => Self::external(Service::Statistics, e),
        }
    }
}

impl From<GeocodeError> for CatchmentError {
    fn from(e: GeocodeError) -> Self {
        Self::external(Service::Geocoder, e)
    }
}

/// The external services a catchment operation may call. Absent services
/// fail the operations that need them with
/// [`CatchmentError::InvalidInput`].
#[derive(Clone, Copy, Default)]
pub struct Collaborators<'a> {
    pub router: Option<&'a dyn Router>,
    pub boundaries: Option<&'a dyn BoundaryProvider>,
    pub statistics: Option<&'a dyn StatisticsProvider>,
    pub features: Option<&'a dyn FeaturesProvider>,
}

impl<'a> Collaborators<'a> {
    fn boundaries(&self) -> Result<&'a dyn BoundaryProvider, CatchmentError> {
        self.boundaries
            .ok_or_else(|| CatchmentError::missing_client(Service::Boundaries))
    }

    fn statistics(&self) -> Result<&'a dyn StatisticsProvider, CatchmentError> {
        self.statistics
            .ok_or_else(|| CatchmentError::missing_client(Service::Statistics))
    }

    fn features(&self) -> Result<&'a dyn FeaturesProvider, CatchmentError> {
        self.features
            .ok_or_else(|| CatchmentError::missing_client(Service::Features))
    }
}

/// Geocodes `address` into the catchment's location.
///
/// # Errors
///
/// * [`CatchmentError::InvalidInput`] if the address has no match
/// * [`CatchmentError::ExternalService`] if the geocoder fails
pub async fn geocode(geocoder: &dyn Geocoder, address: &str) -> Result<Location, CatchmentError> {
    geocoder
        .geocode(address)
        .await?
        .ok_or_else(|| CatchmentError::InvalidInput {
            message: format!("Invalid location: no match for '{address}'"),
        })
}

/// Builds a [`CatchmentSpec`] from user-facing labels: a mode label
/// (`"Distance (miles)"` or `"distance"`), a radius and, for travel-time
/// catchments, a travel profile label (`"Walking"` or `"foot-walking"`).
///
/// # Errors
///
/// * [`CatchmentError::InvalidInput`] for an unknown mode, an out-of-range
///   radius or a missing profile
/// * [`CatchmentError::Configuration`] for an unknown travel profile
pub fn parse_spec(
    mode: &str,
    radius: f64,
    profile: Option<&str>,
) -> Result<CatchmentSpec, CatchmentError> {
    let mode = catchment_models::CatchmentMode::parse(mode)?;
    let profile = profile
        .map(catchment_models::TravelProfile::parse)
        .transpose()?;
    Ok(CatchmentSpec::from_parts(mode, radius, profile)?)
}

/// Resolves variable codes against the provider's catalog for `year`.
///
/// The catalog is not fetched when only total population is requested.
///
/// # Errors
///
/// * [`CatchmentError::Configuration`] for a code absent from the catalog
/// * [`CatchmentError::ExternalService`] if the catalog cannot be fetched
pub async fn resolve_variables(
    collaborators: &Collaborators<'_>,
    codes: &[String],
    year: u16,
) -> Result<Vec<VariableDescriptor>, CatchmentError> {
    let catalog = if codes.iter().all(|c| c == TOTAL_POPULATION_VARIABLE) {
        Vec::new()
    } else {
        catchment_census::catalog::fetch_variable_catalog(collaborators.statistics()?, year).await?
    };
    Ok(catchment_census::catalog::resolve_variables(&catalog, codes)?)
}
