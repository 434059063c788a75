#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Catchment request types.
//!
//! A catchment is requested as a geocoded [`Location`] plus a
//! [`CatchmentSpec`]: either a fixed radius in miles or a travel-time
//! budget in minutes for one of the nine [`TravelProfile`]s supported by
//! the routing provider.

pub mod text;

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Smallest accepted distance radius, in miles.
pub const MIN_DISTANCE_MILES: f64 = 1.0;

/// Largest accepted distance radius, in miles.
pub const MAX_DISTANCE_MILES: f64 = 250.0;

/// Largest isochrone range the routing provider accepts, in minutes.
pub const MAX_TRAVEL_MINUTES: u32 = 60;

/// A geocoded point with the address it was resolved from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    /// Latitude (WGS84).
    pub latitude: f64,
    /// Longitude (WGS84).
    pub longitude: f64,
    /// Display address returned by the geocoder.
    pub address: String,
}

impl Location {
    /// Creates a location from coordinates and a display address.
    #[must_use]
    pub fn new(latitude: f64, longitude: f64, address: impl Into<String>) -> Self {
        Self {
            latitude,
            longitude,
            address: address.into(),
        }
    }
}

/// How the catchment radius is measured.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
pub enum CatchmentMode {
    /// Fixed radial distance in miles.
    #[strum(to_string = "Distance (miles)", serialize = "distance")]
    Distance,
    /// Travel-time isochrone in minutes.
    #[strum(to_string = "Travel time (minutes)", serialize = "travel-time")]
    TravelTime,
}

impl CatchmentMode {
    /// Parses a mode label such as `"Distance (miles)"` or `"travel-time"`.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::UnknownMode`] for any other label.
    pub fn parse(label: &str) -> Result<Self, SpecError> {
        Self::from_str(label.trim()).map_err(|_| SpecError::UnknownMode {
            label: label.to_string(),
        })
    }
}

/// Travel profiles offered for isochrone catchments.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
pub enum TravelProfile {
    #[strum(to_string = "Driving (car)", serialize = "driving-car")]
    DrivingCar,
    #[strum(
        to_string = "Driving (heavy goods vehicle)",
        serialize = "driving-hgv"
    )]
    DrivingHgv,
    #[strum(to_string = "Walking", serialize = "foot-walking")]
    Walking,
    #[strum(to_string = "Cycling (regular)", serialize = "cycling-regular")]
    CyclingRegular,
    #[strum(to_string = "Cycling (road)", serialize = "cycling-road")]
    CyclingRoad,
    #[strum(to_string = "Cycling (mountain)", serialize = "cycling-mountain")]
    CyclingMountain,
    #[strum(to_string = "Cycling (electric)", serialize = "cycling-electric")]
    CyclingElectric,
    #[strum(to_string = "Hiking", serialize = "foot-hiking")]
    Hiking,
    #[strum(to_string = "Wheelchair", serialize = "wheelchair")]
    Wheelchair,
}

impl TravelProfile {
    pub const ALL: &[Self] = &[
        Self::DrivingCar,
        Self::DrivingHgv,
        Self::Walking,
        Self::CyclingRegular,
        Self::CyclingRoad,
        Self::CyclingMountain,
        Self::CyclingElectric,
        Self::Hiking,
        Self::Wheelchair,
    ];

    /// The routing provider's profile identifier.
    #[must_use]
    pub const fn routing_profile(self) -> &'static str {
        match self {
            Self::DrivingCar => "driving-car",
            Self::DrivingHgv => "driving-hgv",
            Self::Walking => "foot-walking",
            Self::CyclingRegular => "cycling-regular",
            Self::CyclingRoad => "cycling-road",
            Self::CyclingMountain => "cycling-mountain",
            Self::CyclingElectric => "cycling-electric",
            Self::Hiking => "foot-hiking",
            Self::Wheelchair => "wheelchair",
        }
    }

    /// Looks up a profile by its display label (e.g. `"Wheelchair"`) or
    /// routing identifier (e.g. `"foot-walking"`).
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::UnknownTravelProfile`] if the label is not in
    /// the table.
    pub fn parse(label: &str) -> Result<Self, SpecError> {
        Self::from_str(label.trim()).map_err(|_| SpecError::UnknownTravelProfile {
            label: label.to_string(),
        })
    }
}

/// The shape of a requested catchment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "camelCase")]
pub enum CatchmentSpec {
    /// A geodesic circle of `miles` radius.
    Distance {
        /// Radius in miles.
        miles: f64,
    },
    /// An isochrone reachable within `minutes`.
    TravelTime {
        /// Travel budget in minutes.
        minutes: u32,
        /// How the traveller moves.
        profile: TravelProfile,
    },
}

impl CatchmentSpec {
    /// Builds a distance catchment.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::InvalidRadius`] unless `miles` is finite and
    /// within [`MIN_DISTANCE_MILES`]..=[`MAX_DISTANCE_MILES`].
    pub fn distance(miles: f64) -> Result<Self, SpecError> {
        if !miles.is_finite() || !(MIN_DISTANCE_MILES..=MAX_DISTANCE_MILES).contains(&miles) {
            return Err(SpecError::InvalidRadius {
                mode: CatchmentMode::Distance,
                radius: miles,
            });
        }
        Ok(Self::Distance { miles })
    }

    /// Builds a travel-time catchment.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError::InvalidRadius`] unless `minutes` is within
    /// `1..=MAX_TRAVEL_MINUTES`.
    pub fn travel_time(minutes: u32, profile: TravelProfile) -> Result<Self, SpecError> {
        if !(1..=MAX_TRAVEL_MINUTES).contains(&minutes) {
            return Err(SpecError::InvalidRadius {
                mode: CatchmentMode::TravelTime,
                radius: f64::from(minutes),
            });
        }
        Ok(Self::TravelTime { minutes, profile })
    }

    /// Builds a spec from loosely typed parts, as collected from a form or
    /// command line.
    ///
    /// # Errors
    ///
    /// Returns [`SpecError`] if the radius is out of range, not a whole
    /// number of minutes, or a travel-time spec has no profile.
    pub fn from_parts(
        mode: CatchmentMode,
        radius: f64,
        profile: Option<TravelProfile>,
    ) -> Result<Self, SpecError> {
        match mode {
            CatchmentMode::Distance => Self::distance(radius),
            CatchmentMode::TravelTime => {
                let profile = profile.ok_or(SpecError::MissingTravelProfile)?;
                if !radius.is_finite() || radius.fract() != 0.0 || radius < 1.0 {
                    return Err(SpecError::InvalidRadius { mode, radius });
                }
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let minutes = radius.min(f64::from(u32::MAX)) as u32;
                Self::travel_time(minutes, profile)
            }
        }
    }

    #[must_use]
    pub const fn mode(&self) -> CatchmentMode {
        match self {
            Self::Distance { .. } => CatchmentMode::Distance,
            Self::TravelTime { .. } => CatchmentMode::TravelTime,
        }
    }
}

/// Properties the routing provider returns alongside an isochrone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IsochroneProperties {
    /// Provider-computed isochrone area (square meters).
    pub area: Option<f64>,
    /// Provider-estimated population inside the isochrone.
    pub total_pop: Option<f64>,
    /// The range value (seconds) this isochrone was drawn for.
    pub value: Option<f64>,
}

/// Errors raised while building a [`CatchmentSpec`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SpecError {
    /// The radius is outside the range accepted for the mode.
    #[error("Invalid radius {radius} for mode '{mode}'")]
    InvalidRadius {
        /// The mode the radius was given for.
        mode: CatchmentMode,
        /// The rejected radius.
        radius: f64,
    },

    /// A travel-time catchment was requested without a travel profile.
    #[error("Travel-time catchments require a travel profile")]
    MissingTravelProfile,

    /// The radius mode label is not recognized.
    #[error("Unknown radius type: {label}")]
    UnknownMode {
        /// The rejected label.
        label: String,
    },

    /// The travel profile label is not in the routing table.
    #[error("Unknown travel profile: {label}")]
    UnknownTravelProfile {
        /// The rejected label.
        label: String,
    },
}
