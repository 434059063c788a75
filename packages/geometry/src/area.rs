//! Catchment area measurement.

use geo::{Area, BoundingRect, MapCoords, MultiPolygon};

use crate::projection::AlbersEqualArea;

/// Square meters in one square mile.
pub const SQ_METERS_PER_SQ_MILE: f64 = 2_589_988.11;

/// Area of `geometry` in square miles, rounded to two decimals.
///
/// The polygon is projected into an Albers equal-area projection whose
/// standard parallels are its own southern and northern bounds.
#[must_use]
pub fn area_sq_miles(geometry: &MultiPolygon<f64>) -> f64 {
    let Some(bounds) = geometry.bounding_rect() else {
        return 0.0;
    };

    let projection = AlbersEqualArea::for_bounds(bounds);
    let projected = geometry.map_coords(|coord| projection.project(coord));

    (projected.unsigned_area() / SQ_METERS_PER_SQ_MILE * 100.0).round() / 100.0
}
