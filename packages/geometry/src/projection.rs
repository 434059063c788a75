//! Map projections used for catchment construction and measurement.
//!
//! Both projections work on the GRS80/WGS84 ellipsoid. Coordinates are
//! `x = longitude`, `y = latitude` in degrees on the geographic side and
//! meters on the projected side.

use geo::{Coord, Destination, Geodesic, Point, Rect};

/// Semi-major axis of the GRS80 ellipsoid, in meters.
const SEMI_MAJOR_AXIS: f64 = 6_378_137.0;

/// First eccentricity squared of the GRS80 ellipsoid.
const ECCENTRICITY_SQ: f64 = 0.006_694_380_022_90;

/// Azimuthal equidistant projection centered on a point.
///
/// Distances and azimuths from the center are true, so a circle of radius
/// `r` meters in projected space is the locus of points at geodesic
/// distance `r` from the center.
#[derive(Debug, Clone, Copy)]
pub struct AzimuthalEquidistant {
    center: Point<f64>,
}

impl AzimuthalEquidistant {
    /// Centers the projection on `(longitude, latitude)`.
    #[must_use]
    pub const fn new(longitude: f64, latitude: f64) -> Self {
        Self {
            center: Point(Coord {
                x: longitude,
                y: latitude,
            }),
        }
    }

    /// Maps projected meters (`x` east, `y` north) back to longitude and
    /// latitude.
    #[must_use]
    pub fn inverse(&self, projected: Coord<f64>) -> Coord<f64> {
        let distance = projected.x.hypot(projected.y);
        if distance == 0.0 {
            return self.center.0;
        }
        // Azimuth measured clockwise from north.
        let bearing = projected.x.atan2(projected.y).to_degrees();
        Geodesic.destination(self.center, bearing, distance).0
    }
}

/// Albers conic equal-area projection.
#[derive(Debug, Clone, Copy)]
pub struct AlbersEqualArea {
    lon_0: f64,
    kind: AlbersKind,
}

#[derive(Debug, Clone, Copy)]
enum AlbersKind {
    Conic { n: f64, c: f64, rho_0: f64 },
    // Standard parallels symmetric about the equator collapse the cone
    // into a cylinder.
    Cylindrical,
}

impl AlbersEqualArea {
    /// Builds the projection from two standard parallels, a latitude of
    /// origin and a central meridian (all in degrees).
    #[must_use]
    pub fn new(lat_1: f64, lat_2: f64, lat_0: f64, lon_0: f64) -> Self {
        let phi_1 = lat_1.to_radians();
        let phi_2 = lat_2.to_radians();

        let m_1 = m(phi_1);
        let q_1 = q(phi_1.sin());

        let n = if (phi_1 - phi_2).abs() > 1e-10 {
            let m_2 = m(phi_2);
            let q_2 = q(phi_2.sin());
            (m_1.powi(2) - m_2.powi(2)) / (q_2 - q_1)
        } else {
            phi_1.sin()
        };

        let kind = if n.abs() < 1e-10 {
            AlbersKind::Cylindrical
        } else {
            let c = n.mul_add(q_1, m_1.powi(2));
            let rho_0 = rho(c, n, q(lat_0.to_radians().sin()));
            AlbersKind::Conic { n, c, rho_0 }
        };

        Self {
            lon_0: lon_0.to_radians(),
            kind,
        }
    }

    /// Fits the projection to a bounding box: the standard parallels are
    /// the box's southern and northern edges, the central meridian is its
    /// middle longitude and the origin is the equator.
    #[must_use]
    pub fn for_bounds(bounds: Rect<f64>) -> Self {
        let lon_0 = f64::midpoint(bounds.min().x, bounds.max().x);
        Self::new(bounds.min().y, bounds.max().y, 0.0, lon_0)
    }

    /// Projects longitude/latitude degrees to meters.
    #[must_use]
    pub fn project(&self, coord: Coord<f64>) -> Coord<f64> {
        let lambda = coord.x.to_radians() - self.lon_0;
        let q = q(coord.y.to_radians().sin());

        match self.kind {
            AlbersKind::Conic { n, c, rho_0 } => {
                let rho = rho(c, n, q);
                let theta = n * lambda;
                Coord {
                    x: rho * theta.sin(),
                    y: rho.mul_add(-theta.cos(), rho_0),
                }
            }
            AlbersKind::Cylindrical => Coord {
                x: SEMI_MAJOR_AXIS * lambda,
                y: SEMI_MAJOR_AXIS * q / 2.0,
            },
        }
    }
}

fn rho(c: f64, n: f64, q: f64) -> f64 {
    SEMI_MAJOR_AXIS * n.mul_add(-q, c).max(0.0).sqrt() / n
}

/// Authalic `q` as a function of `sin(phi)`.
fn q(sin_phi: f64) -> f64 {
    let e = ECCENTRICITY_SQ.sqrt();
    let e_sin = e * sin_phi;
    (1.0 - ECCENTRICITY_SQ)
        * (sin_phi / e_sin.mul_add(-e_sin, 1.0)
            - (1.0 / (2.0 * e)) * ((1.0 - e_sin) / (1.0 + e_sin)).ln())
}

fn m(phi: f64) -> f64 {
    let e_sin = ECCENTRICITY_SQ.sqrt() * phi.sin();
    phi.cos() / e_sin.mul_add(-e_sin, 1.0).sqrt()
}
