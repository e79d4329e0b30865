//! Distance, bearing and unit helpers over a spherical Earth

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

pub const EARTH_RADIUS_KM: f64 = 6371.0;
pub const KMH_TO_KNOTS: f64 = 0.539957;
pub const KM_PER_NAUTICAL_MILE: f64 = 1.852;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    /// Build a coordinate, rejecting NaN/infinite values and anything outside
    /// [-90, 90] latitude or [-180, 180] longitude.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, EngineError> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude)
            || !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude)
        {
            return Err(EngineError::InvalidCoordinate { latitude, longitude });
        }
        Ok(Self { latitude, longitude })
    }

    /// Google Maps link for this point, as shown next to each logged waypoint
    pub fn maps_link(&self) -> String {
        format!("https://www.google.com/maps?q={},{}", self.latitude, self.longitude)
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.6}, {:.6}", self.latitude, self.longitude)
    }
}

/// Great-circle distance in meters using the haversine formula.
///
/// The haversine term is clamped to [0, 1] so rounding near antipodal or polar
/// points cannot push `sqrt(1 - a)` into NaN.
pub fn distance_meters(a: &Coordinate, b: &Coordinate) -> f64 {
    if a == b {
        return 0.0;
    }

    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let delta_lat = (b.latitude - a.latitude).to_radians();
    let delta_lon = (b.longitude - a.longitude).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    let h = h.clamp(0.0, 1.0);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_KM * 1000.0 * c
}

/// Initial heading (bearing) from `from` to `to` in degrees (0 = North, 90 = East).
pub fn initial_bearing_deg(from: &Coordinate, to: &Coordinate) -> f64 {
    let lat1_rad = from.latitude.to_radians();
    let lat2_rad = to.latitude.to_radians();
    let dlon_rad = (to.longitude - from.longitude).to_radians();

    let y = dlon_rad.sin() * lat2_rad.cos();
    let x = lat1_rad.cos() * lat2_rad.sin() - lat1_rad.sin() * lat2_rad.cos() * dlon_rad.cos();
    normalize_0_360(y.atan2(x).to_degrees())
}

pub fn normalize_0_360(angle: f64) -> f64 {
    (angle % 360.0 + 360.0) % 360.0
}

pub fn mps_to_kmh(speed_mps: f64) -> f64 {
    speed_mps * 3.6
}

pub fn kmh_to_knots(speed_kmh: f64) -> f64 {
    speed_kmh * KMH_TO_KNOTS
}

pub fn km_to_nautical_miles(km: f64) -> f64 {
    km / KM_PER_NAUTICAL_MILE
}
