use serde::{Deserialize, Serialize};
use std::fmt;

/// Metres per degree under the flat-earth approximation used by every
/// spatial component (interpolation, correlation, concentration grid).
pub const METERS_PER_DEGREE: f64 = 111_000.0;

/// Kilometres per degree, same approximation.
pub const KM_PER_DEGREE: f64 = 111.0;

/// A WGS84 latitude/longitude pair in decimal degrees.
///
/// # Examples
///
/// ```
/// use flood_risk_engine::core::geo::GeoPoint;
///
/// let a = GeoPoint::new(51.5, -0.1);
/// let b = GeoPoint::new(51.5, -0.1 + 0.01);
/// assert!((a.planar_distance_m(&b) - 1110.0).abs() < 1e-6);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Both coordinates are finite and inside the valid degree ranges.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Euclidean distance in degree space.
    pub fn degree_distance(&self, other: &GeoPoint) -> f64 {
        let dlat = self.latitude - other.latitude;
        let dlon = self.longitude - other.longitude;
        (dlat * dlat + dlon * dlon).sqrt()
    }

    /// Planar distance in metres (`degrees × 111,000`).
    pub fn planar_distance_m(&self, other: &GeoPoint) -> f64 {
        self.degree_distance(other) * METERS_PER_DEGREE
    }

    /// Planar distance in kilometres (`degrees × 111`).
    pub fn planar_distance_km(&self, other: &GeoPoint) -> f64 {
        self.degree_distance(other) * KM_PER_DEGREE
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.4}, {:.4})", self.latitude, self.longitude)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_planar_distance_along_longitude() {
        let a = GeoPoint::new(51.5, -0.1);
        let b = GeoPoint::new(51.5, -0.09);
        assert_relative_eq!(a.planar_distance_m(&b), 1110.0, epsilon = 1e-6);
        assert_relative_eq!(a.planar_distance_km(&b), 1.11, epsilon = 1e-9);
    }

    #[test]
    fn test_distance_is_symmetric() {
        let a = GeoPoint::new(51.52, -0.12);
        let b = GeoPoint::new(51.48, -0.05);
        assert_eq!(a.planar_distance_m(&b), b.planar_distance_m(&a));
    }

    #[test]
    fn test_validity() {
        assert!(GeoPoint::new(51.5, -0.1).is_valid());
        assert!(!GeoPoint::new(f64::NAN, 0.0).is_valid());
        assert!(!GeoPoint::new(95.0, 0.0).is_valid());
    }
}
