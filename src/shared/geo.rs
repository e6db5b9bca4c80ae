use serde::{Deserialize, Serialize};

const LATITUDE_DISTANCE: f64 = 110_540.0;
const LONGITUDE_DISTANCE: f64 = 111_320.0;

/// A WGS84 coordinate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Beeline distance in meters, using an equirectangular approximation.
    /// Good enough for footpath ranges, not for continental distances.
    pub fn distance_to(&self, other: &Coordinate) -> f64 {
        let mean_latitude = (self.latitude + other.latitude) / 2.0;
        let dx = (self.longitude - other.longitude)
            * LONGITUDE_DISTANCE
            * mean_latitude.to_radians().cos();
        let dy = (self.latitude - other.latitude) * LATITUDE_DISTANCE;
        (dx * dx + dy * dy).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_to_self_is_zero() {
        let coordinate = Coordinate::new(47.3769, 8.5417);
        assert_eq!(coordinate.distance_to(&coordinate), 0.0);
    }

    #[test]
    fn distance_is_symmetric() {
        let a = Coordinate::new(47.3769, 8.5417);
        let b = Coordinate::new(47.3780, 8.5400);
        assert!((a.distance_to(&b) - b.distance_to(&a)).abs() < 1e-9);
    }

    #[test]
    fn one_latitude_degree_is_about_110km() {
        let a = Coordinate::new(0.0, 0.0);
        let b = Coordinate::new(1.0, 0.0);
        let distance = a.distance_to(&b);
        assert!((distance - 110_540.0).abs() < 1_000.0);
    }
}
