pub mod geohash;

use serde::{Deserialize, Serialize};

const EARTH_RADIUS_KM: f64 = 6_371.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }
}

/// Great-circle distance on a spherical Earth. Good enough at city scale.
pub fn haversine_km(a: &GeoPoint, b: &GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lng = (b.lng - a.lng).to_radians();

    let sin_lat = (delta_lat / 2.0).sin();
    let sin_lng = (delta_lng / 2.0).sin();

    let haversine = sin_lat * sin_lat + lat1.cos() * lat2.cos() * sin_lng * sin_lng;
    let central_angle = 2.0 * haversine.sqrt().asin();

    EARTH_RADIUS_KM * central_angle
}

#[cfg(test)]
mod tests {
    use super::{GeoPoint, haversine_km};

    #[test]
    fn zero_distance_for_same_point() {
        let p = GeoPoint {
            lat: -53.7878,
            lng: -67.7095,
        };
        let distance = haversine_km(&p, &p);
        assert!(distance < 1e-9);
    }

    #[test]
    fn rio_grande_crosstown_is_under_two_km() {
        let pickup = GeoPoint {
            lat: -53.7878,
            lng: -67.7095,
        };
        let dropoff = GeoPoint {
            lat: -53.8005,
            lng: -67.7142,
        };
        let distance = haversine_km(&pickup, &dropoff);
        assert!(distance > 1.0 && distance < 2.0);
    }

    #[test]
    fn london_to_paris_is_around_343_km() {
        let london = GeoPoint {
            lat: 51.5074,
            lng: -0.1278,
        };
        let paris = GeoPoint {
            lat: 48.8566,
            lng: 2.3522,
        };
        let distance = haversine_km(&london, &paris);
        assert!((distance - 343.0).abs() < 5.0);
    }

    #[test]
    fn nan_coordinates_are_not_finite() {
        let p = GeoPoint {
            lat: f64::NAN,
            lng: -67.7,
        };
        assert!(!p.is_finite());
    }
}
