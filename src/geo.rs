//! Great-circle distance between geographic coordinates

use crate::types::transaction::GeoPoint;

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance between two points, in kilometers.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let dlat = (b.latitude - a.latitude).to_radians();
    let dlon = (b.longitude - a.longitude).to_radians();

    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * h.sqrt().asin() * EARTH_RADIUS_KM
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_distance() {
        let p = GeoPoint::new(-94.14, 24.80);
        assert_eq!(haversine_km(p, p), 0.0);
    }

    #[test]
    fn test_paris_to_london() {
        let paris = GeoPoint::new(2.3522, 48.8566);
        let london = GeoPoint::new(-0.1276, 51.5072);
        let distance = haversine_km(paris, london);
        assert!((distance - 343.5).abs() < 2.0, "got {distance}");
    }

    #[test]
    fn test_symmetry() {
        let a = GeoPoint::new(84.52, -58.38);
        let b = GeoPoint::new(-54.50, -31.37);
        assert!((haversine_km(a, b) - haversine_km(b, a)).abs() < 1e-9);
    }
}
