// SPDX-License-Identifier: BSD-3-Clause
// Copyright (c) 2026 Aleksandr Ptakhin

use crate::models::search::GeoPoint;

/// Mean Earth radius in kilometers
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Great-circle distance between two points in kilometers (haversine)
pub fn distance_km(from: GeoPoint, to: GeoPoint) -> f64 {
    let d_lat = (to.latitude - from.latitude).to_radians();
    let d_lon = (to.longitude - from.longitude).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + from.latitude.to_radians().cos()
            * to.latitude.to_radians().cos()
            * (d_lon / 2.0).sin().powi(2);

    // Rounding can push `a` slightly outside [0, 1] for antipodal points
    let a = a.clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_same_point_is_zero() {
        let seoul = GeoPoint::new(37.5665, 126.9780);
        assert_eq!(distance_km(seoul, seoul), 0.0);
    }

    #[test]
    fn test_distance_is_symmetric() {
        let seoul = GeoPoint::new(37.5665, 126.9780);
        let busan = GeoPoint::new(35.1796, 129.0756);
        assert_eq!(distance_km(seoul, busan), distance_km(busan, seoul));
    }

    #[test]
    fn test_one_degree_of_latitude() {
        let distance = distance_km(GeoPoint::new(10.0, 20.0), GeoPoint::new(11.0, 20.0));
        assert!((distance - 111.19).abs() < 1.11, "got {}", distance);
    }

    #[test]
    fn test_antipodal_points() {
        let distance = distance_km(GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 180.0));
        assert!(distance.is_finite());
        assert!((distance - PI * EARTH_RADIUS_KM).abs() < 1e-6);
    }

    #[test]
    fn test_seoul_to_busan() {
        let seoul = GeoPoint::new(37.5665, 126.9780);
        let busan = GeoPoint::new(35.1796, 129.0756);
        let distance = distance_km(seoul, busan);
        assert!((320.0..330.0).contains(&distance), "got {}", distance);
    }
}
