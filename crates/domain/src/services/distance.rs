//! Great-circle distances and their display form.

/// Mean Earth radius used for all distance calculations, in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Haversine distance between two points, in meters.
pub fn haversine_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().min(1.0).asin();
    EARTH_RADIUS_METERS * c
}

/// Formats a distance for display.
///
/// Under 1 km in whole meters, under 10 km with one decimal, otherwise in
/// whole kilometers. Used for live and captured distances alike.
pub fn format_distance(meters: f64) -> String {
    let meters = meters.max(0.0);
    // Bucket on the displayed precision, not the raw value.
    let tenths_of_km = (meters / 100.0).round();
    if meters.round() < 1000.0 {
        format!("{}m", meters.round() as i64)
    } else if tenths_of_km < 100.0 {
        format!("{:.1}km", tenths_of_km / 10.0)
    } else {
        format!("{}km", (meters / 1000.0).round() as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::HaversineDistance;

    const BRUSSELS: (f64, f64) = (50.8503, 4.3517);
    const ANTWERP: (f64, f64) = (51.2194, 4.4025);

    #[test]
    fn test_identical_points_are_zero() {
        for (lat, lon) in [(0.0, 0.0), BRUSSELS, (-33.86, 151.21), (90.0, 180.0)] {
            assert_eq!(haversine_meters(lat, lon, lat, lon), 0.0);
        }
    }

    #[test]
    fn test_symmetric() {
        let there = haversine_meters(BRUSSELS.0, BRUSSELS.1, ANTWERP.0, ANTWERP.1);
        let back = haversine_meters(ANTWERP.0, ANTWERP.1, BRUSSELS.0, BRUSSELS.1);
        assert_eq!(there, back);
    }

    #[test]
    fn test_known_distance() {
        let d = haversine_meters(BRUSSELS.0, BRUSSELS.1, ANTWERP.0, ANTWERP.1);
        assert!((d - 41_200.0).abs() < 500.0, "got {d}");
    }

    #[test]
    fn test_agrees_with_geo() {
        let a = geo::Point::new(BRUSSELS.1, BRUSSELS.0);
        let b = geo::Point::new(ANTWERP.1, ANTWERP.0);
        let ours = haversine_meters(BRUSSELS.0, BRUSSELS.1, ANTWERP.0, ANTWERP.1);
        let theirs = a.haversine_distance(&b);
        // geo uses a slightly larger mean radius
        assert!((ours - theirs).abs() / theirs < 1e-4);
    }

    #[test]
    fn test_antipodal_points() {
        let d = haversine_meters(0.0, 0.0, 0.0, 180.0);
        assert!((d - std::f64::consts::PI * EARTH_RADIUS_METERS).abs() < 1.0);
    }

    #[test]
    fn test_format_distance_meters() {
        assert_eq!(format_distance(0.0), "0m");
        assert_eq!(format_distance(350.4), "350m");
        assert_eq!(format_distance(999.4), "999m");
        assert_eq!(format_distance(999.6), "1.0km");
    }

    #[test]
    fn test_format_distance_kilometers() {
        assert_eq!(format_distance(1000.0), "1.0km");
        assert_eq!(format_distance(1234.0), "1.2km");
        assert_eq!(format_distance(9500.0), "9.5km");
        assert_eq!(format_distance(10_000.0), "10km");
        assert_eq!(format_distance(41_234.0), "41km");
    }

    #[test]
    fn test_format_distance_rounds_before_bucketing() {
        assert_eq!(format_distance(9949.0), "9.9km");
        assert_eq!(format_distance(9950.0), "10km");
        assert_eq!(format_distance(9999.96), "10km");
        assert_eq!(format_distance(1049.0), "1.0km");
    }

    #[test]
    fn test_format_distance_negative_clamped() {
        assert_eq!(format_distance(-5.0), "0m");
    }
}
