//! Great-circle distance and rough arrival estimates

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Minutes of travel assumed per kilometre for ETA display
const MINUTES_PER_KM: f64 = 3.0;

/// Haversine distance between two `[lat, lng]` points in kilometres
pub fn distance_km(from: [f64; 2], to: [f64; 2]) -> f64 {
    let d_lat = (to[0] - from[0]).to_radians();
    let d_lng = (to[1] - from[1]).to_radians();
    let a = (d_lat / 2.0).sin().powi(2)
        + from[0].to_radians().cos() * to[0].to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_KM * c
}

/// Whole minutes to cover `distance_km`, rounded up
pub fn eta_minutes(distance_km: f64) -> u32 {
    (distance_km * MINUTES_PER_KM).ceil().max(0.0) as u32
}
