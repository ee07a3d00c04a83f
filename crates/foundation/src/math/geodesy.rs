/// WGS84 semi-major axis (meters). Also the sphere radius of Web Mercator.
pub const WGS84_A: f64 = 6_378_137.0;

/// Latitude limit of the Web Mercator square (degrees).
pub const WEB_MERCATOR_MAX_LAT: f64 = 85.051_128_779_806_59;

/// Half the Web Mercator extent along either axis (meters).
pub const WEB_MERCATOR_HALF_EXTENT: f64 = std::f64::consts::PI * WGS84_A;

/// Inverse spherical Mercator: projected meters to (lon, lat) degrees.
pub fn web_mercator_to_lon_lat(x: f64, y: f64) -> (f64, f64) {
    let lon = (x / WGS84_A).to_degrees();
    let lat = (2.0 * (y / WGS84_A).exp().atan() - std::f64::consts::FRAC_PI_2).to_degrees();
    (lon, lat)
}

/// Forward spherical Mercator. Latitude is clamped to the projection limit.
pub fn lon_lat_to_web_mercator(lon_deg: f64, lat_deg: f64) -> (f64, f64) {
    let lat = lat_deg.clamp(-WEB_MERCATOR_MAX_LAT, WEB_MERCATOR_MAX_LAT);
    let x = WGS84_A * lon_deg.to_radians();
    let y = WGS84_A * (std::f64::consts::FRAC_PI_4 + lat.to_radians() / 2.0).tan().ln();
    (x, y)
}
