/// Mean Earth radius in kilometers
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Solar irradiance near Earth in W/m^2
pub const SUN_INTENSITY: f32 = 1367.0;

/// Orthographic near plane in meters
pub const NEAR_PLANE: f32 = 0.001;

/// Orthographic far plane in meters
pub const FAR_PLANE: f32 = 10.0;

/// Decimal places for area and power output lines
pub const AREA_DECIMALS: usize = 6;
