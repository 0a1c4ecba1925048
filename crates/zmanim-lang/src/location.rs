//! Observer location: coordinates, elevation and the fixed UTC offset results are reported in.

use crate::error::LocationError;
use chrono::FixedOffset;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Location {
    /// Degrees north, -90..=90.
    pub latitude: f64,
    /// Degrees east, -180..=180.
    pub longitude: f64,
    /// Metres above sea level. Negative values (Dead Sea) are allowed.
    pub elevation_m: f64,
    pub tz_offset: FixedOffset,
}

impl Location {
    pub fn new(
        latitude: f64,
        longitude: f64,
        elevation_m: f64,
        tz_offset: FixedOffset,
    ) -> Result<Self, LocationError> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(LocationError::Latitude(latitude));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(LocationError::Longitude(longitude));
        }
        if !elevation_m.is_finite() {
            return Err(LocationError::Elevation(elevation_m));
        }
        Ok(Self {
            latitude,
            longitude,
            elevation_m,
            tz_offset,
        })
    }

    pub fn is_northern(&self) -> bool {
        self.latitude >= 0.0
    }
}
