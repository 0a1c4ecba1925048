//! Deterministic solver for tests: sunrise and sunset at fixed wall-clock times, every other
//! crossing four minutes further out per degree of zenith.

use crate::location::Location;
use crate::solar::{zenith, SolarModel};
use crate::symbol::Side;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeDelta, TimeZone, Utc};

pub fn at(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
}

/// 2024-03-21 in Jerusalem, +02:00.
pub fn fixed_day() -> (NaiveDate, Location) {
    let date = NaiveDate::from_ymd_opt(2024, 3, 21).unwrap();
    let location = Location::new(
        31.7683,
        35.2137,
        754.0,
        FixedOffset::east_opt(2 * 3600).unwrap(),
    )
    .unwrap();
    (date, location)
}

pub struct FixedDay {
    sunrise: NaiveTime,
    sunset: NaiveTime,
    /// Deepest zenith the sun reaches; crossings beyond it do not happen.
    limit: Option<f64>,
}

impl FixedDay {
    pub fn new(sunrise: NaiveTime, sunset: NaiveTime) -> Self {
        Self {
            sunrise,
            sunset,
            limit: None,
        }
    }

    pub fn twelve_hours() -> Self {
        Self::new(at(6, 0), at(18, 0))
    }

    /// Simulate a white night: the sun never sinks past `zenith`.
    pub fn with_limit(mut self, zenith: f64) -> Self {
        self.limit = Some(zenith);
        self
    }
}

impl SolarModel for FixedDay {
    fn solve(
        &self,
        date: NaiveDate,
        location: &Location,
        zenith_deg: f64,
        side: Side,
    ) -> Option<DateTime<Utc>> {
        if self.limit.is_some_and(|limit| zenith_deg > limit) {
            return None;
        }
        let event = match side {
            Side::Morning => self.sunrise,
            Side::Evening => self.sunset,
        };
        let local = location
            .tz_offset
            .from_local_datetime(&date.and_time(event))
            .single()?;
        let away = TimeDelta::milliseconds(((zenith_deg - zenith::VISIBLE) * 240_000.0).round() as i64);
        let t = match side {
            Side::Morning => local - away,
            Side::Evening => local + away,
        };
        Some(t.with_timezone(&Utc))
    }
}
