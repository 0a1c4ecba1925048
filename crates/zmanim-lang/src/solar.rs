//! Astronomical solver: when does the sun cross a given zenith angle on a local date.
//!
//! [NoaaSolar] uses the NOAA low-precision solar position (declination and equation of time
//! from the Julian century), refined by re-evaluating at the estimated event time.

use crate::location::Location;
use crate::symbol::Side;
use chrono::{DateTime, Datelike, NaiveDate, TimeDelta, TimeZone, Utc};

/// Zenith angles in degrees.
pub mod zenith {
    /// Upper limb on the horizon, with standard refraction.
    pub const VISIBLE: f64 = 90.833;
    /// Centre of the disc on the mathematical horizon.
    pub const GEOMETRIC: f64 = 90.0;
    pub const CIVIL: f64 = 96.0;
    pub const NAUTICAL: f64 = 102.0;
    pub const ASTRONOMICAL: f64 = 108.0;
}

/// Source of sun crossing times. Implementations must be deterministic.
pub trait SolarModel: Send + Sync {
    /// Morning or evening crossing of `zenith` degrees on the local `date`, or `None` when
    /// the sun does not reach that angle that day.
    fn solve(
        &self,
        date: NaiveDate,
        location: &Location,
        zenith: f64,
        side: Side,
    ) -> Option<DateTime<Utc>>;

    /// Upper meridian transit. Models without one fall back to the sunrise/sunset midpoint.
    fn transit(&self, _date: NaiveDate, _location: &Location) -> Option<DateTime<Utc>> {
        None
    }

    /// Lower meridian transit following the upper transit of `date`.
    fn anti_transit(&self, _date: NaiveDate, _location: &Location) -> Option<DateTime<Utc>> {
        None
    }

    /// Extra depression in degrees of the visible horizon for the observer's elevation.
    fn horizon_dip(&self, _location: &Location) -> f64 {
        0.0
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SolverConfig {
    /// Lower visible sunrise/sunset by the horizon dip at the location's elevation.
    pub elevation_dip: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            elevation_dip: true,
        }
    }
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NoaaSolar {
    pub config: SolverConfig,
}

/// Polar radius in kilometres used for the horizon dip.
const EARTH_RADIUS_KM: f64 = 6356.9;
const MAX_PASSES: usize = 8;
/// One second, in minutes.
const CONVERGED: f64 = 1.0 / 60.0;

/// What the iteration is solving for, in minutes after 00:00 UTC of the anchor day.
#[derive(Clone, Copy, Debug)]
enum Event {
    Crossing { zenith: f64, side: Side },
    Transit,
    AntiTransit,
}

impl NoaaSolar {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    fn event(&self, date: NaiveDate, location: &Location, event: Event) -> Option<DateTime<Utc>> {
        let anchor = anchor_day(date, location)?;
        let jd0 = julian_day(anchor);
        let mut t = initial_guess(location.longitude, event);
        for pass in 0..MAX_PASSES {
            let (decl, eot) = sun_position(jd0 + t / 1440.0);
            let next = event_minutes(location, decl, eot, event)?;
            log::trace!("{event:?} pass {pass}: {t:.4} -> {next:.4} min (decl {decl:.4}, eot {eot:.4})");
            let delta = (next - t).abs();
            t = next;
            if delta < CONVERGED {
                return at_minutes(anchor, t);
            }
        }
        log::warn!(
            "{event:?} on {date} at ({}, {}) did not converge after {MAX_PASSES} passes",
            location.latitude,
            location.longitude
        );
        at_minutes(anchor, t)
    }
}

impl SolarModel for NoaaSolar {
    fn solve(
        &self,
        date: NaiveDate,
        location: &Location,
        zenith: f64,
        side: Side,
    ) -> Option<DateTime<Utc>> {
        self.event(date, location, Event::Crossing { zenith, side })
    }

    fn transit(&self, date: NaiveDate, location: &Location) -> Option<DateTime<Utc>> {
        self.event(date, location, Event::Transit)
    }

    fn anti_transit(&self, date: NaiveDate, location: &Location) -> Option<DateTime<Utc>> {
        self.event(date, location, Event::AntiTransit)
    }

    fn horizon_dip(&self, location: &Location) -> f64 {
        if self.config.elevation_dip {
            horizon_dip(location.elevation_m)
        } else {
            0.0
        }
    }
}

/// Depression of the sea horizon in degrees seen from `elevation_m`; zero at or below sea level.
pub fn horizon_dip(elevation_m: f64) -> f64 {
    if elevation_m <= 0.0 {
        return 0.0;
    }
    let h = elevation_m / 1000.0;
    (EARTH_RADIUS_KM / (EARTH_RADIUS_KM + h)).acos().to_degrees()
}

/// UTC day whose 00:00 starts the minute count. Shifted by a day when local mean noon would
/// otherwise land on a neighbouring local date (offsets far from the longitude's zone).
fn anchor_day(date: NaiveDate, location: &Location) -> Option<NaiveDate> {
    let mean_noon_utc = 720.0 - 4.0 * location.longitude;
    let local = mean_noon_utc + location.tz_offset.local_minus_utc() as f64 / 60.0;
    if local >= 1440.0 {
        date.pred_opt()
    } else if local < 0.0 {
        date.succ_opt()
    } else {
        Some(date)
    }
}

/// Julian day at 00:00 UTC.
fn julian_day(date: NaiveDate) -> f64 {
    // 2000-01-01 is day 730120 from the common era.
    2451544.5 + (date.num_days_from_ce() - 730_120) as f64
}

fn initial_guess(longitude: f64, event: Event) -> f64 {
    let noon = 720.0 - 4.0 * longitude;
    match event {
        Event::Crossing {
            side: Side::Morning,
            ..
        } => noon - 360.0,
        Event::Crossing {
            side: Side::Evening,
            ..
        } => noon + 360.0,
        Event::Transit => noon,
        Event::AntiTransit => noon + 720.0,
    }
}

/// Minutes after anchor 00:00 UTC for `event`, given the sun's declination and the equation
/// of time (minutes) near that moment.
fn event_minutes(location: &Location, decl: f64, eot: f64, event: Event) -> Option<f64> {
    let lon = location.longitude;
    match event {
        Event::Transit => Some(720.0 - 4.0 * lon - eot),
        Event::AntiTransit => Some(1440.0 - 4.0 * lon - eot),
        Event::Crossing { zenith, side } => {
            let h = hour_angle(location.latitude, decl, zenith)?;
            Some(match side {
                Side::Morning => 720.0 - 4.0 * (lon + h) - eot,
                Side::Evening => 720.0 - 4.0 * (lon - h) - eot,
            })
        }
    }
}

/// Hour angle in degrees at which the sun stands at `zenith`; `None` if it never does.
fn hour_angle(latitude: f64, decl: f64, zenith: f64) -> Option<f64> {
    let lat = latitude.to_radians();
    let decl = decl.to_radians();
    let cos_h = (zenith.to_radians().cos() - lat.sin() * decl.sin()) / (lat.cos() * decl.cos());
    if !cos_h.is_finite() || cos_h.abs() > 1.0 {
        return None;
    }
    Some(cos_h.acos().to_degrees())
}

/// Declination (degrees) and equation of time (minutes) at Julian day `jd`.
fn sun_position(jd: f64) -> (f64, f64) {
    let t = (jd - 2451545.0) / 36525.0;

    let l0 = (280.46646 + t * (36000.76983 + t * 0.0003032)).rem_euclid(360.0);
    let m = 357.52911 + t * (35999.05029 - 0.0001537 * t);
    let e = 0.016708634 - t * (0.000042037 + 0.0000001267 * t);

    let mr = m.to_radians();
    let center = mr.sin() * (1.914602 - t * (0.004817 + 0.000014 * t))
        + (2.0 * mr).sin() * (0.019993 - 0.000101 * t)
        + (3.0 * mr).sin() * 0.000289;
    let true_long = l0 + center;
    let omega = (125.04 - 1934.136 * t).to_radians();
    let lambda = (true_long - 0.00569 - 0.00478 * omega.sin()).to_radians();

    let eps0 = 23.0 + (26.0 + (21.448 - t * (46.815 + t * (0.00059 - t * 0.001813))) / 60.0) / 60.0;
    let eps = (eps0 + 0.00256 * omega.cos()).to_radians();

    let decl = (eps.sin() * lambda.sin()).asin().to_degrees();

    let y = (eps / 2.0).tan().powi(2);
    let l0r = l0.to_radians();
    let eot = y * (2.0 * l0r).sin() - 2.0 * e * mr.sin()
        + 4.0 * e * y * mr.sin() * (2.0 * l0r).cos()
        - 0.5 * y * y * (4.0 * l0r).sin()
        - 1.25 * e * e * (2.0 * mr).sin();
    (decl, 4.0 * eot.to_degrees())
}

fn at_minutes(anchor: NaiveDate, minutes: f64) -> Option<DateTime<Utc>> {
    let ms = (minutes * 60_000.0).round();
    if !ms.is_finite() {
        return None;
    }
    let midnight = Utc.from_utc_datetime(&anchor.and_hms_opt(0, 0, 0)?);
    midnight.checked_add_signed(TimeDelta::milliseconds(ms as i64))
}
