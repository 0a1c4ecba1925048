//! Runtime values and the result of evaluating a formula.

use chrono::{DateTime, FixedOffset, TimeDelta, Utc};
use std::fmt;
use thiserror::Error;

/// Why a formula has no time on a given date and location. This is a normal outcome, not a
/// failure: polar days, missing references and empty branches all end up here.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum Undefined {
    #[error("the sun does not reach zenith {zenith}° on this date")]
    NoCrossing { zenith: f64 },
    #[error("no solar transit on this date")]
    NoTransit,
    #[error("day start is not before day end")]
    DegenerateDay,
    #[error("unknown reference `@{0}`")]
    UnknownReference(String),
    #[error("reference cycle through `@{0}`")]
    ReferenceCycle(String),
    #[error("references nested deeper than {0}")]
    DepthExceeded(usize),
    #[error("division by zero")]
    DivisionByZero,
    #[error("{0} does not exist in this year")]
    InvalidDate(String),
    #[error("clock time {0} does not exist on this date")]
    InvalidClock(String),
    #[error("no branch of the condition applies")]
    NoBranch,
    #[error("base `{0}` is not registered")]
    UnknownBase(String),
    #[error("time arithmetic out of range")]
    Overflow,
    #[error("expected {expected}, found {found}")]
    Mismatch {
        expected: &'static str,
        found: String,
    },
}

/// Intermediate value while walking a tree.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Instant(DateTime<Utc>),
    Duration(TimeDelta),
    Number(f64),
    Angle(f64),
    Bool(bool),
    Text(String),
}

impl Value {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Instant(_) => "time",
            Value::Duration(_) => "duration",
            Value::Number(_) => "number",
            Value::Angle(_) => "angle",
            Value::Bool(_) => "condition",
            Value::Text(_) => "text",
        }
    }

    fn mismatch(&self, expected: &'static str) -> Undefined {
        Undefined::Mismatch {
            expected,
            found: self.kind_name().to_string(),
        }
    }

    /// Human-readable form; instants are shown in `offset`.
    pub fn display_in(&self, offset: &FixedOffset) -> String {
        match self {
            Value::Instant(t) => t.with_timezone(offset).format("%H:%M:%S").to_string(),
            Value::Duration(d) => {
                let secs = d.num_seconds();
                let sign = if secs < 0 { "-" } else { "" };
                let secs = secs.abs();
                format!("{sign}{}h {:02}m {:02}s", secs / 3600, secs / 60 % 60, secs % 60)
            }
            Value::Number(n) => n.to_string(),
            Value::Angle(a) => format!("{a}°"),
            Value::Bool(b) => b.to_string(),
            Value::Text(t) => format!("{t:?}"),
        }
    }

    pub fn as_instant(&self) -> Result<DateTime<Utc>, Undefined> {
        match self {
            Value::Instant(t) => Ok(*t),
            other => Err(other.mismatch("time")),
        }
    }

    pub fn as_duration(&self) -> Result<TimeDelta, Undefined> {
        match self {
            Value::Duration(d) => Ok(*d),
            other => Err(other.mismatch("duration")),
        }
    }

    pub fn as_bool(&self) -> Result<bool, Undefined> {
        match self {
            Value::Bool(b) => Ok(*b),
            other => Err(other.mismatch("condition")),
        }
    }
}

/// Outcome of evaluating a formula: a time in the location's offset, or why there is none.
#[derive(Clone, Debug, PartialEq)]
pub enum TimeResult {
    Instant(DateTime<FixedOffset>),
    Undefined(Undefined),
}

impl TimeResult {
    pub fn instant(&self) -> Option<DateTime<FixedOffset>> {
        match self {
            TimeResult::Instant(t) => Some(*t),
            TimeResult::Undefined(_) => None,
        }
    }

    pub fn is_defined(&self) -> bool {
        matches!(self, TimeResult::Instant(_))
    }

    pub fn undefined(&self) -> Option<&Undefined> {
        match self {
            TimeResult::Instant(_) => None,
            TimeResult::Undefined(u) => Some(u),
        }
    }
}

impl fmt::Display for TimeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeResult::Instant(t) => write!(f, "{}", t.format("%Y-%m-%d %H:%M:%S %:z")),
            TimeResult::Undefined(u) => write!(f, "undefined ({u})"),
        }
    }
}

/// Minutes as a duration, rounded to the millisecond.
pub(crate) fn minutes(m: f64) -> Result<TimeDelta, Undefined> {
    let ms = (m * 60_000.0).round();
    if !ms.is_finite() || ms.abs() > i64::MAX as f64 / 2.0 {
        return Err(Undefined::Overflow);
    }
    TimeDelta::try_milliseconds(ms as i64).ok_or(Undefined::Overflow)
}

/// Duration in fractional minutes.
pub(crate) fn as_minutes(d: TimeDelta) -> f64 {
    d.num_milliseconds() as f64 / 60_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minute_conversion() {
        assert_eq!(minutes(72.0).unwrap(), TimeDelta::minutes(72));
        assert_eq!(minutes(86.4).unwrap(), TimeDelta::seconds(5184));
        assert_eq!(as_minutes(TimeDelta::seconds(90)), 1.5);
        assert_eq!(minutes(f64::INFINITY), Err(Undefined::Overflow));
    }

    #[test]
    fn accessors_report_mismatch() {
        assert_eq!(
            Value::Number(1.0).as_instant(),
            Err(Undefined::Mismatch {
                expected: "time",
                found: "number".into()
            })
        );
        assert_eq!(Value::Bool(true).as_bool(), Ok(true));
        assert_eq!(
            Value::Angle(3.0).as_duration().unwrap_err().to_string(),
            "expected duration, found angle"
        );
    }

    #[test]
    fn values_display_in_local_time() {
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let t = DateTime::parse_from_rfc3339("2024-03-21T03:39:12Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(Value::Instant(t).display_in(&offset), "05:39:12");
        assert_eq!(
            Value::Duration(TimeDelta::seconds(12 * 3600 + 5 * 60 + 7)).display_in(&offset),
            "12h 05m 07s"
        );
        assert_eq!(Value::Duration(TimeDelta::minutes(-90)).display_in(&offset), "-1h 30m 00s");
        assert_eq!(Value::Text("spring".into()).display_in(&offset), "\"spring\"");
    }

    #[test]
    fn display() {
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let t = DateTime::parse_from_rfc3339("2024-03-21T05:39:12+02:00")
            .unwrap()
            .with_timezone(&offset);
        assert_eq!(
            TimeResult::Instant(t).to_string(),
            "2024-03-21 05:39:12 +02:00"
        );
        assert_eq!(
            TimeResult::Undefined(Undefined::NoBranch).to_string(),
            "undefined (no branch of the condition applies)"
        );
    }
}
