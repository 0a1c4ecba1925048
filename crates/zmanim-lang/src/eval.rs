//! Evaluator: walks a compiled tree against one date and location.
//!
//! Every step returns `Result<Value, Undefined>` so that an undefined sub-expression makes the
//! whole formula undefined through `?`. `fallback` is the only node that catches it.

use crate::base_registry::{default_bases, BaseRegistry};
use crate::ir::{BinOp, Call, CmpOp, DayBase, Dir, Expr, Literal};
use crate::lexer::{ClockTime, DayMonth};
use crate::location::Location;
use crate::solar::{zenith, NoaaSolar, SolarModel, SolverConfig};
use crate::symbol::{Base, Direction, Primitive, Side, Variable};
use crate::value::{as_minutes, minutes, TimeResult, Undefined, Value};
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeDelta, TimeZone, Utc};
use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::HashMap;

/// Deepest chain of `@references` followed before giving up.
pub const MAX_REFERENCE_DEPTH: usize = 64;

static DEFAULT_SOLVER: NoaaSolar = NoaaSolar {
    config: SolverConfig { elevation_dip: true },
};

/// Named formulas that `@name` can refer to.
pub trait FormulaLookup {
    fn lookup(&self, name: &str) -> Option<Cow<'_, Expr>>;
}

/// No named formulas; every reference is unknown.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoFormulas;

impl FormulaLookup for NoFormulas {
    fn lookup(&self, _name: &str) -> Option<Cow<'_, Expr>> {
        None
    }
}

impl FormulaLookup for HashMap<String, Expr> {
    fn lookup(&self, name: &str) -> Option<Cow<'_, Expr>> {
        self.get(name).map(Cow::Borrowed)
    }
}

/// Adapter for a closure, e.g. one that reads formulas from a caller-owned store.
pub struct LookupFn<F>(pub F);

impl<F> FormulaLookup for LookupFn<F>
where
    F: Fn(&str) -> Option<Expr>,
{
    fn lookup(&self, name: &str) -> Option<Cow<'_, Expr>> {
        (self.0)(name).map(Cow::Owned)
    }
}

/// Everything a formula may read. Built per evaluation and never mutated.
#[derive(Clone, Copy)]
pub struct Environment<'a> {
    pub date: NaiveDate,
    pub location: &'a Location,
    pub bases: &'a BaseRegistry,
    pub solver: &'a dyn SolarModel,
    pub formulas: &'a dyn FormulaLookup,
}

impl<'a> Environment<'a> {
    /// Environment with the built-in bases and the NOAA solver.
    pub fn new(date: NaiveDate, location: &'a Location, formulas: &'a dyn FormulaLookup) -> Self {
        Self {
            date,
            location,
            bases: default_bases(),
            solver: &DEFAULT_SOLVER,
            formulas,
        }
    }

    pub fn with_solver(mut self, solver: &'a dyn SolarModel) -> Self {
        self.solver = solver;
        self
    }

    pub fn with_bases(mut self, bases: &'a BaseRegistry) -> Self {
        self.bases = bases;
        self
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = date;
        self
    }
}

/// Evaluate `tree` in `env`. The instant is reported in the location's offset.
pub fn evaluate_in(tree: &Expr, env: &Environment<'_>) -> TimeResult {
    Evaluator::new(env).run(tree)
}

/// One intermediate result: a solar event, function call, reference or base boundary.
#[derive(Clone, Debug, PartialEq)]
pub struct Step {
    /// Canonical text of the sub-expression, or `<base> start` / `<base> end`.
    pub label: String,
    pub value: Result<Value, Undefined>,
}

/// Result of [evaluate_with_breakdown]: the outcome and the steps that led to it, each listed
/// once, in the order they were first completed.
#[derive(Clone, Debug, PartialEq)]
pub struct Breakdown {
    pub result: TimeResult,
    pub steps: Vec<Step>,
}

impl Breakdown {
    pub fn step(&self, label: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.label == label)
    }
}

/// Like [evaluate_in], but also records every intermediate value.
pub fn evaluate_with_breakdown(tree: &Expr, env: &Environment<'_>) -> Breakdown {
    let mut evaluator = Evaluator::new(env);
    evaluator.steps = Some(Vec::new());
    let result = evaluator.run(tree);
    Breakdown {
        result,
        steps: evaluator.steps.unwrap_or_default(),
    }
}

type Eval<T> = Result<T, Undefined>;

struct Evaluator<'e, 'a> {
    env: &'e Environment<'a>,
    /// References currently being evaluated, innermost last.
    stack: Vec<String>,
    /// Set while evaluating the boundaries of a named base.
    in_base: bool,
    steps: Option<Vec<Step>>,
}

impl<'e, 'a> Evaluator<'e, 'a> {
    fn new(env: &'e Environment<'a>) -> Self {
        Self {
            env,
            stack: Vec::new(),
            in_base: false,
            steps: None,
        }
    }

    fn run(&mut self, tree: &Expr) -> TimeResult {
        match self.eval(tree).and_then(|v| v.as_instant()) {
            Ok(t) => TimeResult::Instant(t.with_timezone(&self.env.location.tz_offset)),
            Err(reason) => {
                log::debug!("`{tree}` undefined on {}: {reason}", self.env.date);
                TimeResult::Undefined(reason)
            }
        }
    }

    fn record(&mut self, label: impl FnOnce() -> String, value: &Eval<Value>) {
        let Some(steps) = self.steps.as_mut() else {
            return;
        };
        let label = label();
        if steps.iter().all(|s| s.label != label) {
            steps.push(Step {
                label,
                value: value.clone(),
            });
        }
    }

    fn eval(&mut self, expr: &Expr) -> Eval<Value> {
        let value = self.eval_node(expr);
        if matches!(expr, Expr::Primitive(_) | Expr::Call(_) | Expr::Reference(_)) {
            self.record(|| expr.to_string(), &value);
        }
        value
    }

    fn eval_node(&mut self, expr: &Expr) -> Eval<Value> {
        match expr {
            Expr::Literal(Literal::Number(n)) => Ok(Value::Number(n.0)),
            Expr::Literal(Literal::Minutes(m)) => Ok(Value::Duration(minutes(m.0)?)),
            Expr::Literal(Literal::Degrees(d)) => Ok(Value::Angle(d.0)),
            Expr::Primitive(p) => Ok(Value::Instant(self.primitive(*p, self.env.date)?)),
            Expr::Variable(v) => self.variable(*v),
            Expr::Call(call) => self.call(call),
            Expr::Binary(op, a, b) => {
                let a = self.eval(a)?;
                let b = self.eval(b)?;
                binary(*op, a, b)
            }
            Expr::Neg(inner) => match self.eval(inner)? {
                Value::Number(n) => Ok(Value::Number(-n)),
                Value::Angle(a) => Ok(Value::Angle(-a)),
                Value::Duration(d) => Ok(Value::Duration(-d)),
                other => Err(Undefined::Mismatch {
                    expected: "number or duration",
                    found: other.kind_name().to_string(),
                }),
            },
            Expr::Directed {
                amount,
                dir,
                anchor,
            } => {
                let amount = self.eval(amount)?.as_duration()?;
                let anchor = self.eval(anchor)?.as_instant()?;
                let shifted = match dir {
                    Dir::Before => anchor.checked_sub_signed(amount),
                    Dir::After => anchor.checked_add_signed(amount),
                };
                shifted.map(Value::Instant).ok_or(Undefined::Overflow)
            }
            Expr::Reference(name) => self.reference(name).map(Value::Instant),
            Expr::Text(s) => Ok(Value::Text(s.clone())),
            Expr::DayOfYear(d) => self.day_of_year(*d),
            Expr::Clock(c) => self.clock(*c),
            Expr::Compare(op, a, b) => {
                let a = self.eval(a)?;
                let b = self.eval(b)?;
                compare(*op, &a, &b).map(Value::Bool)
            }
            Expr::And(a, b) => {
                if !self.eval(a)?.as_bool()? {
                    return Ok(Value::Bool(false));
                }
                Ok(Value::Bool(self.eval(b)?.as_bool()?))
            }
            Expr::Or(a, b) => {
                if self.eval(a)?.as_bool()? {
                    return Ok(Value::Bool(true));
                }
                Ok(Value::Bool(self.eval(b)?.as_bool()?))
            }
            Expr::Not(inner) => Ok(Value::Bool(!self.eval(inner)?.as_bool()?)),
            Expr::Conditional {
                cond,
                then,
                otherwise,
            } => {
                if self.eval(cond)?.as_bool()? {
                    self.eval(then)
                } else if let Some(otherwise) = otherwise {
                    self.eval(otherwise)
                } else {
                    Err(Undefined::NoBranch)
                }
            }
        }
    }

    fn instant(&mut self, expr: &Expr) -> Eval<DateTime<Utc>> {
        self.eval(expr)?.as_instant()
    }

    fn crossing(&self, date: NaiveDate, zenith: f64, side: Side) -> Eval<DateTime<Utc>> {
        self.env
            .solver
            .solve(date, self.env.location, zenith, side)
            .ok_or(Undefined::NoCrossing { zenith })
    }

    fn primitive(&self, p: Primitive, date: NaiveDate) -> Eval<DateTime<Utc>> {
        let visible = zenith::VISIBLE + self.env.solver.horizon_dip(self.env.location);
        match p {
            Primitive::VisibleSunrise => self.crossing(date, visible, Side::Morning),
            Primitive::VisibleSunset => self.crossing(date, visible, Side::Evening),
            Primitive::GeometricSunrise => self.crossing(date, zenith::GEOMETRIC, Side::Morning),
            Primitive::GeometricSunset => self.crossing(date, zenith::GEOMETRIC, Side::Evening),
            Primitive::CivilDawn => self.crossing(date, zenith::CIVIL, Side::Morning),
            Primitive::CivilDusk => self.crossing(date, zenith::CIVIL, Side::Evening),
            Primitive::NauticalDawn => self.crossing(date, zenith::NAUTICAL, Side::Morning),
            Primitive::NauticalDusk => self.crossing(date, zenith::NAUTICAL, Side::Evening),
            Primitive::AstronomicalDawn => {
                self.crossing(date, zenith::ASTRONOMICAL, Side::Morning)
            }
            Primitive::AstronomicalDusk => {
                self.crossing(date, zenith::ASTRONOMICAL, Side::Evening)
            }
            Primitive::SolarNoon => self.solar_noon(date),
            Primitive::SolarMidnight => {
                if let Some(t) = self.env.solver.anti_transit(date, self.env.location) {
                    return Ok(t);
                }
                self.solar_noon(date)?
                    .checked_add_signed(TimeDelta::hours(12))
                    .ok_or(Undefined::Overflow)
            }
        }
    }

    fn solar_noon(&self, date: NaiveDate) -> Eval<DateTime<Utc>> {
        if let Some(t) = self.env.solver.transit(date, self.env.location) {
            return Ok(t);
        }
        let rise = self.primitive(Primitive::VisibleSunrise, date);
        let set = self.primitive(Primitive::VisibleSunset, date);
        match (rise, set) {
            (Ok(rise), Ok(set)) => Ok(rise + (set - rise) / 2),
            _ => Err(Undefined::NoTransit),
        }
    }

    /// Visible sunrise to visible sunset.
    fn day_length(&self, date: NaiveDate) -> Eval<TimeDelta> {
        let rise = self.primitive(Primitive::VisibleSunrise, date)?;
        let set = self.primitive(Primitive::VisibleSunset, date)?;
        if set <= rise {
            return Err(Undefined::DegenerateDay);
        }
        Ok(set - rise)
    }

    fn variable(&self, v: Variable) -> Eval<Value> {
        let date = self.env.date;
        let location = self.env.location;
        Ok(match v {
            Variable::Latitude => Value::Number(location.latitude),
            Variable::Longitude => Value::Number(location.longitude),
            Variable::Elevation => Value::Number(location.elevation_m),
            Variable::DayLength => Value::Duration(self.day_length(date)?),
            Variable::Month => Value::Number(date.month() as f64),
            Variable::Day => Value::Number(date.day() as f64),
            Variable::DayOfYear | Variable::Date => Value::Number(date.ordinal() as f64),
            Variable::Season => Value::Text(season(date.month(), location.is_northern()).into()),
        })
    }

    fn day_of_year(&self, d: DayMonth) -> Eval<Value> {
        NaiveDate::from_ymd_opt(self.env.date.year(), d.month, d.day)
            .map(|date| Value::Number(date.ordinal() as f64))
            .ok_or_else(|| Undefined::InvalidDate(Expr::DayOfYear(d).to_string()))
    }

    fn clock(&self, c: ClockTime) -> Eval<Value> {
        let invalid = || Undefined::InvalidClock(Expr::Clock(c).to_string());
        let time = NaiveTime::from_hms_opt(c.hour, c.minute, 0).ok_or_else(invalid)?;
        let local = self.env.date.and_time(time);
        let t = self
            .env
            .location
            .tz_offset
            .from_local_datetime(&local)
            .single()
            .ok_or_else(invalid)?;
        Ok(Value::Instant(t.with_timezone(&Utc)))
    }

    fn reference(&mut self, name: &str) -> Eval<DateTime<Utc>> {
        if self.stack.iter().any(|n| n == name) {
            return Err(Undefined::ReferenceCycle(name.to_string()));
        }
        if self.stack.len() >= MAX_REFERENCE_DEPTH {
            return Err(Undefined::DepthExceeded(MAX_REFERENCE_DEPTH));
        }
        let formulas = self.env.formulas;
        let formula = formulas
            .lookup(name)
            .ok_or_else(|| Undefined::UnknownReference(name.to_string()))?;
        log::debug!("resolving @{name} at depth {}", self.stack.len());
        self.stack.push(name.to_string());
        let result = self.instant(&formula);
        self.stack.pop();
        result
    }

    fn call(&mut self, call: &Call) -> Eval<Value> {
        let t = match call {
            Call::Fallback(candidates) => return self.fallback(candidates),
            Call::Midpoint(a, b) => {
                let a = self.instant(a)?;
                let b = self.instant(b)?;
                a + (b - a) / 2
            }
            Call::EarlierOf(a, b) => {
                let a = self.instant(a)?;
                a.min(self.instant(b)?)
            }
            Call::LaterOf(a, b) => {
                let a = self.instant(a)?;
                a.max(self.instant(b)?)
            }
            Call::TemporalHours { hours, base } => {
                let (start, end) = self.day_bounds(base)?;
                if end <= start {
                    return Err(Undefined::DegenerateDay);
                }
                let hour = minutes(as_minutes(end - start) / 12.0)?;
                let offset = minutes(as_minutes(hour) * hours.0)?;
                start.checked_add_signed(offset).ok_or(Undefined::Overflow)?
            }
            Call::TemporalMinutes {
                minutes: n,
                direction,
            } => {
                let scale = as_minutes(self.day_length(self.env.date)?) / 720.0;
                let offset = minutes(n.0 * scale)?;
                self.shift_from(*direction, self.env.date, offset)?
            }
            Call::SolarAngle { degrees, direction } => {
                self.solar_angle(self.env.date, degrees.0, *direction)?
            }
            Call::SeasonalSolarAngle { degrees, direction } => {
                self.seasonal_solar_angle(degrees.0, *direction)?
            }
        };
        Ok(Value::Instant(t))
    }

    /// First candidate that is defined. When none is, the last reason is reported.
    fn fallback(&mut self, candidates: &[Expr]) -> Eval<Value> {
        let mut last = Undefined::NoBranch;
        for (i, candidate) in candidates.iter().enumerate() {
            match self.eval(candidate) {
                Ok(v) => return Ok(v),
                Err(reason) => {
                    log::debug!("fallback candidate {i} `{candidate}` undefined: {reason}");
                    last = reason;
                }
            }
        }
        Err(last)
    }

    fn day_bounds(&mut self, base: &DayBase) -> Eval<(DateTime<Utc>, DateTime<Utc>)> {
        match base {
            DayBase::Named(b) => {
                let bases = self.env.bases;
                let day = bases
                    .resolve(*b)
                    .map_err(|e| Undefined::UnknownBase(e.0.to_string()))?;
                let outer = std::mem::replace(&mut self.in_base, true);
                let bounds = self.base_bound(*b, "start", &day.start).and_then(|start| {
                    Ok((start, self.base_bound(*b, "end", &day.end)?))
                });
                self.in_base = outer;
                bounds
            }
            DayBase::Custom(start, end) => Ok((self.instant(start)?, self.instant(end)?)),
        }
    }

    fn base_bound(&mut self, base: Base, edge: &str, expr: &Expr) -> Eval<DateTime<Utc>> {
        let t = self.instant(expr);
        self.record(|| format!("{base} {edge}"), &t.clone().map(Value::Instant));
        t
    }

    /// Move `offset` away from the direction's anchor event on `date`.
    fn shift_from(
        &self,
        direction: Direction,
        date: NaiveDate,
        offset: TimeDelta,
    ) -> Eval<DateTime<Utc>> {
        let anchor = self.primitive(direction.anchor(), date)?;
        let shifted = if direction.is_before() {
            anchor.checked_sub_signed(offset)
        } else {
            anchor.checked_add_signed(offset)
        };
        shifted.ok_or(Undefined::Overflow)
    }

    /// Depression crossing `degrees` below the horizon on the direction's side of the day.
    /// Inside a named base the horizon dip for the location's elevation is added, the same way
    /// visible sunrise and sunset carry it.
    fn solar_angle(
        &self,
        date: NaiveDate,
        degrees: f64,
        direction: Direction,
    ) -> Eval<DateTime<Utc>> {
        let mut zenith = 90.0 + degrees;
        if self.in_base {
            zenith += self.env.solver.horizon_dip(self.env.location);
        }
        self.crossing(date, zenith, direction.side())
    }

    /// Offset of the angle from its anchor on the March equinox, stretched by today's day
    /// length relative to twelve hours.
    fn seasonal_solar_angle(&self, degrees: f64, direction: Direction) -> Eval<DateTime<Utc>> {
        let equinox = NaiveDate::from_ymd_opt(self.env.date.year(), 3, 20)
            .ok_or_else(|| Undefined::InvalidDate("20-Mar".into()))?;
        let crossing = self.solar_angle(equinox, degrees, direction)?;
        let anchor = self.primitive(direction.anchor(), equinox)?;
        let equinox_minutes = as_minutes(anchor - crossing).abs();
        let scale = as_minutes(self.day_length(self.env.date)?) / 720.0;
        let offset = minutes(equinox_minutes * scale)?;
        self.shift_from(direction, self.env.date, offset)
    }
}

fn season(month: u32, northern: bool) -> &'static str {
    let north = match month {
        3..=5 => "spring",
        6..=8 => "summer",
        9..=11 => "autumn",
        _ => "winter",
    };
    if northern {
        return north;
    }
    match north {
        "spring" => "autumn",
        "summer" => "winter",
        "autumn" => "spring",
        _ => "summer",
    }
}

fn binary(op: BinOp, a: Value, b: Value) -> Eval<Value> {
    use Value::*;
    let overflow = Undefined::Overflow;
    Ok(match (op, a, b) {
        (BinOp::Add, Instant(t), Duration(d)) | (BinOp::Add, Duration(d), Instant(t)) => {
            Instant(t.checked_add_signed(d).ok_or(overflow)?)
        }
        (BinOp::Sub, Instant(t), Duration(d)) => Instant(t.checked_sub_signed(d).ok_or(overflow)?),
        (BinOp::Sub, Instant(a), Instant(b)) => Duration(a - b),
        (BinOp::Add, Duration(a), Duration(b)) => Duration(a.checked_add(&b).ok_or(overflow)?),
        (BinOp::Sub, Duration(a), Duration(b)) => Duration(a.checked_sub(&b).ok_or(overflow)?),
        (BinOp::Mul, Duration(d), Number(n)) | (BinOp::Mul, Number(n), Duration(d)) => {
            Duration(minutes(as_minutes(d) * n)?)
        }
        (BinOp::Div, Duration(d), Number(n)) => {
            if n == 0.0 {
                return Err(Undefined::DivisionByZero);
            }
            Duration(minutes(as_minutes(d) / n)?)
        }
        (BinOp::Div, Duration(a), Duration(b)) => {
            if b.is_zero() {
                return Err(Undefined::DivisionByZero);
            }
            Number(as_minutes(a) / as_minutes(b))
        }
        (op, Number(a), Number(b)) => Number(match op {
            BinOp::Add => a + b,
            BinOp::Sub => a - b,
            BinOp::Mul => a * b,
            BinOp::Div => {
                if b == 0.0 {
                    return Err(Undefined::DivisionByZero);
                }
                a / b
            }
        }),
        (op, a, b) => {
            return Err(Undefined::Mismatch {
                expected: "operands of matching kinds",
                found: format!("{} {op} {}", a.kind_name(), b.kind_name()),
            })
        }
    })
}

fn compare(op: CmpOp, a: &Value, b: &Value) -> Eval<bool> {
    let ordering = match (a, b) {
        (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
        (Value::Duration(a), Value::Duration(b)) => Some(a.cmp(b)),
        (Value::Instant(a), Value::Instant(b)) => Some(a.cmp(b)),
        (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => {
            return Err(Undefined::Mismatch {
                expected: "comparable values",
                found: format!("{} and {}", a.kind_name(), b.kind_name()),
            })
        }
    };
    let Some(ordering) = ordering else {
        return Ok(op == CmpOp::Ne);
    };
    Ok(match op {
        CmpOp::Eq => ordering == Ordering::Equal,
        CmpOp::Ne => ordering != Ordering::Equal,
        CmpOp::Lt => ordering == Ordering::Less,
        CmpOp::Le => ordering != Ordering::Greater,
        CmpOp::Gt => ordering == Ordering::Greater,
        CmpOp::Ge => ordering != Ordering::Less,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile;
    use crate::test_support::{at, fixed_day, FixedDay};

    fn eval(text: &str, solver: &FixedDay) -> TimeResult {
        eval_with(text, solver, &NoFormulas)
    }

    fn eval_with(text: &str, solver: &FixedDay, formulas: &dyn FormulaLookup) -> TimeResult {
        let (date, location) = fixed_day();
        let env = Environment::new(date, &location, formulas).with_solver(solver);
        evaluate_in(&compile(text).unwrap(), &env)
    }

    fn hm(text: &str, solver: &FixedDay) -> String {
        match eval(text, solver) {
            TimeResult::Instant(t) => t.format("%H:%M:%S").to_string(),
            TimeResult::Undefined(u) => panic!("`{text}` undefined: {u}"),
        }
    }

    #[test]
    fn fixed_offsets_and_directions() {
        let s = FixedDay::twelve_hours();
        assert_eq!(hm("sunrise", &s), "06:00:00");
        assert_eq!(hm("sunset - 15min", &s), "17:45:00");
        assert_eq!(hm("72min before sunrise", &s), "04:48:00");
        assert_eq!(hm("1h 30min after sunset", &s), "19:30:00");
        assert_eq!(hm("72min before sunrise + 10min", &s), "04:58:00");
        assert_eq!(hm("(1h + 12min) before sunrise", &s), "04:48:00");
        assert_eq!(hm("sunrise + (sunset - sunrise) / 2", &s), "12:00:00");
        assert_eq!(hm("sunrise + 2 * 30min", &s), "07:00:00");
        assert_eq!(hm("sunrise - -10min", &s), "06:10:00");
    }

    #[test]
    fn noon_and_midnight_without_transit() {
        let s = FixedDay::new(at(6, 30), at(18, 0));
        assert_eq!(hm("solar_noon", &s), "12:15:00");
        assert_eq!(hm("chatzos_layla", &s), "00:15:00");
    }

    #[test]
    fn temporal_hours_on_even_day() {
        let s = FixedDay::twelve_hours();
        assert_eq!(hm("temporal_hours(3, gra)", &s), "09:00:00");
        assert_eq!(hm("shaos_zmaniyos(6, gra)", &s), "12:00:00");
        // mga_72: 04:48 to 19:12, 14h24m day, hour of 72 minutes.
        assert_eq!(hm("temporal_hours(3, mga_72)", &s), "08:24:00");
        assert_eq!(
            hm("temporal_hours(4, custom(sunrise - 1h, sunset + 1h))", &s),
            "09:40:00"
        );
    }

    #[test]
    fn temporal_minutes_scale_with_day_length() {
        let even = FixedDay::twelve_hours();
        assert_eq!(hm("temporal_minutes(72, before_sunrise)", &even), "04:48:00");
        // 14h24m day: 72 * 864 / 720 = 86.4 minutes.
        let long = FixedDay::new(at(5, 0), at(19, 24));
        assert_eq!(hm("temporal_minutes(72, before_sunrise)", &long), "03:33:36");
        assert_eq!(hm("proportional_minutes(72, after_sunset)", &long), "20:50:24");
    }

    #[test]
    fn solar_angles_use_the_solver() {
        let s = FixedDay::twelve_hours();
        // The fixed day moves 4 minutes per degree away from visible sunrise.
        let alos = eval("solar(16.1, before_sunrise)", &s).instant().unwrap();
        let sunrise = eval("sunrise", &s).instant().unwrap();
        let gap = (sunrise - alos).num_seconds();
        assert!((gap as f64 - (16.1 + 90.0 - 90.833) * 240.0).abs() < 1.0, "{gap}");
        assert_eq!(
            eval("16.1deg before sunrise", &s),
            eval("solar_angle(16.1, before_visible_sunrise)", &s)
        );
    }

    #[test]
    fn seasonal_solar_angle_scales_equinox_offset() {
        let even = FixedDay::twelve_hours();
        let long = FixedDay::new(at(5, 0), at(19, 24));
        let gap = |s: &FixedDay| {
            let t = eval("seasonal_solar(16.1, before_sunrise)", s).instant().unwrap();
            let rise = eval("sunrise", s).instant().unwrap();
            (rise - t).num_milliseconds() as f64 / 60_000.0
        };
        let base = (16.1 + 90.0 - 90.833) * 4.0;
        assert!((gap(&even) - base).abs() < 0.02);
        assert!((gap(&long) - base * 1.2).abs() < 0.02);
    }

    #[test]
    fn earlier_later_and_midpoint() {
        let s = FixedDay::twelve_hours();
        assert_eq!(hm("midpoint(06:30, 18:00)", &s), "12:15:00");
        assert_eq!(hm("earlier_of(sunrise + 1h, 06:30)", &s), "06:30:00");
        assert_eq!(hm("later_of(sunrise + 1h, 06:30)", &s), "07:00:00");
    }

    #[test]
    fn undefined_propagates_strictly() {
        let polar = FixedDay::twelve_hours().with_limit(100.0);
        assert!(matches!(
            eval("solar(16.1, before_sunrise) + 10min", &polar),
            TimeResult::Undefined(Undefined::NoCrossing { .. })
        ));
        assert!(matches!(
            eval("earlier_of(sunrise, solar(16.1, before_sunrise))", &polar),
            TimeResult::Undefined(Undefined::NoCrossing { .. })
        ));
        assert!(matches!(
            eval("temporal_hours(3, mga_16_1)", &polar),
            TimeResult::Undefined(Undefined::NoCrossing { .. })
        ));
    }

    #[test]
    fn fallback_takes_first_defined() {
        let polar = FixedDay::twelve_hours().with_limit(100.0);
        assert_eq!(
            eval("fallback(solar(16.1, before_sunrise), sunrise - 72min)", &polar)
                .instant()
                .map(|t| t.format("%H:%M").to_string()),
            Some("04:48".into())
        );
        assert_eq!(
            eval("first_valid(sunrise - 72min, sunrise - 90min)", &polar)
                .instant()
                .map(|t| t.format("%H:%M").to_string()),
            Some("04:48".into())
        );
        assert!(matches!(
            eval("fallback(@missing, solar(20, before_sunrise))", &polar),
            TimeResult::Undefined(Undefined::NoCrossing { .. })
        ));
    }

    #[test]
    fn fallback_short_circuits() {
        // The second candidate would reference a cycle; it is never reached.
        let s = FixedDay::twelve_hours();
        let mut formulas = HashMap::new();
        formulas.insert("loop".to_string(), compile("@loop").unwrap());
        assert_eq!(
            eval_with("fallback(sunrise, @loop)", &s, &formulas),
            eval("sunrise", &s)
        );
    }

    #[test]
    fn references() {
        let s = FixedDay::twelve_hours();
        let mut formulas = HashMap::new();
        formulas.insert("alos_72".to_string(), compile("sunrise - 72min").unwrap());
        formulas.insert("misheyakir".to_string(), compile("@alos_72 + 10min").unwrap());
        let via_ref = eval_with("@misheyakir", &s, &formulas).instant().unwrap();
        let alos = eval_with("@alos_72", &s, &formulas).instant().unwrap();
        assert_eq!(via_ref - alos, TimeDelta::minutes(10));
        assert_eq!(
            eval_with("@nope", &s, &formulas),
            TimeResult::Undefined(Undefined::UnknownReference("nope".into()))
        );
    }

    #[test]
    fn reference_cycles_are_undefined() {
        let s = FixedDay::twelve_hours();
        let mut formulas = HashMap::new();
        formulas.insert("a".to_string(), compile("@b + 1min").unwrap());
        formulas.insert("b".to_string(), compile("@a - 1min").unwrap());
        assert_eq!(
            eval_with("@a", &s, &formulas),
            TimeResult::Undefined(Undefined::ReferenceCycle("a".into()))
        );
    }

    #[test]
    fn deep_chains_stop_at_the_limit() {
        let s = FixedDay::twelve_hours();
        let lookup = LookupFn(|name: &str| {
            let n: usize = name.strip_prefix('f')?.parse().ok()?;
            let text = if n == 0 {
                "sunrise".to_string()
            } else {
                format!("@f{} + 1min", n - 1)
            };
            compile(&text).ok()
        });
        assert!(eval_with("@f10", &s, &lookup).is_defined());
        assert_eq!(
            eval_with("@f100", &s, &lookup),
            TimeResult::Undefined(Undefined::DepthExceeded(MAX_REFERENCE_DEPTH))
        );
    }

    #[test]
    fn conditions_and_variables() {
        let s = FixedDay::twelve_hours();
        // fixed_day: 2024-03-21 at 31.77 N.
        assert_eq!(
            hm("if (latitude > 50) { sunrise } else { sunset }", &s),
            "18:00:00"
        );
        assert_eq!(
            hm("if (season == \"spring\" && month == 3) { sunrise } else { sunset }", &s),
            "06:00:00"
        );
        assert_eq!(
            hm("if (day_length > 12h) { sunrise } else if (date >= 21-Mar) { noon } else { sunset }", &s),
            "12:00:00"
        );
        assert_eq!(
            hm("if (!(day == 21) || day_of_year < 1) { sunrise } else { sunset }", &s),
            "18:00:00"
        );
        assert_eq!(
            eval("if (month == 7) { sunrise }", &s),
            TimeResult::Undefined(Undefined::NoBranch)
        );
        assert!(eval("if (date == 29-Feb) { sunrise } else { sunset }", &s).is_defined());
    }

    #[test]
    fn impossible_dates_are_undefined() {
        let s = FixedDay::twelve_hours();
        let (_, location) = fixed_day();
        let common_year = NaiveDate::from_ymd_opt(2023, 3, 21).unwrap();
        let env = Environment::new(common_year, &location, &NoFormulas).with_solver(&s);
        let tree = compile("if (date == 29-Feb) { sunrise } else { sunset }").unwrap();
        assert_eq!(
            evaluate_in(&tree, &env),
            TimeResult::Undefined(Undefined::InvalidDate("29-Feb".into()))
        );
    }

    #[test]
    fn division_by_zero_is_undefined() {
        let s = FixedDay::twelve_hours();
        assert_eq!(
            eval("sunrise + 10min / 0", &s),
            TimeResult::Undefined(Undefined::DivisionByZero)
        );
        assert_eq!(
            eval("sunrise + 10min * (1 / (latitude - latitude))", &s),
            TimeResult::Undefined(Undefined::DivisionByZero)
        );
    }

    #[test]
    fn degenerate_custom_day() {
        let s = FixedDay::twelve_hours();
        assert_eq!(
            eval("temporal_hours(3, custom(sunset, sunrise))", &s),
            TimeResult::Undefined(Undefined::DegenerateDay)
        );
    }

    #[test]
    fn seasons_flip_south_of_the_equator() {
        assert_eq!(season(1, true), "winter");
        assert_eq!(season(1, false), "summer");
        assert_eq!(season(4, false), "autumn");
        assert_eq!(season(10, false), "spring");
    }

    fn explain(text: &str, solver: &FixedDay) -> Breakdown {
        let (date, location) = fixed_day();
        let env = Environment::new(date, &location, &NoFormulas).with_solver(solver);
        evaluate_with_breakdown(&compile(text).unwrap(), &env)
    }

    fn step_hm(b: &Breakdown, label: &str) -> String {
        let (_, location) = fixed_day();
        match b.step(label).map(|s| &s.value) {
            Some(Ok(v)) => v.display_in(&location.tz_offset),
            other => panic!("step `{label}`: {other:?}"),
        }
    }

    #[test]
    fn breakdown_lists_intermediate_values() {
        let s = FixedDay::twelve_hours();
        let b = explain("temporal_hours(3, gra) + 10min", &s);
        assert_eq!(b.result, eval("temporal_hours(3, gra) + 10min", &s));
        assert_eq!(step_hm(&b, "gra start"), "06:00:00");
        assert_eq!(step_hm(&b, "gra end"), "18:00:00");
        assert_eq!(step_hm(&b, "visible_sunset"), "18:00:00");
        assert_eq!(step_hm(&b, "temporal_hours(3, gra)"), "09:00:00");
        let pos = |label: &str| b.steps.iter().position(|s| s.label == label).unwrap();
        assert!(pos("gra start") < pos("temporal_hours(3, gra)"));
        assert_eq!(
            b.steps.iter().filter(|s| s.label == "visible_sunrise").count(),
            1
        );
    }

    #[test]
    fn breakdown_keeps_undefined_candidates() {
        let polar = FixedDay::twelve_hours().with_limit(100.0);
        let b = explain("fallback(solar(16.1, before_sunrise), sunrise - 72min)", &polar);
        assert!(b.result.is_defined());
        assert!(matches!(
            b.step("solar_angle(16.1, before_visible_sunrise)").map(|s| &s.value),
            Some(Err(Undefined::NoCrossing { .. }))
        ));
        assert_eq!(
            step_hm(&b, "fallback(solar_angle(16.1, before_visible_sunrise), visible_sunrise - 72min)"),
            "04:48:00"
        );
    }

    #[test]
    fn breakdown_records_references() {
        let s = FixedDay::twelve_hours();
        let mut formulas = HashMap::new();
        formulas.insert("alos".to_string(), compile("sunrise - 72min").unwrap());
        let (date, location) = fixed_day();
        let env = Environment::new(date, &location, &formulas).with_solver(&s);
        let b = evaluate_with_breakdown(&compile("@alos + 10min").unwrap(), &env);
        assert_eq!(step_hm(&b, "@alos"), "04:48:00");
        assert_eq!(b.result.instant().map(|t| t.format("%H:%M").to_string()), Some("04:58".into()));
    }

    #[test]
    fn mismatches_name_both_kinds() {
        assert_eq!(
            binary(
                BinOp::Mul,
                Value::Instant(Utc::now()),
                Value::Duration(TimeDelta::minutes(1))
            ),
            Err(Undefined::Mismatch {
                expected: "operands of matching kinds",
                found: "time * duration".into(),
            })
        );
        assert_eq!(
            compare(CmpOp::Lt, &Value::Text("a".into()), &Value::Number(1.0))
                .unwrap_err()
                .to_string(),
            "expected comparable values, found text and number"
        );
    }

    #[test]
    fn every_direction_picks_a_depression_crossing() {
        // 10.833 degrees below the horizon is 40 minutes outside sunrise and sunset here.
        let s = FixedDay::twelve_hours();
        for d in Direction::ALL {
            let expected = match d.side() {
                Side::Morning => "05:20:00",
                Side::Evening => "18:40:00",
            };
            assert_eq!(hm(&format!("solar_angle(10.833, {d})"), &s), expected, "{d}");
        }
    }

    #[test]
    fn results_use_location_offset() {
        let s = FixedDay::twelve_hours();
        let t = eval("sunrise", &s).instant().unwrap();
        let (_, location) = fixed_day();
        assert_eq!(*t.offset(), location.tz_offset);
    }
}
