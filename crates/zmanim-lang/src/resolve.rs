//! Resolve parsed expression (surface words, raw literals) to the canonical `Expr`.
//! Words become canonical symbols, calls are checked for arity and argument shape, and every
//! node gets a static kind so that ill-typed formulas fail before they are stored.

use crate::error::CompileError;
use crate::functions;
use crate::ir::{BinOp, Call, CmpOp, DayBase, Dir, Expr, ExprDef, Literal, Span};
use crate::lexer::{DayMonth, Unit, Word};
use crate::symbol::{Direction, Function, Symbol, Variable};
use ordered_float::OrderedFloat;
use std::fmt;

/// Static kind of an expression.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Kind {
    Instant,
    Duration,
    Number,
    Angle,
    Bool,
    Text,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Kind::Instant => "a time",
            Kind::Duration => "a duration",
            Kind::Number => "a number",
            Kind::Angle => "an angle",
            Kind::Bool => "a condition",
            Kind::Text => "text",
        })
    }
}

impl Variable {
    pub fn kind(self) -> Kind {
        match self {
            Variable::DayLength => Kind::Duration,
            Variable::Season => Kind::Text,
            _ => Kind::Number,
        }
    }
}

type Typed = (Expr, Kind);

/// Resolve a whole formula; the result must be a time.
pub fn resolve(def: ExprDef) -> Result<Expr, CompileError> {
    let (expr, kind) = resolve_expr(def)?;
    if kind != Kind::Instant {
        return Err(CompileError::NotATime { found: kind });
    }
    Ok(expr)
}

/// Resolve any expression and report its kind.
pub fn resolve_expr(def: ExprDef) -> Result<Typed, CompileError> {
    match def {
        ExprDef::Number(n, _) => Ok(match n.unit {
            Unit::None => (Expr::Literal(Literal::Number(n.magnitude)), Kind::Number),
            Unit::Minutes => (Expr::Literal(Literal::Minutes(n.magnitude)), Kind::Duration),
            Unit::Degrees => (Expr::Literal(Literal::Degrees(n.magnitude)), Kind::Angle),
        }),
        ExprDef::Word(word, span) => resolve_word(word, span),
        ExprDef::Call(word, args, span) => match word.symbol {
            Some(Symbol::Function(f)) => resolve_call(f, args, span),
            symbol => Err(CompileError::UnknownSymbol {
                suggestion: symbol
                    .is_none()
                    .then(|| suggest(&word.text, |s| matches!(s, Symbol::Function(_))))
                    .flatten(),
                name: word.text,
                offset: span.start,
            }),
        },
        ExprDef::Ref(name, _) => Ok((Expr::Reference(name), Kind::Instant)),
        ExprDef::Text(s, _) => Ok((Expr::Text(s), Kind::Text)),
        ExprDef::Date(d, span) => {
            check_day_month(d, span)?;
            Ok((Expr::DayOfYear(d), Kind::Number))
        }
        ExprDef::Clock(c, _) => Ok((Expr::Clock(c), Kind::Instant)),
        ExprDef::Neg(inner, span) => {
            let (e, k) = resolve_expr(*inner)?;
            match k {
                Kind::Number | Kind::Duration | Kind::Angle => Ok((Expr::Neg(Box::new(e)), k)),
                _ => Err(CompileError::type_error(span.start, format!("cannot negate {k}"))),
            }
        }
        ExprDef::Binary(op, a, b, span) => {
            let (a, ka) = resolve_expr(*a)?;
            let (b, kb) = resolve_expr(*b)?;
            let kind = binary_kind(op, ka, kb).ok_or_else(|| {
                CompileError::type_error(span.start, format!("cannot {} {ka} and {kb}", verb(op)))
            })?;
            Ok((Expr::Binary(op, Box::new(a), Box::new(b)), kind))
        }
        ExprDef::Directed {
            amount,
            dir,
            anchor,
            span,
        } => resolve_directed(*amount, dir, *anchor, span),
        ExprDef::Compare(op, a, b, span) => {
            let (a, ka) = resolve_expr(*a)?;
            let (b, kb) = resolve_expr(*b)?;
            let ordered = matches!(ka, Kind::Number | Kind::Duration | Kind::Instant);
            let equality = matches!(op, CmpOp::Eq | CmpOp::Ne);
            if ka != kb || ka == Kind::Angle || !(ordered || equality) {
                return Err(CompileError::type_error(
                    span.start,
                    format!("cannot compare {ka} with {kb} using `{op}`"),
                ));
            }
            Ok((Expr::Compare(op, Box::new(a), Box::new(b)), Kind::Bool))
        }
        ExprDef::And(a, b, _) => {
            let a = expect_kind(*a, Kind::Bool)?;
            let b = expect_kind(*b, Kind::Bool)?;
            Ok((Expr::And(Box::new(a), Box::new(b)), Kind::Bool))
        }
        ExprDef::Or(a, b, _) => {
            let a = expect_kind(*a, Kind::Bool)?;
            let b = expect_kind(*b, Kind::Bool)?;
            Ok((Expr::Or(Box::new(a), Box::new(b)), Kind::Bool))
        }
        ExprDef::Not(inner, _) => {
            let e = expect_kind(*inner, Kind::Bool)?;
            Ok((Expr::Not(Box::new(e)), Kind::Bool))
        }
        ExprDef::If {
            cond,
            then,
            otherwise,
            ..
        } => {
            let cond = expect_kind(*cond, Kind::Bool)?;
            let (then, kind) = resolve_expr(*then)?;
            let otherwise = match otherwise {
                Some(e) => Some(Box::new(expect_kind(*e, kind)?)),
                None => None,
            };
            Ok((
                Expr::Conditional {
                    cond: Box::new(cond),
                    then: Box::new(then),
                    otherwise,
                },
                kind,
            ))
        }
    }
}

fn expect_kind(def: ExprDef, want: Kind) -> Result<Expr, CompileError> {
    let offset = def.span().start;
    let (e, k) = resolve_expr(def)?;
    if k != want {
        return Err(CompileError::type_error(offset, format!("expected {want}, found {k}")));
    }
    Ok(e)
}

fn resolve_word(word: Word, span: Span) -> Result<Typed, CompileError> {
    let offset = span.start;
    match word.symbol {
        Some(Symbol::Primitive(p)) => Ok((Expr::Primitive(p), Kind::Instant)),
        Some(Symbol::Variable(v)) => Ok((Expr::Variable(v), v.kind())),
        Some(Symbol::Function(f)) => {
            log::debug!("`{}` used without arguments; expected {}", word.text, functions::signature(f));
            Err(CompileError::UnknownSymbol {
                name: word.text,
                offset,
                suggestion: None,
            })
        }
        Some(Symbol::Direction(_)) => Err(CompileError::direction(
            offset,
            format!("`{}` is only valid as a function argument", word.text),
        )),
        Some(Symbol::Base(_)) => Err(CompileError::type_error(
            offset,
            format!("base `{}` is only valid inside temporal_hours", word.text),
        )),
        None => Err(CompileError::UnknownSymbol {
            suggestion: suggest(&word.text, |s| !matches!(s, Symbol::Function(_))),
            name: word.text,
            offset,
        }),
    }
}

fn suggest(name: &str, accept: impl Fn(Symbol) -> bool) -> Option<String> {
    crate::alias_table::alias_table()
        .suggest(name, accept)
        .map(str::to_string)
}

fn verb(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "add",
        BinOp::Sub => "subtract",
        BinOp::Mul => "multiply",
        BinOp::Div => "divide",
    }
}

/// Result kind of `a op b`, if the combination is allowed.
pub fn binary_kind(op: BinOp, a: Kind, b: Kind) -> Option<Kind> {
    use Kind::*;
    match (op, a, b) {
        (BinOp::Add, Instant, Duration) | (BinOp::Add, Duration, Instant) => Some(Instant),
        (BinOp::Sub, Instant, Duration) => Some(Instant),
        (BinOp::Sub, Instant, Instant) => Some(Duration),
        (BinOp::Add | BinOp::Sub, Duration, Duration) => Some(Duration),
        (BinOp::Mul, Duration, Number) | (BinOp::Mul, Number, Duration) => Some(Duration),
        (BinOp::Div, Duration, Number) => Some(Duration),
        (BinOp::Div, Duration, Duration) => Some(Number),
        (_, Number, Number) => Some(Number),
        _ => None,
    }
}

/// Literal number (possibly negated) with its unit.
fn constant(def: &ExprDef) -> Option<(f64, Unit)> {
    match def {
        ExprDef::Number(n, _) => Some((n.magnitude.0, n.unit)),
        ExprDef::Neg(inner, _) => constant(inner).map(|(v, u)| (-v, u)),
        _ => None,
    }
}

fn check_range(
    what: &'static str,
    value: f64,
    min: f64,
    max: f64,
    min_exclusive: bool,
    offset: usize,
) -> Result<OrderedFloat<f64>, CompileError> {
    let low_ok = if min_exclusive { value > min } else { value >= min };
    if low_ok && value <= max {
        Ok(OrderedFloat(value))
    } else {
        Err(CompileError::Range {
            what,
            value,
            min,
            max,
            offset,
        })
    }
}

/// Constant argument in one of the accepted units.
fn constant_arg(
    def: &ExprDef,
    function: Function,
    accepted: &[Unit],
    what: &str,
) -> Result<f64, CompileError> {
    match constant(def) {
        Some((v, unit)) if accepted.contains(&unit) => Ok(v),
        _ => Err(CompileError::type_error(
            def.span().start,
            format!("`{function}` needs a constant number of {what}"),
        )),
    }
}

fn solar_degrees(def: &ExprDef, function: Function) -> Result<OrderedFloat<f64>, CompileError> {
    let v = constant_arg(def, function, &[Unit::None, Unit::Degrees], "degrees")?;
    check_range("solar angle", v, 0.0, 90.0, false, def.span().start)
}

fn resolve_direction(
    def: &ExprDef,
    function: Function,
    twilight_only: bool,
) -> Result<Direction, CompileError> {
    let offset = def.span().start;
    let symbol = match def {
        ExprDef::Word(w, _) => w.symbol,
        ExprDef::Text(s, _) => crate::alias_table::lookup(s),
        _ => None,
    };
    let Some(Symbol::Direction(d)) = symbol else {
        return Err(CompileError::direction(
            offset,
            format!("`{function}` expects a direction such as before_sunrise"),
        ));
    };
    if twilight_only && !d.is_twilight() {
        return Err(CompileError::direction(
            offset,
            format!("`{function}` only works before sunrise or after sunset, not {d}"),
        ));
    }
    Ok(d)
}

fn resolve_base(def: ExprDef) -> Result<DayBase, CompileError> {
    match def {
        ExprDef::Word(Word { symbol: Some(Symbol::Base(b)), .. }, _) => Ok(DayBase::Named(b)),
        ExprDef::Word(w, span) => Err(CompileError::UnknownBase {
            suggestion: suggest(&w.text, |s| matches!(s, Symbol::Base(_))),
            name: w.text,
            offset: span.start,
        }),
        ExprDef::Call(
            Word {
                symbol: Some(Symbol::Function(Function::Custom)),
                ..
            },
            args,
            span,
        ) => {
            check_arity(Function::Custom, args.len(), span)?;
            let mut args = args.into_iter();
            let (Some(start), Some(end)) = (args.next(), args.next()) else {
                unreachable!("arity checked above");
            };
            let start = expect_kind(start, Kind::Instant)?;
            let end = expect_kind(end, Kind::Instant)?;
            Ok(DayBase::Custom(Box::new(start), Box::new(end)))
        }
        other => Err(CompileError::type_error(
            other.span().start,
            "expected a base name such as gra or custom(start, end)",
        )),
    }
}

fn check_arity(f: Function, found: usize, span: Span) -> Result<(), CompileError> {
    let expected = functions::arity(f);
    if expected.accepts(found) {
        Ok(())
    } else {
        Err(CompileError::Arity {
            function: f.canonical_name(),
            expected,
            found,
            offset: span.start,
        })
    }
}

fn two_instants(args: Vec<ExprDef>) -> Result<(Box<Expr>, Box<Expr>), CompileError> {
    let mut args = args.into_iter();
    let (Some(a), Some(b)) = (args.next(), args.next()) else {
        unreachable!("arity checked by caller");
    };
    Ok((
        Box::new(expect_kind(a, Kind::Instant)?),
        Box::new(expect_kind(b, Kind::Instant)?),
    ))
}

fn resolve_call(f: Function, args: Vec<ExprDef>, span: Span) -> Result<Typed, CompileError> {
    check_arity(f, args.len(), span)?;
    let call = match f {
        Function::Fallback => {
            let mut kind = None;
            let mut out = Vec::with_capacity(args.len());
            for arg in args {
                let offset = arg.span().start;
                let (e, k) = resolve_expr(arg)?;
                match kind {
                    None => kind = Some(k),
                    Some(first) if first != k => {
                        return Err(CompileError::type_error(
                            offset,
                            format!("fallback candidates must agree: {first} vs {k}"),
                        ))
                    }
                    Some(_) => {}
                }
                out.push(e);
            }
            let kind = kind.unwrap_or(Kind::Instant);
            return Ok((Expr::Call(Call::Fallback(out)), kind));
        }
        Function::Midpoint => {
            let (a, b) = two_instants(args)?;
            Call::Midpoint(a, b)
        }
        Function::EarlierOf => {
            let (a, b) = two_instants(args)?;
            Call::EarlierOf(a, b)
        }
        Function::LaterOf => {
            let (a, b) = two_instants(args)?;
            Call::LaterOf(a, b)
        }
        Function::TemporalHours => {
            let hours = constant_arg(&args[0], f, &[Unit::None], "hours")?;
            let hours = check_range("temporal hours", hours, 0.5, 12.0, false, args[0].span().start)?;
            let base_def = args.into_iter().nth(1);
            let Some(base_def) = base_def else {
                unreachable!("arity checked above");
            };
            Call::TemporalHours {
                hours,
                base: resolve_base(base_def)?,
            }
        }
        Function::TemporalMinutes => {
            let minutes = constant_arg(&args[0], f, &[Unit::None, Unit::Minutes], "minutes")?;
            let minutes =
                check_range("temporal minutes", minutes, 0.0, 200.0, true, args[0].span().start)?;
            Call::TemporalMinutes {
                minutes,
                direction: resolve_direction(&args[1], f, true)?,
            }
        }
        Function::SolarAngle => Call::SolarAngle {
            degrees: solar_degrees(&args[0], f)?,
            direction: resolve_direction(&args[1], f, false)?,
        },
        Function::SeasonalSolarAngle => Call::SeasonalSolarAngle {
            degrees: solar_degrees(&args[0], f)?,
            direction: resolve_direction(&args[1], f, true)?,
        },
        Function::Custom => {
            return Err(CompileError::type_error(
                span.start,
                "custom(start, end) is only valid as the base of temporal_hours",
            ))
        }
    };
    Ok((Expr::Call(call), Kind::Instant))
}

/// `amount before|after anchor`. Minute amounts shift any instant; degree amounts become a
/// solar-angle crossing and need a sunrise, sunset or noon anchor.
fn resolve_directed(
    amount: ExprDef,
    dir: Dir,
    anchor: ExprDef,
    span: Span,
) -> Result<Typed, CompileError> {
    if let Some((degrees, Unit::Degrees)) = constant(&amount) {
        let degrees = check_range("solar angle", degrees, 0.0, 90.0, false, amount.span().start)?;
        let anchor_offset = anchor.span().start;
        let direction = match resolve_expr(anchor)? {
            (Expr::Primitive(p), _) => Direction::from_parts(dir == Dir::Before, p),
            _ => None,
        };
        let Some(direction) = direction else {
            return Err(CompileError::direction(
                anchor_offset,
                "degree offsets need sunrise, sunset or noon as the anchor",
            ));
        };
        return Ok((Expr::Call(Call::SolarAngle { degrees, direction }), Kind::Instant));
    }

    let amount_offset = amount.span().start;
    let (amount, amount_kind) = resolve_expr(amount)?;
    match amount_kind {
        Kind::Duration => {}
        Kind::Number => {
            return Err(CompileError::direction(
                amount_offset,
                "offset needs a unit, e.g. 72min or 16.1deg",
            ))
        }
        k => {
            return Err(CompileError::direction(
                span.start,
                format!("cannot place {k} before or after a time"),
            ))
        }
    }
    let anchor = expect_kind(anchor, Kind::Instant)?;
    Ok((
        Expr::Directed {
            amount: Box::new(amount),
            dir,
            anchor: Box::new(anchor),
        },
        Kind::Instant,
    ))
}

fn check_day_month(d: DayMonth, span: Span) -> Result<(), CompileError> {
    // 29-Feb is accepted here; whether it exists depends on the evaluation year.
    let max = match d.month {
        2 => 29,
        4 | 6 | 9 | 11 => 30,
        _ => 31,
    };
    if d.day == 0 || d.day > max {
        return Err(CompileError::Range {
            what: "day of month",
            value: d.day as f64,
            min: 1.0,
            max: max as f64,
            offset: span.start,
        });
    }
    Ok(())
}
