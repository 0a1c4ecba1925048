//! IR: the parse tree produced by the grammar (`ExprDef`, spans and raw words) and the
//! canonical tree produced by resolve (`Expr`, canonical symbols only, no positions).

use crate::lexer::{ClockTime, DayMonth, NumberLit, Word};
use crate::symbol::{Base, Direction, Primitive, Variable};
use ordered_float::OrderedFloat;
use std::collections::BTreeSet;
use std::fmt;

/// Byte range in the formula text.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// `before` / `after` keyword.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Dir {
    Before,
    After,
}

/// Parsed, unresolved expression. Words are still surface spellings.
#[derive(Clone, Debug, PartialEq)]
pub enum ExprDef {
    Number(NumberLit, Span),
    Word(Word, Span),
    Call(Word, Vec<ExprDef>, Span),
    Ref(String, Span),
    Text(String, Span),
    Date(DayMonth, Span),
    Clock(ClockTime, Span),
    Neg(Box<ExprDef>, Span),
    Binary(BinOp, Box<ExprDef>, Box<ExprDef>, Span),
    Directed {
        amount: Box<ExprDef>,
        dir: Dir,
        anchor: Box<ExprDef>,
        span: Span,
    },
    Compare(CmpOp, Box<ExprDef>, Box<ExprDef>, Span),
    And(Box<ExprDef>, Box<ExprDef>, Span),
    Or(Box<ExprDef>, Box<ExprDef>, Span),
    Not(Box<ExprDef>, Span),
    If {
        cond: Box<ExprDef>,
        then: Box<ExprDef>,
        otherwise: Option<Box<ExprDef>>,
        span: Span,
    },
}

impl ExprDef {
    pub fn span(&self) -> Span {
        match self {
            ExprDef::Number(_, s)
            | ExprDef::Word(_, s)
            | ExprDef::Call(_, _, s)
            | ExprDef::Ref(_, s)
            | ExprDef::Text(_, s)
            | ExprDef::Date(_, s)
            | ExprDef::Clock(_, s)
            | ExprDef::Neg(_, s)
            | ExprDef::Binary(_, _, _, s)
            | ExprDef::Compare(_, _, _, s)
            | ExprDef::And(_, _, s)
            | ExprDef::Or(_, _, s)
            | ExprDef::Not(_, s) => *s,
            ExprDef::Directed { span, .. } | ExprDef::If { span, .. } => *span,
        }
    }
}

/// Literal value with its unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Literal {
    Number(OrderedFloat<f64>),
    Minutes(OrderedFloat<f64>),
    Degrees(OrderedFloat<f64>),
}

/// Day definition used by temporal hours.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DayBase {
    Named(Base),
    Custom(Box<Expr>, Box<Expr>),
}

/// Function call with arguments already checked for arity and kind.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Call {
    Fallback(Vec<Expr>),
    Midpoint(Box<Expr>, Box<Expr>),
    EarlierOf(Box<Expr>, Box<Expr>),
    LaterOf(Box<Expr>, Box<Expr>),
    TemporalHours {
        hours: OrderedFloat<f64>,
        base: DayBase,
    },
    TemporalMinutes {
        minutes: OrderedFloat<f64>,
        direction: Direction,
    },
    SolarAngle {
        degrees: OrderedFloat<f64>,
        direction: Direction,
    },
    SeasonalSolarAngle {
        degrees: OrderedFloat<f64>,
        direction: Direction,
    },
}

/// Compiled formula: canonical symbols only. Two formulas that differ only in aliases
/// compile to equal trees.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Expr {
    Literal(Literal),
    Primitive(Primitive),
    Variable(Variable),
    Call(Call),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Neg(Box<Expr>),
    /// `anchor ± amount` where amount is a duration.
    Directed {
        amount: Box<Expr>,
        dir: Dir,
        anchor: Box<Expr>,
    },
    Reference(String),
    Text(String),
    DayOfYear(DayMonth),
    Clock(ClockTime),
    Compare(CmpOp, Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Conditional {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Option<Box<Expr>>,
    },
}

impl Expr {
    /// Names of all `@references` in this tree (base definitions excluded).
    pub fn references(&self) -> BTreeSet<String> {
        let mut out = BTreeSet::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references(&self, out: &mut BTreeSet<String>) {
        match self {
            Expr::Reference(name) => {
                out.insert(name.clone());
            }
            Expr::Literal(_)
            | Expr::Primitive(_)
            | Expr::Variable(_)
            | Expr::Text(_)
            | Expr::DayOfYear(_)
            | Expr::Clock(_) => {}
            Expr::Neg(e) | Expr::Not(e) => e.collect_references(out),
            Expr::Binary(_, a, b)
            | Expr::Compare(_, a, b)
            | Expr::And(a, b)
            | Expr::Or(a, b)
            | Expr::Directed {
                amount: a,
                anchor: b,
                ..
            } => {
                a.collect_references(out);
                b.collect_references(out);
            }
            Expr::Conditional {
                cond,
                then,
                otherwise,
            } => {
                cond.collect_references(out);
                then.collect_references(out);
                if let Some(e) = otherwise {
                    e.collect_references(out);
                }
            }
            Expr::Call(call) => match call {
                Call::Fallback(args) => args.iter().for_each(|a| a.collect_references(out)),
                Call::Midpoint(a, b) | Call::EarlierOf(a, b) | Call::LaterOf(a, b) => {
                    a.collect_references(out);
                    b.collect_references(out);
                }
                Call::TemporalHours {
                    base: DayBase::Custom(a, b),
                    ..
                } => {
                    a.collect_references(out);
                    b.collect_references(out);
                }
                Call::TemporalHours { .. }
                | Call::TemporalMinutes { .. }
                | Call::SolarAngle { .. }
                | Call::SeasonalSolarAngle { .. } => {}
            },
        }
    }

    /// Binding strength used when printing; higher binds tighter.
    fn precedence(&self) -> u8 {
        match self {
            Expr::Or(..) => 1,
            Expr::And(..) => 2,
            Expr::Not(..) => 3,
            Expr::Compare(..) => 4,
            Expr::Binary(BinOp::Add | BinOp::Sub, ..) => 5,
            Expr::Directed { .. } => 6,
            Expr::Binary(BinOp::Mul | BinOp::Div, ..) => 7,
            Expr::Neg(..) => UNARY,
            _ => 9,
        }
    }
}

impl fmt::Display for BinOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
        })
    }
}

impl fmt::Display for CmpOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        })
    }
}

impl fmt::Display for Dir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Dir::Before => "before",
            Dir::After => "after",
        })
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Number(n) => write!(f, "{n}"),
            Literal::Minutes(n) => write!(f, "{n}min"),
            Literal::Degrees(n) => write!(f, "{n}deg"),
        }
    }
}

const UNARY: u8 = 8;

const MONTH_ABBREV: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Write `e`, parenthesised when it binds looser than `min`.
fn write_operand(f: &mut fmt::Formatter<'_>, e: &Expr, min: u8) -> fmt::Result {
    if e.precedence() < min {
        write!(f, "({e})")
    } else {
        write!(f, "{e}")
    }
}

impl fmt::Display for Call {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Call::Fallback(args) => {
                f.write_str("fallback(")?;
                for (i, a) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{a}")?;
                }
                f.write_str(")")
            }
            Call::Midpoint(a, b) => write!(f, "midpoint({a}, {b})"),
            Call::EarlierOf(a, b) => write!(f, "earlier_of({a}, {b})"),
            Call::LaterOf(a, b) => write!(f, "later_of({a}, {b})"),
            Call::TemporalHours { hours, base } => match base {
                DayBase::Named(b) => write!(f, "temporal_hours({hours}, {b})"),
                DayBase::Custom(s, e) => write!(f, "temporal_hours({hours}, custom({s}, {e}))"),
            },
            Call::TemporalMinutes { minutes, direction } => {
                write!(f, "temporal_minutes({minutes}, {direction})")
            }
            Call::SolarAngle { degrees, direction } => {
                write!(f, "solar_angle({degrees}, {direction})")
            }
            Call::SeasonalSolarAngle { degrees, direction } => {
                write!(f, "seasonal_solar_angle({degrees}, {direction})")
            }
        }
    }
}

/// Canonical source text; compiling it yields an equal tree.
impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prec = self.precedence();
        match self {
            Expr::Literal(l) => write!(f, "{l}"),
            Expr::Primitive(p) => write!(f, "{p}"),
            Expr::Variable(v) => write!(f, "{v}"),
            Expr::Call(c) => write!(f, "{c}"),
            Expr::Binary(op, a, b) => {
                // left-associative: the right operand needs strictly tighter binding
                write_operand(f, a, prec)?;
                write!(f, " {op} ")?;
                write_operand(f, b, prec + 1)
            }
            Expr::Neg(e) => {
                f.write_str("-")?;
                write_operand(f, e, prec)
            }
            Expr::Directed {
                amount,
                dir,
                anchor,
            } => {
                write_operand(f, amount, prec + 1)?;
                write!(f, " {dir} ")?;
                write_operand(f, anchor, UNARY)
            }
            Expr::Reference(name) => write!(f, "@{name}"),
            Expr::Text(s) if s.contains('"') => write!(f, "'{s}'"),
            Expr::Text(s) => write!(f, "\"{s}\""),
            Expr::DayOfYear(d) => {
                let month = MONTH_ABBREV
                    .get(d.month.saturating_sub(1) as usize)
                    .copied()
                    .unwrap_or("Jan");
                write!(f, "{}-{month}", d.day)
            }
            Expr::Clock(c) => write!(f, "{:02}:{:02}", c.hour, c.minute),
            Expr::Compare(op, a, b) => {
                write_operand(f, a, prec + 1)?;
                write!(f, " {op} ")?;
                write_operand(f, b, prec + 1)
            }
            Expr::And(a, b) | Expr::Or(a, b) => {
                let op = if matches!(self, Expr::And(..)) { "&&" } else { "||" };
                write_operand(f, a, prec)?;
                write!(f, " {op} ")?;
                write_operand(f, b, prec + 1)
            }
            Expr::Not(e) => {
                f.write_str("!")?;
                write_operand(f, e, prec)
            }
            Expr::Conditional {
                cond,
                then,
                otherwise,
            } => {
                write!(f, "if ({cond}) {{ {then} }}")?;
                if let Some(e) = otherwise {
                    write!(f, " else {{ {e} }}")?;
                }
                Ok(())
            }
        }
    }
}
