//! Compile-time errors. Everything that can go wrong while turning formula text into a
//! tree lands in [CompileError]; evaluation never fails, it yields [crate::Undefined].

use crate::lexer::LexError;
use crate::resolve::Kind;
use thiserror::Error;

/// Required argument count of a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(self, n: usize) -> bool {
        match self {
            Arity::Exactly(k) => n == k,
            Arity::AtLeast(k) => n >= k,
        }
    }
}

impl std::fmt::Display for Arity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Arity::Exactly(n) => write!(f, "{n}"),
            Arity::AtLeast(n) => write!(f, "at least {n}"),
        }
    }
}

/// Errors that block a formula from being stored. Each carries the byte offset of the
/// offending token.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    #[error("lex error: {0}")]
    Lex(#[from] LexError),
    #[error("parse error at offset {offset}: {message}")]
    Parse { offset: usize, message: String },
    #[error("unknown symbol `{name}` at offset {offset}{}", did_you_mean(.suggestion))]
    UnknownSymbol {
        name: String,
        offset: usize,
        /// Closest known spelling, if any is close enough.
        suggestion: Option<String>,
    },
    #[error("`{function}` takes {expected} argument(s), got {found} (offset {offset})")]
    Arity {
        function: &'static str,
        expected: Arity,
        found: usize,
        offset: usize,
    },
    #[error("unknown base `{name}` at offset {offset}{}", did_you_mean(.suggestion))]
    UnknownBase {
        name: String,
        offset: usize,
        suggestion: Option<String>,
    },
    #[error("invalid direction at offset {offset}: {message}")]
    Direction { offset: usize, message: String },
    #[error("{what} {value} at offset {offset} is outside {min}..={max}")]
    Range {
        what: &'static str,
        value: f64,
        min: f64,
        max: f64,
        offset: usize,
    },
    #[error("type error at offset {offset}: {message}")]
    Type { offset: usize, message: String },
    #[error("formula must produce a time, but produces {found}")]
    NotATime { found: Kind },
}

fn did_you_mean(suggestion: &Option<String>) -> String {
    suggestion
        .as_ref()
        .map(|s| format!("; did you mean `{s}`?"))
        .unwrap_or_default()
}

impl CompileError {
    /// Byte offset in the formula text.
    pub fn offset(&self) -> usize {
        match self {
            CompileError::Lex(e) => e.offset,
            CompileError::Parse { offset, .. }
            | CompileError::UnknownSymbol { offset, .. }
            | CompileError::Arity { offset, .. }
            | CompileError::UnknownBase { offset, .. }
            | CompileError::Direction { offset, .. }
            | CompileError::Range { offset, .. }
            | CompileError::Type { offset, .. } => *offset,
            CompileError::NotATime { .. } => 0,
        }
    }

    pub fn suggestion(&self) -> Option<&str> {
        match self {
            CompileError::UnknownSymbol { suggestion, .. }
            | CompileError::UnknownBase { suggestion, .. } => suggestion.as_deref(),
            _ => None,
        }
    }

    pub(crate) fn type_error(offset: usize, message: impl Into<String>) -> Self {
        CompileError::Type {
            offset,
            message: message.into(),
        }
    }

    pub(crate) fn direction(offset: usize, message: impl Into<String>) -> Self {
        CompileError::Direction {
            offset,
            message: message.into(),
        }
    }
}

/// A location record failed validation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LocationError {
    #[error("latitude {0} is outside -90..=90")]
    Latitude(f64),
    #[error("longitude {0} is outside -180..=180")]
    Longitude(f64),
    #[error("elevation {0} m is not a finite value")]
    Elevation(f64),
}

/// The base registry has no entry for a base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("base `{0}` is not registered")]
pub struct UnknownBaseError(pub crate::symbol::Base);
