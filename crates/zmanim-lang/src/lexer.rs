//! Custom lexer: produces Ident or FuncIdent (identifier followed by "(") so the grammar
//! can tell `custom(a, b)` from a bare name. Identifiers are classified through the alias
//! table here; numbers carry their unit (hours are folded into minutes).

use crate::alias_table;
use crate::symbol::Symbol;
use ordered_float::OrderedFloat;
use std::str::FromStr;
use thiserror::Error;

pub type Spanned<Tok, Loc, Error> = Result<(Loc, Tok, Loc), Error>;

/// Unit attached to a numeric literal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Unit {
    None,
    Minutes,
    Degrees,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NumberLit {
    pub magnitude: OrderedFloat<f64>,
    pub unit: Unit,
}

impl NumberLit {
    pub fn new(magnitude: f64, unit: Unit) -> Self {
        Self {
            magnitude: OrderedFloat(magnitude),
            unit,
        }
    }
}

/// Identifier text plus its canonical symbol, if the alias table knows it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Word {
    pub text: String,
    pub symbol: Option<Symbol>,
}

/// `21-May` style literal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DayMonth {
    pub day: u32,
    pub month: u32,
}

/// `06:30` style literal, local wall time.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClockTime {
    pub hour: u32,
    pub minute: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Tok {
    Num(NumberLit),
    Ident(Word),
    /// Identifier that is immediately followed by "(" (function call).
    FuncIdent(Word),
    /// `@name` cross-reference.
    Ref(String),
    Text(String),
    Date(DayMonth),
    Clock(ClockTime),
    Before,
    After,
    If,
    Else,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Plus,
    Minus,
    Star,
    Slash,
    EqEq,
    NotEq,
    Lt,
    Le,
    Gt,
    Ge,
    AndAnd,
    OrOr,
    Bang,
}

impl Tok {
    /// Short description used in parse error messages.
    pub fn describe(&self) -> String {
        match self {
            Tok::Num(n) => format!("number {}", n.magnitude),
            Tok::Ident(w) | Tok::FuncIdent(w) => format!("`{}`", w.text),
            Tok::Ref(name) => format!("`@{name}`"),
            Tok::Text(s) => format!("\"{s}\""),
            Tok::Date(d) => format!("date {}-{}", d.day, d.month),
            Tok::Clock(c) => format!("time {:02}:{:02}", c.hour, c.minute),
            Tok::Before => "`before`".into(),
            Tok::After => "`after`".into(),
            Tok::If => "`if`".into(),
            Tok::Else => "`else`".into(),
            Tok::LParen => "`(`".into(),
            Tok::RParen => "`)`".into(),
            Tok::LBrace => "`{`".into(),
            Tok::RBrace => "`}`".into(),
            Tok::Comma => "`,`".into(),
            Tok::Plus => "`+`".into(),
            Tok::Minus => "`-`".into(),
            Tok::Star => "`*`".into(),
            Tok::Slash => "`/`".into(),
            Tok::EqEq => "`==`".into(),
            Tok::NotEq => "`!=`".into(),
            Tok::Lt => "`<`".into(),
            Tok::Le => "`<=`".into(),
            Tok::Gt => "`>`".into(),
            Tok::Ge => "`>=`".into(),
            Tok::AndAnd => "`&&`".into(),
            Tok::OrOr => "`||`".into(),
            Tok::Bang => "`!`".into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum LexErrorKind {
    #[error("malformed number `{0}`")]
    MalformedNumber(String),
    #[error("unknown unit `{0}` (expected min, h or deg)")]
    UnknownUnit(String),
    #[error("`@` must be followed by a formula name")]
    UnterminatedReference,
    #[error("unterminated string")]
    UnterminatedString,
    #[error("unterminated block comment")]
    UnterminatedComment,
    #[error("illegal character `{0}`")]
    IllegalCharacter(char),
    #[error("invalid time of day `{0}`")]
    InvalidClock(String),
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{kind} at offset {offset}")]
pub struct LexError {
    pub offset: usize,
    pub kind: LexErrorKind,
}

impl LexError {
    fn new(offset: usize, kind: LexErrorKind) -> Self {
        Self { offset, kind }
    }
}

/// A token with its source text and byte span.
#[derive(Clone, Debug, PartialEq)]
pub struct Token<'input> {
    pub tok: Tok,
    pub text: &'input str,
    pub start: usize,
    pub end: usize,
}

/// Lex the whole input, stopping at the first error.
pub fn tokenize(input: &str) -> Result<Vec<Token<'_>>, LexError> {
    Lexer::new(input)
        .map(|item| {
            item.map(|(start, tok, end)| Token {
                tok,
                text: &input[start..end],
                start,
                end,
            })
        })
        .collect()
}

enum Suffix {
    Minutes,
    Hours,
    Degrees,
}

fn unit_suffix(word: &str) -> Option<Suffix> {
    match word {
        "min" | "mins" | "minute" | "minutes" => Some(Suffix::Minutes),
        "h" | "hr" | "hrs" | "hour" | "hours" => Some(Suffix::Hours),
        "deg" | "degree" | "degrees" | "°" => Some(Suffix::Degrees),
        _ => None,
    }
}

fn month_number(word: &str) -> Option<u32> {
    const MONTHS: [&str; 12] = [
        "january", "february", "march", "april", "may", "june", "july", "august", "september",
        "october", "november", "december",
    ];
    let lower = word.to_ascii_lowercase();
    MONTHS
        .iter()
        .position(|m| *m == lower || (lower.len() == 3 && m.starts_with(&lower)))
        .map(|i| i as u32 + 1)
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

pub struct Lexer<'input> {
    input: &'input str,
    pos: usize,
    failed: bool,
}

impl<'input> Lexer<'input> {
    pub fn new(input: &'input str) -> Self {
        Lexer {
            input,
            pos: 0,
            failed: false,
        }
    }

    fn rest(&self) -> &'input str {
        &self.input[self.pos..]
    }

    /// Skip whitespace and comments.
    fn skip_trivia(&mut self) -> Result<(), LexError> {
        loop {
            let rest = self.rest();
            let trimmed = rest.trim_start();
            self.pos += rest.len() - trimmed.len();
            if trimmed.starts_with("//") {
                self.pos += trimmed.find('\n').unwrap_or(trimmed.len());
            } else if let Some(body) = trimmed.strip_prefix("/*") {
                match body.find("*/") {
                    Some(end) => self.pos += 2 + end + 2,
                    None => {
                        return Err(LexError::new(self.pos, LexErrorKind::UnterminatedComment))
                    }
                }
            } else {
                return Ok(());
            }
        }
    }

    fn peek_next_non_space(&self) -> Option<char> {
        self.rest().chars().find(|c| !c.is_whitespace())
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'input str {
        let rest = self.rest();
        let end = rest.find(|c: char| !pred(c)).unwrap_or(rest.len());
        self.pos += end;
        &rest[..end]
    }

    fn take_ident(&mut self) -> Tok {
        let text = self.take_while(is_ident_char);
        match text {
            "before" => return Tok::Before,
            "after" => return Tok::After,
            "if" => return Tok::If,
            "else" => return Tok::Else,
            _ => {}
        }
        let word = Word {
            text: text.to_string(),
            symbol: alias_table::lookup(text),
        };
        if self.peek_next_non_space() == Some('(') {
            Tok::FuncIdent(word)
        } else {
            Tok::Ident(word)
        }
    }

    /// Digits with an optional fraction. Returns the literal text.
    fn take_decimal(&mut self) -> Result<&'input str, LexError> {
        let start = self.pos;
        self.take_while(|c| c.is_ascii_digit());
        if self.rest().starts_with('.') {
            self.pos += 1;
            let frac = self.take_while(|c| c.is_ascii_digit());
            if frac.is_empty() || self.rest().starts_with('.') {
                self.take_while(|c| c.is_ascii_digit() || c == '.');
                return Err(LexError::new(
                    start,
                    LexErrorKind::MalformedNumber(self.input[start..self.pos].to_string()),
                ));
            }
        }
        Ok(&self.input[start..self.pos])
    }

    /// Read a unit word right after a number. Attached letters must be a unit;
    /// after whitespace only a known unit word is consumed.
    fn take_suffix(&mut self) -> Result<Option<Suffix>, LexError> {
        let rest = self.rest();
        if let Some(after) = rest.strip_prefix('°') {
            self.pos += rest.len() - after.len();
            return Ok(Some(Suffix::Degrees));
        }
        if rest.starts_with(|c: char| c.is_ascii_alphabetic()) {
            let start = self.pos;
            let word = self.take_while(is_ident_char);
            return match unit_suffix(word) {
                Some(s) => Ok(Some(s)),
                None => Err(LexError::new(
                    start,
                    LexErrorKind::UnknownUnit(word.to_string()),
                )),
            };
        }
        let trimmed = rest.trim_start();
        if trimmed.len() == rest.len() {
            return Ok(None);
        }
        if let Some(after) = trimmed.strip_prefix('°') {
            self.pos += rest.len() - after.len();
            return Ok(Some(Suffix::Degrees));
        }
        let word_len = trimmed.find(|c: char| !is_ident_char(c)).unwrap_or(trimmed.len());
        let word = &trimmed[..word_len];
        let called = trimmed[word_len..].trim_start().starts_with('(');
        match unit_suffix(word) {
            Some(s) if !called => {
                self.pos += rest.len() - trimmed.len() + word_len;
                Ok(Some(s))
            }
            _ => Ok(None),
        }
    }

    /// Finite value of `text`; digit strings too long for an `f64` are malformed.
    fn parse_magnitude(&self, text: &str, start: usize) -> Result<f64, LexError> {
        let malformed = || LexError::new(start, LexErrorKind::MalformedNumber(text.to_string()));
        let value = f64::from_str(text).map_err(|_| malformed())?;
        if value.is_finite() {
            Ok(value)
        } else {
            Err(malformed())
        }
    }

    /// Number with optional unit, or a date / clock literal that starts with digits.
    fn take_number(&mut self) -> Result<Tok, LexError> {
        let start = self.pos;
        let digits = self.take_decimal()?;
        let integral = !digits.contains('.');

        if integral {
            if let Some(tok) = self.try_date(digits)? {
                return Ok(tok);
            }
            if let Some(tok) = self.try_clock(start, digits)? {
                return Ok(tok);
            }
        }

        let magnitude = self.parse_magnitude(digits, start)?;
        match self.take_suffix()? {
            None => Ok(Tok::Num(NumberLit::new(magnitude, Unit::None))),
            Some(Suffix::Degrees) => Ok(Tok::Num(NumberLit::new(magnitude, Unit::Degrees))),
            Some(Suffix::Minutes) => Ok(Tok::Num(NumberLit::new(magnitude, Unit::Minutes))),
            Some(Suffix::Hours) => {
                let minutes = magnitude * 60.0 + self.take_trailing_minutes()?;
                if !minutes.is_finite() {
                    return Err(LexError::new(
                        start,
                        LexErrorKind::MalformedNumber(digits.to_string()),
                    ));
                }
                Ok(Tok::Num(NumberLit::new(minutes, Unit::Minutes)))
            }
        }
    }

    /// `1h 30min`: a minutes literal directly after an hours literal folds into it.
    fn take_trailing_minutes(&mut self) -> Result<f64, LexError> {
        let saved = self.pos;
        let rest = self.rest();
        let trimmed = rest.trim_start();
        if !trimmed.starts_with(|c: char| c.is_ascii_digit()) {
            return Ok(0.0);
        }
        self.pos += rest.len() - trimmed.len();
        let start = self.pos;
        let digits = match self.take_decimal() {
            Ok(d) => d,
            Err(_) => {
                self.pos = saved;
                return Ok(0.0);
            }
        };
        match self.take_suffix() {
            Ok(Some(Suffix::Minutes)) => self.parse_magnitude(digits, start),
            _ => {
                self.pos = saved;
                Ok(0.0)
            }
        }
    }

    fn try_date(&mut self, digits: &str) -> Result<Option<Tok>, LexError> {
        let Some(after_dash) = self.rest().strip_prefix('-') else {
            return Ok(None);
        };
        let name_len = after_dash
            .find(|c: char| !c.is_ascii_alphabetic())
            .unwrap_or(after_dash.len());
        let Some(month) = month_number(&after_dash[..name_len]) else {
            return Ok(None);
        };
        let day = digits.parse::<u32>().unwrap_or(0);
        self.pos += 1 + name_len;
        Ok(Some(Tok::Date(DayMonth { day, month })))
    }

    fn try_clock(&mut self, start: usize, digits: &str) -> Result<Option<Tok>, LexError> {
        let Some(after_colon) = self.rest().strip_prefix(':') else {
            return Ok(None);
        };
        let minute_len = after_colon
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(after_colon.len());
        self.pos += 1 + minute_len;
        let text = &self.input[start..self.pos];
        let invalid = || LexError::new(start, LexErrorKind::InvalidClock(text.to_string()));
        if minute_len != 2 || digits.len() > 2 {
            return Err(invalid());
        }
        let hour = digits.parse::<u32>().map_err(|_| invalid())?;
        let minute = after_colon[..2].parse::<u32>().map_err(|_| invalid())?;
        if hour > 23 || minute > 59 {
            return Err(invalid());
        }
        Ok(Some(Tok::Clock(ClockTime { hour, minute })))
    }

    fn take_string(&mut self, quote: char) -> Result<Tok, LexError> {
        let start = self.pos;
        self.pos += quote.len_utf8();
        let rest = self.rest();
        match rest.find(quote) {
            Some(end) => {
                let text = rest[..end].to_string();
                self.pos += end + quote.len_utf8();
                Ok(Tok::Text(text))
            }
            None => Err(LexError::new(start, LexErrorKind::UnterminatedString)),
        }
    }

    fn take_reference(&mut self) -> Result<Tok, LexError> {
        let start = self.pos;
        self.pos += 1;
        let name = self.take_while(is_ident_char);
        if name.is_empty() {
            return Err(LexError::new(start, LexErrorKind::UnterminatedReference));
        }
        Ok(Tok::Ref(name.to_string()))
    }

    /// Two-char operator if the next char is `second`, else `single` (or an error).
    fn pair(&mut self, c: char, second: char, double: Tok, single: Option<Tok>) -> Result<Tok, LexError> {
        let start = self.pos;
        self.pos += c.len_utf8();
        if self.rest().starts_with(second) {
            self.pos += second.len_utf8();
            return Ok(double);
        }
        single.ok_or(LexError::new(start, LexErrorKind::IllegalCharacter(c)))
    }

    fn next_token(&mut self) -> Result<Tok, LexError> {
        let rest = self.rest();
        let Some(c) = rest.chars().next() else {
            return Err(LexError::new(self.pos, LexErrorKind::IllegalCharacter('\0')));
        };
        let single = |tok: Tok, lexer: &mut Self| -> Result<Tok, LexError> {
            lexer.pos += c.len_utf8();
            Ok(tok)
        };
        match c {
            '(' => single(Tok::LParen, self),
            ')' => single(Tok::RParen, self),
            '{' => single(Tok::LBrace, self),
            '}' => single(Tok::RBrace, self),
            ',' => single(Tok::Comma, self),
            '+' => single(Tok::Plus, self),
            '-' => single(Tok::Minus, self),
            '*' | '×' => single(Tok::Star, self),
            '/' | '÷' => single(Tok::Slash, self),
            '=' => self.pair(c, '=', Tok::EqEq, None),
            '!' => self.pair(c, '=', Tok::NotEq, Some(Tok::Bang)),
            '<' => self.pair(c, '=', Tok::Le, Some(Tok::Lt)),
            '>' => self.pair(c, '=', Tok::Ge, Some(Tok::Gt)),
            '&' => self.pair(c, '&', Tok::AndAnd, None),
            '|' => self.pair(c, '|', Tok::OrOr, None),
            '@' => self.take_reference(),
            '"' | '\'' => self.take_string(c),
            'a'..='z' | 'A'..='Z' | '_' => Ok(self.take_ident()),
            '0'..='9' => self.take_number(),
            '.' if rest[1..].starts_with(|d: char| d.is_ascii_digit()) => self.take_number(),
            _ => Err(LexError::new(self.pos, LexErrorKind::IllegalCharacter(c))),
        }
    }
}

impl<'input> Iterator for Lexer<'input> {
    type Item = Spanned<Tok, usize, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        if let Err(e) = self.skip_trivia() {
            self.failed = true;
            return Some(Err(e));
        }
        if self.pos >= self.input.len() {
            return None;
        }
        let start = self.pos;
        match self.next_token() {
            Ok(tok) => Some(Ok((start, tok, self.pos))),
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}
