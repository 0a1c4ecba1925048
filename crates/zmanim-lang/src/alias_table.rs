//! Alias table: surface names → canonical symbols.
//! Built once from [ALIASES]; new spellings are added to that list, never removed or repointed.

use crate::symbol::{Base, Direction, Function, Primitive, Symbol, Variable};
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Extra spellings on top of the canonical names. Append only.
pub const ALIASES: &[(&str, Symbol)] = &[
    ("sunrise", Symbol::Primitive(Primitive::VisibleSunrise)),
    ("hanetz", Symbol::Primitive(Primitive::VisibleSunrise)),
    ("netz", Symbol::Primitive(Primitive::VisibleSunrise)),
    ("sunset", Symbol::Primitive(Primitive::VisibleSunset)),
    ("shkiah", Symbol::Primitive(Primitive::VisibleSunset)),
    ("noon", Symbol::Primitive(Primitive::SolarNoon)),
    ("chatzos", Symbol::Primitive(Primitive::SolarNoon)),
    ("midnight", Symbol::Primitive(Primitive::SolarMidnight)),
    ("chatzos_layla", Symbol::Primitive(Primitive::SolarMidnight)),
    ("first_valid", Symbol::Function(Function::Fallback)),
    ("solar", Symbol::Function(Function::SolarAngle)),
    ("seasonal_solar", Symbol::Function(Function::SeasonalSolarAngle)),
    ("proportional_hours", Symbol::Function(Function::TemporalHours)),
    ("shaos_zmaniyos", Symbol::Function(Function::TemporalHours)),
    ("proportional_minutes", Symbol::Function(Function::TemporalMinutes)),
    ("before_sunrise", Symbol::Direction(Direction::BeforeVisibleSunrise)),
    ("after_sunrise", Symbol::Direction(Direction::AfterVisibleSunrise)),
    ("before_sunset", Symbol::Direction(Direction::BeforeVisibleSunset)),
    ("after_sunset", Symbol::Direction(Direction::AfterVisibleSunset)),
    ("mga", Symbol::Base(Base::Mga72)),
    ("lat", Symbol::Variable(Variable::Latitude)),
    ("lon", Symbol::Variable(Variable::Longitude)),
    ("lng", Symbol::Variable(Variable::Longitude)),
];

/// Minimum similarity for [AliasTable::suggest] to offer a name.
pub const SUGGESTION_THRESHOLD: f64 = 0.85;

/// Bidirectional lookup between surface names and canonical symbols.
#[derive(Clone, Debug, Default)]
pub struct AliasTable {
    forward: HashMap<&'static str, Symbol>,
    reverse: HashMap<Symbol, Vec<&'static str>>,
}

static TABLE: Lazy<AliasTable> = Lazy::new(AliasTable::builtin);

/// The process-wide table.
pub fn alias_table() -> &'static AliasTable {
    &TABLE
}

/// Shorthand for `alias_table().lookup(name)`.
pub fn lookup(name: &str) -> Option<Symbol> {
    TABLE.lookup(name)
}

impl AliasTable {
    /// Canonical names of every symbol, then [ALIASES].
    pub fn builtin() -> Self {
        let mut table = Self::default();
        for symbol in Symbol::all() {
            table.insert(symbol.canonical_name(), symbol);
        }
        for &(name, symbol) in ALIASES {
            table.insert(name, symbol);
        }
        table
    }

    /// Add a spelling. A name that is already bound keeps its first symbol.
    fn insert(&mut self, name: &'static str, symbol: Symbol) {
        if self.forward.contains_key(name) {
            log::warn!("alias `{name}` is already bound; ignoring rebinding to {symbol}");
            return;
        }
        self.forward.insert(name, symbol);
        self.reverse.entry(symbol).or_default().push(name);
    }

    pub fn lookup(&self, name: &str) -> Option<Symbol> {
        self.forward.get(name).copied()
    }

    /// All spellings of `symbol`, canonical name first.
    pub fn surface_names(&self, symbol: Symbol) -> &[&'static str] {
        self.reverse.get(&symbol).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of surface names.
    pub fn len(&self) -> usize {
        self.forward.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forward.is_empty()
    }

    /// Closest surface name to a misspelled `name` among the symbols `accept` admits, by
    /// Jaro-Winkler similarity. Nothing is suggested below [SUGGESTION_THRESHOLD].
    pub fn suggest(&self, name: &str, accept: impl Fn(Symbol) -> bool) -> Option<&'static str> {
        let name = name.to_ascii_lowercase();
        let mut best: Option<(f64, &'static str)> = None;
        for symbol in Symbol::all().filter(|s| accept(*s)) {
            for &candidate in self.surface_names(symbol) {
                let score = strsim::jaro_winkler(&name, candidate);
                if score >= SUGGESTION_THRESHOLD && best.map_or(true, |(b, _)| score > b) {
                    best = Some((score, candidate));
                }
            }
        }
        best.map(|(_, candidate)| candidate)
    }

    /// (surface name, symbol) pairs sorted by name, for listings.
    pub fn entries(&self) -> Vec<(&'static str, Symbol)> {
        let mut entries: Vec<_> = self.forward.iter().map(|(n, s)| (*n, *s)).collect();
        entries.sort_unstable_by_key(|(n, _)| *n);
        entries
    }
}
