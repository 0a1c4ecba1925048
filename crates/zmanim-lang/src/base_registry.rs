//! Base registry: named day definitions (start and end formulas) for temporal hours.

use crate::error::{CompileError, UnknownBaseError};
use crate::ir::Expr;
use crate::symbol::Base;
use once_cell::sync::Lazy;
use std::collections::HashMap;

/// Built-in bases as `(base, start, end, description)`. Formula text is compiled once when the
/// default registry is first used. Solar angles in a base boundary are measured from the
/// horizon seen at the location's elevation.
pub const BUILTIN_BASES: &[(Base, &str, &str, &str)] = &[
    (
        Base::Gra,
        "visible_sunrise",
        "visible_sunset",
        "Vilna Gaon: visible sunrise to visible sunset",
    ),
    (
        Base::Mga60,
        "visible_sunrise - 60min",
        "visible_sunset + 60min",
        "Magen Avraham, 60 fixed minutes before sunrise and after sunset",
    ),
    (
        Base::Mga72,
        "visible_sunrise - 72min",
        "visible_sunset + 72min",
        "Magen Avraham, 72 fixed minutes before sunrise and after sunset",
    ),
    (
        Base::Mga90,
        "visible_sunrise - 90min",
        "visible_sunset + 90min",
        "Magen Avraham, 90 fixed minutes before sunrise and after sunset",
    ),
    (
        Base::Mga96,
        "visible_sunrise - 96min",
        "visible_sunset + 96min",
        "Magen Avraham, 96 fixed minutes before sunrise and after sunset",
    ),
    (
        Base::Mga120,
        "visible_sunrise - 120min",
        "visible_sunset + 120min",
        "Magen Avraham, 120 fixed minutes before sunrise and after sunset",
    ),
    (
        Base::Mga72Zmanis,
        "temporal_minutes(72, before_visible_sunrise)",
        "temporal_minutes(72, after_visible_sunset)",
        "Magen Avraham, 72 proportional minutes (1/10 of the day)",
    ),
    (
        Base::Mga90Zmanis,
        "temporal_minutes(90, before_visible_sunrise)",
        "temporal_minutes(90, after_visible_sunset)",
        "Magen Avraham, 90 proportional minutes (1/8 of the day)",
    ),
    (
        Base::Mga96Zmanis,
        "temporal_minutes(96, before_visible_sunrise)",
        "temporal_minutes(96, after_visible_sunset)",
        "Magen Avraham, 96 proportional minutes (1/7.5 of the day)",
    ),
    (
        Base::Mga16_1,
        "solar_angle(16.1, before_visible_sunrise)",
        "solar_angle(16.1, after_visible_sunset)",
        "Magen Avraham, dawn and nightfall at 16.1 degrees",
    ),
    (
        Base::Mga18,
        "solar_angle(18, before_visible_sunrise)",
        "solar_angle(18, after_visible_sunset)",
        "Magen Avraham, dawn and nightfall at 18 degrees",
    ),
    (
        Base::Mga19_8,
        "solar_angle(19.8, before_visible_sunrise)",
        "solar_angle(19.8, after_visible_sunset)",
        "Magen Avraham, dawn and nightfall at 19.8 degrees",
    ),
    (
        Base::Mga26,
        "solar_angle(26, before_visible_sunrise)",
        "solar_angle(26, after_visible_sunset)",
        "Magen Avraham, dawn and nightfall at 26 degrees",
    ),
    (
        Base::BaalHatanya,
        "solar_angle(1.583, before_visible_sunrise)",
        "solar_angle(1.583, after_visible_sunset)",
        "Baal HaTanya: sun 1.583 degrees below the horizon (netz amiti to shkiah amitis)",
    ),
    (
        Base::AteretTorah,
        "visible_sunrise",
        "visible_sunset + 40min",
        "Ateret Torah: sunrise to 40 minutes after sunset",
    ),
];

/// Start and end of a day under one convention.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DayDefinition {
    pub start: Expr,
    pub end: Expr,
    pub description: String,
}

impl DayDefinition {
    pub fn new(start: Expr, end: Expr, description: impl Into<String>) -> Self {
        Self {
            start,
            end,
            description: description.into(),
        }
    }

    /// Compile both boundaries from formula text. Boundaries may not reference other formulas.
    pub fn compile(
        start: &str,
        end: &str,
        description: impl Into<String>,
    ) -> Result<Self, CompileError> {
        Ok(Self::new(
            crate::compile(start)?,
            crate::compile(end)?,
            description,
        ))
    }
}

/// Registry mapping bases to their day definitions.
#[derive(Clone, Debug, Default)]
pub struct BaseRegistry {
    days: HashMap<Base, DayDefinition>,
}

static DEFAULT: Lazy<BaseRegistry> = Lazy::new(BaseRegistry::default_registry);

/// Process-wide registry holding [BUILTIN_BASES].
pub fn default_bases() -> &'static BaseRegistry {
    &DEFAULT
}

impl BaseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in base.
    ///
    /// Panics if a built-in definition fails to compile; that is a bug in [BUILTIN_BASES].
    pub fn default_registry() -> Self {
        let mut r = Self::new();
        for &(base, start, end, description) in BUILTIN_BASES {
            let day = DayDefinition::compile(start, end, description)
                .unwrap_or_else(|e| panic!("built-in base `{base}` does not compile: {e}"));
            r.insert(base, day);
        }
        r
    }

    /// Register or replace a day definition.
    pub fn insert(&mut self, base: Base, day: DayDefinition) {
        if self.days.insert(base, day).is_some() {
            log::debug!("base `{base}` redefined");
        }
    }

    pub fn resolve(&self, base: Base) -> Result<&DayDefinition, UnknownBaseError> {
        self.days.get(&base).ok_or(UnknownBaseError(base))
    }

    pub fn describe(&self, base: Base) -> Option<&str> {
        self.days.get(&base).map(|d| d.description.as_str())
    }

    pub fn len(&self) -> usize {
        self.days.len()
    }

    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }
}
