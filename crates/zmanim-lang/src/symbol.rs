//! Canonical symbols: the closed set of primitives, functions, directions, bases and
//! condition variables the language knows about. Surface spellings live in the alias table;
//! everything after lexing speaks only in these enums.

use std::fmt;

/// Astronomical instants that need no arguments.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Primitive {
    VisibleSunrise,
    VisibleSunset,
    GeometricSunrise,
    GeometricSunset,
    SolarNoon,
    SolarMidnight,
    CivilDawn,
    CivilDusk,
    NauticalDawn,
    NauticalDusk,
    AstronomicalDawn,
    AstronomicalDusk,
}

/// Built-in functions. `Custom` is only valid as the base argument of `temporal_hours`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Function {
    Fallback,
    Midpoint,
    EarlierOf,
    LaterOf,
    TemporalHours,
    TemporalMinutes,
    SolarAngle,
    SeasonalSolarAngle,
    Custom,
}

/// Qualifier placing an offset before or after an anchor event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Direction {
    BeforeVisibleSunrise,
    AfterVisibleSunrise,
    BeforeVisibleSunset,
    AfterVisibleSunset,
    BeforeGeometricSunrise,
    AfterGeometricSunrise,
    BeforeGeometricSunset,
    AfterGeometricSunset,
    BeforeNoon,
    AfterNoon,
}

/// Named day definitions (calculation traditions). Never renamed, only extended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Base {
    Gra,
    Mga60,
    Mga72,
    Mga90,
    Mga96,
    Mga120,
    Mga72Zmanis,
    Mga90Zmanis,
    Mga96Zmanis,
    Mga16_1,
    Mga18,
    Mga19_8,
    Mga26,
    BaalHatanya,
    AteretTorah,
}

/// Values taken from the evaluation context, usable in conditions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Variable {
    Latitude,
    Longitude,
    Elevation,
    DayLength,
    Month,
    Day,
    DayOfYear,
    Date,
    Season,
}

/// Any canonical symbol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Symbol {
    Primitive(Primitive),
    Function(Function),
    Direction(Direction),
    Base(Base),
    Variable(Variable),
}

/// Which half of the day an event belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Side {
    Morning,
    Evening,
}

impl Primitive {
    pub const ALL: [Primitive; 12] = [
        Primitive::VisibleSunrise,
        Primitive::VisibleSunset,
        Primitive::GeometricSunrise,
        Primitive::GeometricSunset,
        Primitive::SolarNoon,
        Primitive::SolarMidnight,
        Primitive::CivilDawn,
        Primitive::CivilDusk,
        Primitive::NauticalDawn,
        Primitive::NauticalDusk,
        Primitive::AstronomicalDawn,
        Primitive::AstronomicalDusk,
    ];

    pub fn canonical_name(self) -> &'static str {
        match self {
            Primitive::VisibleSunrise => "visible_sunrise",
            Primitive::VisibleSunset => "visible_sunset",
            Primitive::GeometricSunrise => "geometric_sunrise",
            Primitive::GeometricSunset => "geometric_sunset",
            Primitive::SolarNoon => "solar_noon",
            Primitive::SolarMidnight => "solar_midnight",
            Primitive::CivilDawn => "civil_dawn",
            Primitive::CivilDusk => "civil_dusk",
            Primitive::NauticalDawn => "nautical_dawn",
            Primitive::NauticalDusk => "nautical_dusk",
            Primitive::AstronomicalDawn => "astronomical_dawn",
            Primitive::AstronomicalDusk => "astronomical_dusk",
        }
    }
}

impl Function {
    pub const ALL: [Function; 9] = [
        Function::Fallback,
        Function::Midpoint,
        Function::EarlierOf,
        Function::LaterOf,
        Function::TemporalHours,
        Function::TemporalMinutes,
        Function::SolarAngle,
        Function::SeasonalSolarAngle,
        Function::Custom,
    ];

    pub fn canonical_name(self) -> &'static str {
        match self {
            Function::Fallback => "fallback",
            Function::Midpoint => "midpoint",
            Function::EarlierOf => "earlier_of",
            Function::LaterOf => "later_of",
            Function::TemporalHours => "temporal_hours",
            Function::TemporalMinutes => "temporal_minutes",
            Function::SolarAngle => "solar_angle",
            Function::SeasonalSolarAngle => "seasonal_solar_angle",
            Function::Custom => "custom",
        }
    }
}

impl Direction {
    pub const ALL: [Direction; 10] = [
        Direction::BeforeVisibleSunrise,
        Direction::AfterVisibleSunrise,
        Direction::BeforeVisibleSunset,
        Direction::AfterVisibleSunset,
        Direction::BeforeGeometricSunrise,
        Direction::AfterGeometricSunrise,
        Direction::BeforeGeometricSunset,
        Direction::AfterGeometricSunset,
        Direction::BeforeNoon,
        Direction::AfterNoon,
    ];

    pub fn canonical_name(self) -> &'static str {
        match self {
            Direction::BeforeVisibleSunrise => "before_visible_sunrise",
            Direction::AfterVisibleSunrise => "after_visible_sunrise",
            Direction::BeforeVisibleSunset => "before_visible_sunset",
            Direction::AfterVisibleSunset => "after_visible_sunset",
            Direction::BeforeGeometricSunrise => "before_geometric_sunrise",
            Direction::AfterGeometricSunrise => "after_geometric_sunrise",
            Direction::BeforeGeometricSunset => "before_geometric_sunset",
            Direction::AfterGeometricSunset => "after_geometric_sunset",
            Direction::BeforeNoon => "before_noon",
            Direction::AfterNoon => "after_noon",
        }
    }

    /// Build the direction for `before|after <anchor>`; only sunrise, sunset and noon anchor one.
    pub fn from_parts(before: bool, anchor: Primitive) -> Option<Direction> {
        use Direction::*;
        let dir = match (before, anchor) {
            (true, Primitive::VisibleSunrise) => BeforeVisibleSunrise,
            (false, Primitive::VisibleSunrise) => AfterVisibleSunrise,
            (true, Primitive::VisibleSunset) => BeforeVisibleSunset,
            (false, Primitive::VisibleSunset) => AfterVisibleSunset,
            (true, Primitive::GeometricSunrise) => BeforeGeometricSunrise,
            (false, Primitive::GeometricSunrise) => AfterGeometricSunrise,
            (true, Primitive::GeometricSunset) => BeforeGeometricSunset,
            (false, Primitive::GeometricSunset) => AfterGeometricSunset,
            (true, Primitive::SolarNoon) => BeforeNoon,
            (false, Primitive::SolarNoon) => AfterNoon,
            _ => return None,
        };
        Some(dir)
    }

    pub fn is_before(self) -> bool {
        matches!(
            self,
            Direction::BeforeVisibleSunrise
                | Direction::BeforeVisibleSunset
                | Direction::BeforeGeometricSunrise
                | Direction::BeforeGeometricSunset
                | Direction::BeforeNoon
        )
    }

    /// The event the direction is measured from.
    pub fn anchor(self) -> Primitive {
        match self {
            Direction::BeforeVisibleSunrise | Direction::AfterVisibleSunrise => {
                Primitive::VisibleSunrise
            }
            Direction::BeforeVisibleSunset | Direction::AfterVisibleSunset => {
                Primitive::VisibleSunset
            }
            Direction::BeforeGeometricSunrise | Direction::AfterGeometricSunrise => {
                Primitive::GeometricSunrise
            }
            Direction::BeforeGeometricSunset | Direction::AfterGeometricSunset => {
                Primitive::GeometricSunset
            }
            Direction::BeforeNoon | Direction::AfterNoon => Primitive::SolarNoon,
        }
    }

    /// Half of the day in which a solar-angle crossing for this direction happens. The
    /// crossing is always a depression below the horizon: every sunrise direction and
    /// `before_noon` pick the dawn crossing, every sunset direction and `after_noon` the dusk one.
    pub fn side(self) -> Side {
        match self {
            Direction::BeforeVisibleSunrise
            | Direction::AfterVisibleSunrise
            | Direction::BeforeGeometricSunrise
            | Direction::AfterGeometricSunrise
            | Direction::BeforeNoon => Side::Morning,
            Direction::BeforeVisibleSunset
            | Direction::AfterVisibleSunset
            | Direction::BeforeGeometricSunset
            | Direction::AfterGeometricSunset
            | Direction::AfterNoon => Side::Evening,
        }
    }

    /// Directions that point away from the day into twilight: before sunrise, after sunset.
    pub fn is_twilight(self) -> bool {
        matches!(
            self,
            Direction::BeforeVisibleSunrise
                | Direction::AfterVisibleSunset
                | Direction::BeforeGeometricSunrise
                | Direction::AfterGeometricSunset
        )
    }
}

impl Base {
    pub const ALL: [Base; 15] = [
        Base::Gra,
        Base::Mga60,
        Base::Mga72,
        Base::Mga90,
        Base::Mga96,
        Base::Mga120,
        Base::Mga72Zmanis,
        Base::Mga90Zmanis,
        Base::Mga96Zmanis,
        Base::Mga16_1,
        Base::Mga18,
        Base::Mga19_8,
        Base::Mga26,
        Base::BaalHatanya,
        Base::AteretTorah,
    ];

    pub fn canonical_name(self) -> &'static str {
        match self {
            Base::Gra => "gra",
            Base::Mga60 => "mga_60",
            Base::Mga72 => "mga_72",
            Base::Mga90 => "mga_90",
            Base::Mga96 => "mga_96",
            Base::Mga120 => "mga_120",
            Base::Mga72Zmanis => "mga_72_zmanis",
            Base::Mga90Zmanis => "mga_90_zmanis",
            Base::Mga96Zmanis => "mga_96_zmanis",
            Base::Mga16_1 => "mga_16_1",
            Base::Mga18 => "mga_18",
            Base::Mga19_8 => "mga_19_8",
            Base::Mga26 => "mga_26",
            Base::BaalHatanya => "baal_hatanya",
            Base::AteretTorah => "ateret_torah",
        }
    }
}

impl Variable {
    pub const ALL: [Variable; 9] = [
        Variable::Latitude,
        Variable::Longitude,
        Variable::Elevation,
        Variable::DayLength,
        Variable::Month,
        Variable::Day,
        Variable::DayOfYear,
        Variable::Date,
        Variable::Season,
    ];

    pub fn canonical_name(self) -> &'static str {
        match self {
            Variable::Latitude => "latitude",
            Variable::Longitude => "longitude",
            Variable::Elevation => "elevation",
            Variable::DayLength => "day_length",
            Variable::Month => "month",
            Variable::Day => "day",
            Variable::DayOfYear => "day_of_year",
            Variable::Date => "date",
            Variable::Season => "season",
        }
    }
}

impl Symbol {
    /// Every canonical symbol, in declaration order.
    pub fn all() -> impl Iterator<Item = Symbol> {
        Primitive::ALL
            .into_iter()
            .map(Symbol::Primitive)
            .chain(Function::ALL.into_iter().map(Symbol::Function))
            .chain(Direction::ALL.into_iter().map(Symbol::Direction))
            .chain(Base::ALL.into_iter().map(Symbol::Base))
            .chain(Variable::ALL.into_iter().map(Symbol::Variable))
    }

    pub fn canonical_name(self) -> &'static str {
        match self {
            Symbol::Primitive(p) => p.canonical_name(),
            Symbol::Function(f) => f.canonical_name(),
            Symbol::Direction(d) => d.canonical_name(),
            Symbol::Base(b) => b.canonical_name(),
            Symbol::Variable(v) => v.canonical_name(),
        }
    }

    pub fn category(self) -> &'static str {
        match self {
            Symbol::Primitive(_) => "primitive",
            Symbol::Function(_) => "function",
            Symbol::Direction(_) => "direction",
            Symbol::Base(_) => "base",
            Symbol::Variable(_) => "variable",
        }
    }
}

macro_rules! display_canonical {
    ($($t:ty),*) => {
        $(impl fmt::Display for $t {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.canonical_name())
            }
        })*
    };
}

display_canonical!(Primitive, Function, Direction, Base, Variable, Symbol);
