//! Built-in function signatures: parameter names, arity and a one-line description each.

use crate::error::Arity;
use crate::symbol::Function;

/// Parameter names for each built-in (order matters for positional binding).
pub fn param_names(f: Function) -> &'static [&'static str] {
    match f {
        Function::Fallback => &["candidate", "..."],
        Function::Midpoint | Function::EarlierOf | Function::LaterOf => &["a", "b"],
        Function::TemporalHours => &["hours", "base"],
        Function::TemporalMinutes => &["minutes", "direction"],
        Function::SolarAngle | Function::SeasonalSolarAngle => &["degrees", "direction"],
        Function::Custom => &["start", "end"],
    }
}

pub fn arity(f: Function) -> Arity {
    match f {
        Function::Fallback => Arity::AtLeast(2),
        _ => Arity::Exactly(2),
    }
}

pub fn description(f: Function) -> &'static str {
    match f {
        Function::Fallback => "first argument that is defined for the date and location",
        Function::Midpoint => "instant halfway between two instants",
        Function::EarlierOf => "earlier of two instants",
        Function::LaterOf => "later of two instants",
        Function::TemporalHours => {
            "start of the base's day plus n twelfths of its length (sha'os zmaniyos)"
        }
        Function::TemporalMinutes => {
            "minute offset scaled by day length / 12h, before sunrise or after sunset"
        }
        Function::SolarAngle => "moment the sun is the given degrees below (or above) the horizon",
        Function::SeasonalSolarAngle => {
            "equinox offset of a solar angle, scaled to today's day length"
        }
        Function::Custom => "day definition from two instants, for temporal_hours",
    }
}

/// `name(a, b)` for listings.
pub fn signature(f: Function) -> String {
    format!("{}({})", f.canonical_name(), param_names(f).join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_names_match_arity() {
        for f in Function::ALL {
            match arity(f) {
                Arity::Exactly(n) => assert_eq!(param_names(f).len(), n, "{f}"),
                Arity::AtLeast(_) => assert_eq!(param_names(f).last(), Some(&"...")),
            }
        }
    }

    #[test]
    fn signatures() {
        assert_eq!(signature(Function::TemporalHours), "temporal_hours(hours, base)");
        assert_eq!(signature(Function::Fallback), "fallback(candidate, ...)");
    }
}
