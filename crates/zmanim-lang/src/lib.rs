//! zmanim-lang: formula language for halachic times.
//!
//! Formula text is compiled once into a canonical tree ([compile]) and evaluated for any date
//! and location ([evaluate]). Evaluation never fails; a time that does not exist on that day
//! (polar night, missing reference) comes back as [TimeResult::Undefined] with the reason.

pub mod alias_table;
pub mod base_registry;
pub mod error;
pub mod eval;
pub mod formula_set;
pub mod functions;
pub mod ir;
pub mod lexer;
pub mod location;
pub mod parser;
pub mod resolve;
pub mod solar;
pub mod symbol;
pub mod value;

#[cfg(test)]
mod test_support;

pub use alias_table::{alias_table, AliasTable};
pub use base_registry::{default_bases, BaseRegistry, DayDefinition};
pub use error::{Arity, CompileError, LocationError, UnknownBaseError};
pub use eval::{
    evaluate_in, evaluate_with_breakdown, Breakdown, Environment, FormulaLookup, LookupFn,
    NoFormulas, Step,
};
pub use formula_set::{CycleError, FormulaSet, FormulaSetError};
pub use ir::{Expr, ExprDef};
pub use lexer::{tokenize, LexError};
pub use location::Location;
pub use parser::parse;
pub use resolve::Kind;
pub use solar::{NoaaSolar, SolarModel, SolverConfig};
pub use symbol::{Base, Direction, Function, Primitive, Symbol, Variable};
pub use value::{TimeResult, Undefined, Value};

use chrono::NaiveDate;

/// Compile formula text to its canonical tree. Aliases are resolved and kinds checked, so the
/// same formula written with different aliases compiles to equal trees.
pub fn compile(text: &str) -> Result<Expr, CompileError> {
    let def = parse(text)?;
    resolve::resolve(def)
}

/// Evaluate with the built-in bases and the NOAA solver. Use [evaluate_in] for anything else.
pub fn evaluate(
    tree: &Expr,
    date: NaiveDate,
    location: &Location,
    formulas: &dyn FormulaLookup,
) -> TimeResult {
    evaluate_in(tree, &Environment::new(date, location, formulas))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::Side;
    use crate::test_support::{at, fixed_day, FixedDay};
    use chrono::{DateTime, FixedOffset, NaiveTime};
    use proptest::prelude::*;
    use std::collections::HashMap;

    fn place(lat: f64, lon: f64, elevation: f64, offset_hours: i32) -> Location {
        Location::new(
            lat,
            lon,
            elevation,
            FixedOffset::east_opt(offset_hours * 3600).unwrap(),
        )
        .unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn time_of(text: &str, day: NaiveDate, loc: &Location) -> DateTime<FixedOffset> {
        match evaluate(&compile(text).unwrap(), day, loc, &NoFormulas) {
            TimeResult::Instant(t) => t,
            TimeResult::Undefined(u) => panic!("`{text}` undefined: {u}"),
        }
    }

    fn local_hm(t: DateTime<FixedOffset>) -> String {
        t.format("%H:%M").to_string()
    }

    fn fixed(text: &str, solver: &FixedDay) -> TimeResult {
        let (day, loc) = fixed_day();
        let env = Environment::new(day, &loc, &NoFormulas).with_solver(solver);
        evaluate_in(&compile(text).unwrap(), &env)
    }

    #[test]
    fn proportional_arithmetic_on_a_fixed_day() {
        let even = FixedDay::twelve_hours();
        assert_eq!(
            fixed("proportional_hours(3, gra)", &even).instant().map(local_hm),
            Some("09:00".into())
        );
        assert_eq!(
            fixed("midpoint(06:30, 18:00)", &even).instant().map(local_hm),
            Some("12:15".into())
        );
        let long = FixedDay::new(at(5, 0), at(19, 24));
        let rise = fixed("sunrise", &long).instant().unwrap();
        let alos = fixed("temporal_minutes(72, before_sunrise)", &long)
            .instant()
            .unwrap();
        assert_eq!((rise - alos).num_milliseconds(), 86_400 * 60);
    }

    #[test]
    fn compile_is_deterministic() {
        let text = "fallback(solar(16.1, before_sunrise), sunrise - 72min)";
        assert_eq!(compile(text).unwrap(), compile(text).unwrap());
    }

    #[test]
    fn aliases_compile_to_the_same_tree() {
        assert_eq!(
            compile("hanetz - 72min").unwrap(),
            compile("visible_sunrise - 72min").unwrap()
        );
        assert_eq!(
            compile("first_valid(solar(16.1, before_sunrise), netz - 72 min)").unwrap(),
            compile("fallback(solar_angle(16.1, before_visible_sunrise), visible_sunrise - 72min)")
                .unwrap()
        );
        assert_eq!(
            compile("shaos_zmaniyos(3, mga)").unwrap(),
            compile("temporal_hours(3, mga_72)").unwrap()
        );
    }

    fn surfaces(symbol: Symbol) -> Vec<&'static str> {
        alias_table().surface_names(symbol).to_vec()
    }

    proptest! {
        #[test]
        fn any_alias_spelling_compiles_identically(
            rise in prop::sample::select(surfaces(Symbol::Primitive(Primitive::VisibleSunrise))),
            set in prop::sample::select(surfaces(Symbol::Primitive(Primitive::VisibleSunset))),
            first in prop::sample::select(surfaces(Symbol::Function(Function::Fallback))),
            angle in prop::sample::select(surfaces(Symbol::Function(Function::SolarAngle))),
            dir in prop::sample::select(surfaces(Symbol::Direction(Direction::BeforeVisibleSunrise))),
            minutes in 1u32..180,
        ) {
            let canonical = format!(
                "fallback(solar_angle(16.1, before_visible_sunrise), midpoint(visible_sunrise, visible_sunset) - {minutes}min)"
            );
            let spelled = format!(
                "{first}({angle}(16.1, {dir}), midpoint({rise}, {set}) - {minutes} minutes)"
            );
            prop_assert_eq!(compile(&spelled).unwrap(), compile(&canonical).unwrap());
        }

        #[test]
        fn canonical_print_round_trips(minutes in 1u32..500, hours in 1u32..12, deg in 0u32..900) {
            let text = format!(
                "if (latitude >= 50 || season != \"summer\") {{ fallback(solar({}, after_sunset), sunset + {minutes}min) }} else {{ temporal_hours({hours}, mga_16_1) - -1min }}",
                deg as f64 / 10.0
            );
            let tree = compile(&text).unwrap();
            prop_assert_eq!(compile(&tree.to_string()).unwrap(), tree);
        }
    }

    #[test]
    fn canonical_print_of_assorted_formulas() {
        for text in [
            "sunrise - 72min",
            "16.1deg before sunrise",
            "1h 30min after @shkiah",
            "72min before sunrise + 10min",
            "(1h + 12min) before sunset - 2 * 5min",
            "sunrise + 3 * (10min after sunset - sunrise) / 12",
            "(sunset - sunrise) / 12 * 3 + sunrise",
            "temporal_hours(4, custom(sunrise - 1h, sunset + 1h))",
            "seasonal_solar(16.1, before_geometric_sunrise)",
            "proportional_minutes(90, after_sunset)",
            "if (date > 21-May && date < 10-Jul) { 06:30 } else if (!(month == 1)) { noon } else { midnight }",
            "earlier_of(later_of(civil_dawn, nautical_dawn), astronomical_dusk)",
            "sunrise + day_length / 12 * (-2 + 5)",
        ] {
            let tree = compile(text).unwrap();
            let printed = tree.to_string();
            assert_eq!(compile(&printed).unwrap(), tree, "{text} printed as {printed}");
        }
    }

    #[test]
    fn white_night_falls_back_to_fixed_minutes() {
        // 60 N at midsummer: the sun never gets 16.1 degrees below the horizon.
        let loc = place(60.0, 10.75, 0.0, 2);
        let day = date(2024, 6, 21);
        let tree = compile("fallback(solar(16.1, before_sunrise), sunrise - 72min)").unwrap();
        let result = evaluate(&tree, day, &loc, &NoFormulas);
        assert_eq!(result.instant(), Some(time_of("sunrise - 72min", day, &loc)));
        assert!(matches!(
            evaluate(&compile("solar(16.1, before_sunrise)").unwrap(), day, &loc, &NoFormulas),
            TimeResult::Undefined(Undefined::NoCrossing { .. })
        ));
    }

    #[test]
    fn midnight_sun_in_tromso() {
        let tromso = place(69.6492, 18.9553, 0.0, 2);
        let day = date(2024, 6, 21);
        let sunset = evaluate(&compile("sunset").unwrap(), day, &tromso, &NoFormulas);
        assert!(matches!(sunset, TimeResult::Undefined(Undefined::NoCrossing { .. })));
        assert!(!evaluate(&compile("temporal_hours(3, gra)").unwrap(), day, &tromso, &NoFormulas)
            .is_defined());
        // Noon comes from the transit, which still exists.
        let noon = time_of("fallback(sunset, noon)", day, &tromso);
        assert!(local_hm(noon).starts_with("12:") || local_hm(noon).starts_with("13:"));
    }

    #[test]
    fn evaluation_is_idempotent() {
        let loc = place(31.7683, 35.2137, 754.0, 2);
        let day = date(2024, 3, 21);
        let tree = compile("temporal_hours(3, mga_16_1)").unwrap();
        let first = evaluate(&tree, day, &loc, &NoFormulas);
        for _ in 0..3 {
            assert_eq!(evaluate(&tree, day, &loc, &NoFormulas), first);
        }
    }

    #[test]
    fn reference_adds_to_referenced_time() {
        let loc = place(40.0828, -74.2094, 0.0, -4);
        let day = date(2024, 6, 21);
        let mut formulas = HashMap::new();
        formulas.insert("alos_72".to_string(), compile("sunrise - 72min").unwrap());
        let alos = evaluate(&compile("@alos_72").unwrap(), day, &loc, &formulas)
            .instant()
            .unwrap();
        let later = evaluate(&compile("@alos_72 + 10min").unwrap(), day, &loc, &formulas)
            .instant()
            .unwrap();
        assert_eq!(later - alos, chrono::TimeDelta::minutes(10));
    }

    #[test]
    fn jerusalem_day_is_ordered() {
        let loc = place(31.7683, 35.2137, 754.0, 2);
        let day = date(2024, 3, 21);
        let times: Vec<_> = [
            "temporal_minutes(72, before_sunrise)",
            "solar(16.1, before_sunrise)",
            "sunrise",
            "temporal_hours(3, mga_72)",
            "temporal_hours(3, gra)",
            "noon",
            "temporal_hours(9.5, gra)",
            "sunset",
            "solar(8.5, after_sunset)",
            "midnight",
        ]
        .iter()
        .map(|text| time_of(text, day, &loc))
        .collect();
        for pair in times.windows(2) {
            assert!(pair[0] < pair[1], "{} !< {}", pair[0], pair[1]);
        }
        let noon = local_hm(time_of("chatzos", day, &loc));
        assert!(("11:43".."11:50").contains(&noon.as_str()), "{noon}");
    }

    #[test]
    fn elevation_lowers_the_visible_horizon() {
        let day = date(2024, 3, 21);
        let sea = place(31.7683, 35.2137, 0.0, 2);
        let hill = place(31.7683, 35.2137, 754.0, 2);
        let gain = time_of("sunrise", day, &sea) - time_of("sunrise", day, &hill);
        assert!((2..=7).contains(&gain.num_minutes()), "{gain}");
        let flat = NoaaSolar::new(SolverConfig {
            elevation_dip: false,
        });
        let env = Environment::new(day, &hill, &NoFormulas).with_solver(&flat);
        assert_eq!(
            evaluate_in(&compile("sunrise").unwrap(), &env).instant(),
            Some(time_of("sunrise", day, &sea))
        );
    }

    #[test]
    fn solar_angles_after_sunrise_and_before_sunset_are_below_the_horizon() {
        let loc = place(31.7683, 35.2137, 0.0, 2);
        let day = date(2024, 3, 21);
        let at = |text: &str| time_of(text, day, &loc);
        assert_eq!(at("solar(10, after_sunrise)"), at("solar(10, before_sunrise)"));
        assert_eq!(at("solar(10, before_sunset)"), at("solar(10, after_sunset)"));
        assert!(at("solar(10, after_sunrise)") < at("sunrise"));
        assert!(at("solar(10, before_sunset)") > at("sunset"));
    }

    #[test]
    fn solar_angle_in_every_direction_on_the_noaa_solver() {
        let loc = place(40.0828, -74.2094, 0.0, -4);
        let day = date(2024, 6, 21);
        let dawn = time_of("solar(11.5, before_geometric_sunrise)", day, &loc);
        let dusk = time_of("solar(11.5, after_geometric_sunset)", day, &loc);
        let rise = time_of("geometric_sunrise", day, &loc);
        let set = time_of("geometric_sunset", day, &loc);
        assert!(dawn < rise && set < dusk);
        // 11.5 degrees is roughly an hour of twilight in a New Jersey June.
        assert!((45..=75).contains(&(rise - dawn).num_minutes()), "{dawn}");
        for d in Direction::ALL {
            let t = time_of(&format!("solar_angle(11.5, {d})"), day, &loc);
            let expected = match d.side() {
                Side::Morning => dawn,
                Side::Evening => dusk,
            };
            assert_eq!(t, expected, "{d}");
        }
        assert_eq!(time_of("11.5deg before noon", day, &loc), dawn);
        assert_eq!(time_of("11.5deg after noon", day, &loc), dusk);
        assert_eq!(time_of("11.5deg after sunrise", day, &loc), dawn);
    }

    #[test]
    fn angle_bases_carry_the_elevation_dip() {
        let day = date(2024, 3, 21);
        let hill = place(31.7683, 35.2137, 754.0, 2);
        let sea = place(31.7683, 35.2137, 0.0, 2);
        let tree = compile("temporal_hours(3, mga_16_1)").unwrap();
        let start = |loc: &Location, solver: &NoaaSolar| {
            let env = Environment::new(day, loc, &NoFormulas).with_solver(solver);
            match evaluate_with_breakdown(&tree, &env).step("mga_16_1 start") {
                Some(Step {
                    value: Ok(Value::Instant(t)),
                    ..
                }) => *t,
                other => panic!("mga_16_1 start: {other:?}"),
            }
        };
        let noaa = NoaaSolar::default();
        let plain = |loc: &Location| {
            time_of("solar(16.1, before_sunrise)", day, loc).with_timezone(&chrono::Utc)
        };
        // The plain function ignores elevation; the base adds the dip of about 0.88 degrees.
        assert_eq!(plain(&hill), plain(&sea));
        assert_eq!(start(&sea, &noaa), plain(&sea));
        let earlier = plain(&hill) - start(&hill, &noaa);
        assert!((3..=6).contains(&earlier.num_minutes()), "{earlier}");
        let flat = NoaaSolar::new(SolverConfig {
            elevation_dip: false,
        });
        assert_eq!(start(&hill, &flat), plain(&hill));
    }

    #[test]
    fn lakewood_summer_bases() {
        let loc = place(40.0828, -74.2094, 0.0, -4);
        let day = date(2024, 6, 21);
        let gra = time_of("temporal_hours(3, gra)", day, &loc);
        let mga = time_of("temporal_hours(3, mga_72)", day, &loc);
        let zmanis = time_of("temporal_hours(3, mga_72_zmanis)", day, &loc);
        assert!(mga < gra);
        assert!(zmanis < mga, "proportional 72 minutes are longer in summer");
        let gra_hm = local_hm(gra);
        assert!(("09:10".."09:20").contains(&gra_hm.as_str()), "{gra_hm}");
    }

    #[test]
    fn manchester_winter_seasonal_angle() {
        let loc = place(53.517254, -2.253071, 0.0, 0);
        let day = date(2024, 12, 21);
        let seasonal = time_of("seasonal_solar(16.1, before_sunrise)", day, &loc);
        let fixed_angle = time_of("solar(16.1, before_sunrise)", day, &loc);
        let sunrise = time_of("sunrise", day, &loc);
        assert!(seasonal < sunrise);
        // A short day shrinks the equinox offset, so dawn comes later than the plain angle.
        assert!(seasonal > fixed_angle);
    }

    #[test]
    fn clock_literals_are_local_wall_time() {
        let loc = place(40.0828, -74.2094, 0.0, -4);
        let t = time_of("06:30 + 15min", date(2024, 6, 21), &loc);
        assert_eq!(t.time(), NaiveTime::from_hms_opt(6, 45, 0).unwrap());
    }

    #[test]
    fn compile_errors_surface() {
        assert!(matches!(compile("sunrise - 72sec"), Err(CompileError::Lex(_))));
        assert!(matches!(compile("sunrise +"), Err(CompileError::Parse { .. })));
        assert!(matches!(compile("72min"), Err(CompileError::NotATime { .. })));
    }
}
