//! TOML configuration: default location, solver switches and named formulas.

use anyhow::{bail, Context, Result};
use chrono::FixedOffset;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use zmanim_lang::{Location, SolverConfig};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub location: LocationSettings,
    #[serde(default)]
    pub solver: SolverSettings,
    /// Formula name to formula text.
    #[serde(default)]
    pub formulas: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LocationSettings {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[serde(default)]
    pub elevation: f64,
    /// UTC offset such as `+02:00`, `-0500` or `Z`.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SolverSettings {
    #[serde(default = "default_elevation_dip")]
    pub elevation_dip: bool,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            elevation_dip: default_elevation_dip(),
        }
    }
}

fn default_timezone() -> String {
    "+00:00".to_string()
}

fn default_elevation_dip() -> bool {
    true
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("in config file {}", path.display()))
    }

    pub fn parse(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn solver_config(&self) -> SolverConfig {
        SolverConfig {
            elevation_dip: self.solver.elevation_dip,
        }
    }
}

/// Command line values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct LocationOverrides {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub elevation: Option<f64>,
    pub timezone: Option<String>,
}

impl LocationSettings {
    pub fn resolve(&self, overrides: &LocationOverrides) -> Result<Location> {
        let latitude = overrides.latitude.or(self.latitude);
        let longitude = overrides.longitude.or(self.longitude);
        let (Some(latitude), Some(longitude)) = (latitude, longitude) else {
            bail!("no location: pass --lat and --lon or set [location] in the config file");
        };
        let elevation = overrides.elevation.unwrap_or(self.elevation);
        let timezone = overrides.timezone.as_deref().unwrap_or(&self.timezone);
        let offset = parse_offset(timezone)?;
        Ok(Location::new(latitude, longitude, elevation, offset)?)
    }
}

pub fn parse_offset(text: &str) -> Result<FixedOffset> {
    let text = text.trim();
    if text.eq_ignore_ascii_case("z") || text.eq_ignore_ascii_case("utc") {
        return Ok(FixedOffset::east_opt(0).context("zero offset")?);
    }
    text.parse::<FixedOffset>()
        .with_context(|| format!("invalid UTC offset `{text}`, expected e.g. +02:00"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_file() {
        let config = Config::parse(
            r#"
            [location]
            latitude = 31.7683
            longitude = 35.2137
            elevation = 754.0
            timezone = "+02:00"

            [solver]
            elevation_dip = false

            [formulas]
            alos_72 = "sunrise - 72min"
            misheyakir = "@alos_72 + 10min"
            "#,
        )
        .unwrap();
        let loc = config
            .location
            .resolve(&LocationOverrides::default())
            .unwrap();
        assert_eq!(loc.latitude, 31.7683);
        assert_eq!(loc.tz_offset.local_minus_utc(), 7200);
        assert!(!config.solver_config().elevation_dip);
        assert_eq!(config.formulas.len(), 2);
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert!(config.solver_config().elevation_dip);
        assert!(config.formulas.is_empty());
        assert!(config
            .location
            .resolve(&LocationOverrides::default())
            .is_err());
    }

    #[test]
    fn flags_override_file() {
        let config = Config::parse("[location]\nlatitude = 10\nlongitude = 20\n").unwrap();
        let overrides = LocationOverrides {
            latitude: Some(40.0828),
            timezone: Some("-04:00".into()),
            ..Default::default()
        };
        let loc = config.location.resolve(&overrides).unwrap();
        assert_eq!(loc.latitude, 40.0828);
        assert_eq!(loc.longitude, 20.0);
        assert_eq!(loc.tz_offset.local_minus_utc(), -4 * 3600);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(Config::parse("[location]\nlatitud = 1\n").is_err());
        let config = Config::parse("[location]\nlatitude = 95\nlongitude = 0\n").unwrap();
        assert!(config
            .location
            .resolve(&LocationOverrides::default())
            .is_err());
        assert!(parse_offset("Jerusalem").is_err());
        assert_eq!(parse_offset("Z").unwrap().local_minus_utc(), 0);
    }
}
