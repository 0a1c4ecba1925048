mod config;

use anyhow::{Context, Result};
use chrono::{FixedOffset, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use config::{Config, LocationOverrides};
use std::path::PathBuf;
use zmanim_lang::{
    alias_table, compile, default_bases, evaluate_in, evaluate_with_breakdown, functions, Base,
    Breakdown, Environment, FormulaSet, Function, NoaaSolar,
};

#[derive(Parser)]
#[command(name = "zmanim", about = "Evaluate zmanim formulas for a date and location")]
struct Cli {
    /// TOML file with [location], [solver] and [formulas]
    #[arg(long, short)]
    config: Option<PathBuf>,
    /// Latitude in degrees north
    #[arg(long, allow_hyphen_values = true)]
    lat: Option<f64>,
    /// Longitude in degrees east
    #[arg(long, allow_hyphen_values = true)]
    lon: Option<f64>,
    /// Elevation in metres
    #[arg(long, allow_hyphen_values = true)]
    elevation: Option<f64>,
    /// UTC offset, e.g. +02:00
    #[arg(long, allow_hyphen_values = true)]
    tz: Option<String>,
    /// Local date (YYYY-MM-DD); defaults to today at the location
    #[arg(long)]
    date: Option<NaiveDate>,
    /// Ignore elevation when computing visible sunrise and sunset
    #[arg(long)]
    no_dip: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate one formula; configured formulas can be referenced with @name
    Eval {
        /// Also list every intermediate value (solar events, calls, references, base bounds)
        #[arg(long)]
        explain: bool,
        #[arg(required = true, num_args = 1.., allow_hyphen_values = true)]
        formula: Vec<String>,
    },
    /// Evaluate every configured formula in dependency order
    Table,
    /// Compile a formula and print its canonical form
    Check {
        #[arg(required = true, num_args = 1.., allow_hyphen_values = true)]
        formula: Vec<String>,
    },
    /// List every surface name and the function signatures
    Aliases,
    /// List the built-in bases
    Bases,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    match &cli.command {
        Commands::Check { formula } => check(&formula.join(" ")),
        Commands::Aliases => {
            aliases();
            Ok(())
        }
        Commands::Bases => {
            bases();
            Ok(())
        }
        Commands::Eval { formula, explain } => {
            let set = formula_set(&config)?;
            let tree = compile(formula.join(" ").trim())?;
            with_environment(&cli, &config, &set, |env| {
                if *explain {
                    let breakdown = evaluate_with_breakdown(&tree, env);
                    for line in breakdown_lines(&breakdown, &env.location.tz_offset) {
                        println!("{line}");
                    }
                    println!("{}", breakdown.result);
                } else {
                    println!("{}", evaluate_in(&tree, env));
                }
                Ok(())
            })
        }
        Commands::Table => {
            let set = formula_set(&config)?;
            if set.is_empty() {
                log::warn!("no formulas configured; add a [formulas] table to the config file");
            }
            with_environment(&cli, &config, &set, |env| {
                let width = set.names().map(str::len).max().unwrap_or(0);
                for (name, result) in set.evaluate_all_in(*env)? {
                    println!("{name:width$}  {result}");
                }
                Ok(())
            })
        }
    }
}

fn formula_set(config: &Config) -> Result<FormulaSet> {
    let mut set = FormulaSet::new();
    for (name, text) in &config.formulas {
        set.insert(name, text)?;
    }
    Ok(set)
}

fn with_environment<T>(
    cli: &Cli,
    config: &Config,
    set: &FormulaSet,
    f: impl FnOnce(&Environment<'_>) -> Result<T>,
) -> Result<T> {
    let overrides = LocationOverrides {
        latitude: cli.lat,
        longitude: cli.lon,
        elevation: cli.elevation,
        timezone: cli.tz.clone(),
    };
    let location = config
        .location
        .resolve(&overrides)
        .context("resolving location")?;
    let date = cli
        .date
        .unwrap_or_else(|| Utc::now().with_timezone(&location.tz_offset).date_naive());
    let mut solver_config = config.solver_config();
    if cli.no_dip {
        solver_config.elevation_dip = false;
    }
    let solver = NoaaSolar::new(solver_config);
    log::info!(
        "{date} at {}, {} ({} m, {})",
        location.latitude,
        location.longitude,
        location.elevation_m,
        location.tz_offset
    );
    let env = Environment::new(date, &location, set).with_solver(&solver);
    f(&env)
}

fn breakdown_lines(breakdown: &Breakdown, offset: &FixedOffset) -> Vec<String> {
    let width = breakdown.steps.iter().map(|s| s.label.len()).max().unwrap_or(0);
    breakdown
        .steps
        .iter()
        .map(|step| {
            let value = match &step.value {
                Ok(v) => v.display_in(offset),
                Err(reason) => format!("undefined ({reason})"),
            };
            format!("  {:width$}  {value}", step.label)
        })
        .collect()
}

fn check(text: &str) -> Result<()> {
    let tree = compile(text.trim()).with_context(|| format!("compiling `{}`", text.trim()))?;
    println!("{tree}");
    let refs = tree.references();
    if !refs.is_empty() {
        let names: Vec<_> = refs.into_iter().collect();
        println!("references: {}", names.join(", "));
    }
    Ok(())
}

fn aliases() {
    for (name, symbol) in alias_table().entries() {
        let canonical = symbol.canonical_name();
        if name == canonical {
            println!("{name:24} {}", symbol.category());
        } else {
            println!("{name:24} -> {canonical}");
        }
    }
    println!();
    for f in Function::ALL {
        println!("{:40} {}", functions::signature(f), functions::description(f));
    }
}

fn bases() {
    let registry = default_bases();
    for base in Base::ALL {
        let Ok(day) = registry.resolve(base) else {
            continue;
        };
        println!("{base}");
        println!("    {}", day.description);
        println!("    start: {}", day.start);
        println!("    end:   {}", day.end);
    }
}
