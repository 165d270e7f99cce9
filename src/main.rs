//! Weft CLI - configuration wiring for training runs

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};

use weft::error::FixSuggestion;
use weft::value::is_identifier;
use weft::{validate, Component, ConfigSet, FactoryTable, Resolver, Severity, WeftError};

#[derive(Parser)]
#[command(name = "weft")]
#[command(about = "Weft - gin-style configuration wiring for training runs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve a configuration and construct the root object
    Run {
        /// Path to the root .gin document
        file: PathBuf,

        /// Override binding, highest priority (repeatable)
        #[arg(short, long = "bind", value_name = "BINDING")]
        bind: Vec<String>,

        /// Root constructor to build
        #[arg(long, default_value = "Trainer")]
        root: String,
    },

    /// Validate a configuration without constructing anything
    Validate {
        /// Path to the root .gin document
        file: PathBuf,

        /// Override binding, highest priority (repeatable)
        #[arg(short, long = "bind", value_name = "BINDING")]
        bind: Vec<String>,
    },

    /// Print the merged configuration
    Show {
        /// Path to the root .gin document
        file: PathBuf,

        /// Override binding, highest priority (repeatable)
        #[arg(short, long = "bind", value_name = "BINDING")]
        bind: Vec<String>,

        /// Emit a flat JSON map instead of document syntax
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run { file, bind, root } => run_config(&file, &bind, &root),
        Commands::Validate { file, bind } => validate_config(&file, &bind),
        Commands::Show { file, bind, json } => show_config(&file, &bind, json),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        if let Some(weft_err) = e.downcast_ref::<WeftError>() {
            if let Some(suggestion) = weft_err.fix_suggestion() {
                eprintln!("  {} {}", "Fix:".yellow(), suggestion);
            }
        }
        std::process::exit(1);
    }
}

fn load(file: &Path, bind: &[String]) -> Result<ConfigSet> {
    let config = ConfigSet::load_with_bindings(&[file.to_path_buf()], bind)?;
    Ok(config)
}

fn run_config(file: &Path, bind: &[String], root: &str) -> Result<()> {
    if !root.split('.').all(is_identifier) {
        bail!("invalid constructor name '{}'", root);
    }

    let config = load(file, bind)?;
    let resolver = Resolver::new(config);
    let component = resolver.construct(root, None)?;

    println!("{} Resolved root constructor: {}", "✓".green(), root.cyan().bold());
    match &component {
        Component::Trainer(trainer) => {
            for line in trainer.describe().lines() {
                println!("  {}", line);
            }
        }
        other => println!("  kind: {}", other.kind()),
    }
    println!(
        "  singletons constructed: {}",
        resolver.registry().len()
    );

    println!();
    println!("{}", "Operative config:".cyan().bold());
    print!("{}", resolver.operative_config());

    Ok(())
}

fn validate_config(file: &Path, bind: &[String]) -> Result<()> {
    let config = load(file, bind)?;
    let report = validate(&config, &FactoryTable::with_builtins());

    for finding in &report.findings {
        let label = match finding.severity {
            Severity::Error => "error:".red().bold(),
            Severity::Warning => "warning:".yellow().bold(),
        };
        match &finding.origin {
            Some(origin) => eprintln!("{} {} ({})", label, finding.message, origin),
            None => eprintln!("{} {}", label, finding.message),
        }
        if let Some(suggestion) = &finding.suggestion {
            eprintln!("  {} {}", "Fix:".yellow(), suggestion);
        }
    }

    if !report.is_valid() {
        bail!(
            "validation failed with {} error(s), {} warning(s)",
            report.error_count(),
            report.warning_count()
        );
    }

    println!("{} Configuration '{}' is valid", "✓".green(), file.display());
    println!("  Bindings: {}", config.bindings().len());
    println!(
        "  Macros: {}",
        config.bindings().iter().filter(|b| b.is_macro()).count()
    );
    if report.warning_count() > 0 {
        println!("  Warnings: {}", report.warning_count());
    }

    Ok(())
}

fn show_config(file: &Path, bind: &[String], json: bool) -> Result<()> {
    let config = load(file, bind)?;
    if json {
        let resolver = Resolver::new(config);
        println!("{}", serde_json::to_string_pretty(&resolver.flat_map())?);
    } else {
        print!("{}", config.render());
    }
    Ok(())
}
