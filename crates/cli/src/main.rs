//! gametask CLI - run the scheduler scenario suite.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use gametask_core::RuntimeConfig;
use gametask_testkit::{scenarios, SuiteReport, TestEnv, TestRunner};
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gametask")]
#[command(about = "Gameplay task and pawn action scheduler scenarios", long_about = None)]
struct Cli {
    /// Log scheduler decisions
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List built-in scenarios
    List,
    /// Run scenarios
    Run {
        /// Only run scenarios whose name contains this
        filter: Option<String>,
        /// JSON config file
        #[arg(long)]
        config: Option<PathBuf>,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the effective config, or write it to a file
    Config {
        /// JSON config file to validate and print
        #[arg(long)]
        config: Option<PathBuf>,
        /// Output file
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::List => {
            let all = scenarios::all();
            println!("Scenarios ({})", all.len());
            for scenario in all {
                println!("  {:<48} {}", scenario.name, scenario.description);
            }
        }
        Commands::Run { filter, config, json } => {
            let config = load_config(config)?;
            debug!("Resources: {:?}", config.resources);

            let runner = TestRunner::new(TestEnv::new(config)?);
            let report = runner.run_all(&scenarios::all(), filter.as_deref());
            if report.results.is_empty() {
                anyhow::bail!("no scenario matches {:?}", filter.unwrap_or_default());
            }

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
            info!("{} passed, {} failed", report.passed(), report.failed());

            if !report.all_passed() {
                std::process::exit(1);
            }
        }
        Commands::Config { config, output } => {
            let config = load_config(config)?;
            match output {
                Some(path) => {
                    config.save(&path)?;
                    println!("Wrote config to {}", path.display());
                }
                None => println!("{}", serde_json::to_string_pretty(&config)?),
            }
        }
    }

    Ok(())
}

fn load_config(path: Option<PathBuf>) -> Result<RuntimeConfig> {
    match path {
        Some(path) => RuntimeConfig::load(&path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Ok(RuntimeConfig::default()),
    }
}

fn print_report(report: &SuiteReport) {
    for result in &report.results {
        let status = if result.passed { "PASS" } else { "FAIL" };
        println!(
            "  {} {:<48} {:>3} ticks {:>4} ms",
            status, result.name, result.ticks, result.duration_ms
        );
        if let Some(error) = &result.error {
            println!("       {}", error);
        }
    }
    println!(
        "{} passed, {} failed (started {})",
        report.passed(),
        report.failed(),
        report.started_at.format("%Y-%m-%d %H:%M:%S")
    );
}
