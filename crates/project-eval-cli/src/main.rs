mod commands;
mod input;
mod output;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use commands::aggregate::AggregateArgs;
use commands::evaluate::EvaluateArgs;
use commands::kpis::KpisArgs;
use commands::optimize::OptimizeArgs;
use commands::schedule::ScheduleArgs;

/// Investment project evaluation with decimal precision
#[derive(Parser)]
#[command(
    name = "pev",
    version,
    about = "Investment project evaluation with decimal precision",
    long_about = "Evaluate an investment project from its cash-flow categories: \
                  debt schedules (French, German, bullet), FCFF/FCFE, WACC, NPV, IRR, \
                  payback and ratio indicators, plus a grid search over the capital structure."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Log verbosity on stderr (-v info, -vv debug); RUST_LOG takes precedence
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a project: statements, WACC and indicators
    Evaluate(EvaluateArgs),
    /// Build a loan amortization schedule
    Schedule(ScheduleArgs),
    /// Search debt ratio and amortization system for the best NPV or AEV
    Optimize(OptimizeArgs),
    /// Indicators for a bare cash-flow series
    Kpis(KpisArgs),
    /// Per-period totals by category
    Aggregate(AggregateArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn init_tracing(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Evaluate(args) => commands::evaluate::run_evaluate(args),
        Commands::Schedule(args) => commands::schedule::run_schedule(args),
        Commands::Optimize(args) => commands::optimize::run_optimize(args),
        Commands::Kpis(args) => commands::kpis::run_kpis_command(args),
        Commands::Aggregate(args) => commands::aggregate::run_aggregate(args),
        Commands::Version => {
            println!("pev {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            tracing::debug!(error = %e, "command failed");
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
