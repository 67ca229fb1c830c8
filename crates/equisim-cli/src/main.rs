mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use commands::simulation::SimulateArgs;
use commands::valuation::{
    PeersArgs, SensitivityArgs, ValuationArgs, WaccArgs, WaccProfileArgs,
};

/// DCF equity valuation and bootstrap share-price simulation
#[derive(Parser)]
#[command(
    name = "equisim",
    version,
    about = "DCF equity valuation and bootstrap share-price simulation",
    long_about = "Values a company from projected free cash flows with decimal precision \
                  (perpetuity and exit-multiple terminal values, sensitivity grids, peer \
                  multiples) and simulates share prices by resampling historical daily returns."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Log computation details to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single-point DCF valuation
    Valuation(ValuationArgs),
    /// Value the company over a discount-rate x terminal-growth grid
    Sensitivity(SensitivityArgs),
    /// Compare the DCF with values implied by peer multiples
    Peers(PeersArgs),
    /// Implied share price across discount rates
    WaccProfile(WaccProfileArgs),
    /// Calculate Weighted Average Cost of Capital (CAPM build-up)
    Wacc(WaccArgs),
    /// Bootstrap terminal share prices from historical daily returns
    Simulate(SimulateArgs),
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

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Valuation(args) => commands::valuation::run_valuation(args),
        Commands::Sensitivity(args) => commands::valuation::run_sensitivity(args),
        Commands::Peers(args) => commands::valuation::run_peers(args),
        Commands::WaccProfile(args) => commands::valuation::run_wacc_profile(args),
        Commands::Wacc(args) => commands::valuation::run_wacc(args),
        Commands::Simulate(args) => commands::simulation::run_simulate(args),
        Commands::Version => {
            println!("equisim {}", env!("CARGO_PKG_VERSION"));
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
