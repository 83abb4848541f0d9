//! GEX Analyzer - command line entry point.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use gex_analyzer::config::Config;
use gex_analyzer::data::{load_bars, load_contracts, load_input};
use gex_analyzer::engine::{AnalysisEngine, AnalysisInput};
use gex_analyzer::pricing::{BlackScholes, ImpliedVolSolver, OptionType, PricingInputs};
use rust_decimal::Decimal;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

/// GEX Analyzer CLI
#[derive(Parser)]
#[command(name = "gex-analyzer")]
#[command(version, about = "Dealer gamma exposure, structural levels and trade signals")]
struct Cli {
    /// Configuration file name (extension optional)
    #[arg(long, global = true, default_value = "gex")]
    config: String,

    /// Write logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full analysis and print the report as JSON
    Analyze {
        /// JSON file holding spot, contracts and optional bars
        #[arg(short, long, conflicts_with_all = ["contracts", "bars", "spot"])]
        input: Option<PathBuf>,

        /// Option chain CSV
        #[arg(long, requires = "spot")]
        contracts: Option<PathBuf>,

        /// OHLC bars CSV
        #[arg(long)]
        bars: Option<PathBuf>,

        /// Spot price of the underlying
        #[arg(long)]
        spot: Option<Decimal>,

        /// Valuation date (YYYY-MM-DD)
        #[arg(long, requires = "expiration_date")]
        valuation_date: Option<NaiveDate>,

        /// Expiration date (YYYY-MM-DD)
        #[arg(long, requires = "valuation_date")]
        expiration_date: Option<NaiveDate>,

        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Price a European option and its Greeks
    Price {
        #[arg(long)]
        spot: f64,
        #[arg(long)]
        strike: f64,
        /// Risk-free rate (defaults to the configured rate)
        #[arg(long)]
        rate: Option<f64>,
        /// Annualised volatility
        #[arg(long)]
        vol: f64,
        /// Time to expiry in years
        #[arg(long)]
        expiry: f64,
        #[arg(long = "type", value_name = "CALL|PUT")]
        option_type: OptionType,
    },

    /// Solve for implied volatility from a market price
    Iv {
        /// Observed option price
        #[arg(long)]
        price: f64,
        #[arg(long)]
        spot: f64,
        #[arg(long)]
        strike: f64,
        #[arg(long)]
        rate: Option<f64>,
        #[arg(long)]
        expiry: f64,
        #[arg(long = "type", value_name = "CALL|PUT")]
        option_type: OptionType,
    },
}

#[derive(Serialize)]
struct ImpliedVolOutput {
    market_price: f64,
    implied_volatility: f64,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.log_json)?;

    let config = Config::load_from(&cli.config)?;
    config.validate().context("Invalid configuration")?;

    match cli.command {
        Commands::Analyze {
            input,
            contracts,
            bars,
            spot,
            valuation_date,
            expiration_date,
            output,
        } => {
            let input = match input {
                Some(path) => load_input(path)?,
                None => {
                    let spot = spot.context("--spot is required without --input")?;
                    let contracts = match contracts {
                        Some(path) => load_contracts(path)?,
                        None => Vec::new(),
                    };
                    let bars = match bars {
                        Some(path) => load_bars(path)?,
                        None => Vec::new(),
                    };
                    let mut input = AnalysisInput::new(spot, contracts).with_bars(bars);
                    if let (Some(valuation), Some(expiration)) = (valuation_date, expiration_date) {
                        input = input.with_dates(valuation, expiration);
                    }
                    input
                }
            };
            run_analyze(&config, &input, output.as_deref())
        }
        Commands::Price {
            spot,
            strike,
            rate,
            vol,
            expiry,
            option_type,
        } => {
            let inputs = PricingInputs {
                spot,
                strike,
                rate: rate.unwrap_or(config.pricing.risk_free_rate),
                volatility: vol,
                time_to_expiry: expiry,
                option_type,
            };
            let greeks = BlackScholes::greeks(&inputs)?;
            info!(%option_type, price = greeks.price, delta = greeks.delta, "Priced option");
            print_json(&greeks)
        }
        Commands::Iv {
            price,
            spot,
            strike,
            rate,
            expiry,
            option_type,
        } => {
            let inputs = PricingInputs {
                spot,
                strike,
                rate: rate.unwrap_or(config.pricing.risk_free_rate),
                // ignored by the solver
                volatility: config.pricing.iv_initial_guess,
                time_to_expiry: expiry,
                option_type,
            };
            let implied_volatility = ImpliedVolSolver::from_config(&config.pricing).solve(price, &inputs)?;
            info!(%option_type, implied_volatility, "Solved implied volatility");
            print_json(&ImpliedVolOutput {
                market_price: price,
                implied_volatility,
            })
        }
    }
}

fn run_analyze(config: &Config, input: &AnalysisInput, output: Option<&Path>) -> Result<()> {
    let engine = AnalysisEngine::new(config);
    let report = engine.run(input)?;

    match output {
        Some(path) => {
            let json = serde_json::to_string_pretty(&report)?;
            std::fs::write(path, json)
                .with_context(|| format!("Failed to write report: {}", path.display()))?;
            info!(path = %path.display(), "Report written");
            Ok(())
        }
        None => print_json(&report),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Logs go to stderr and a daily file under `logs/`; stdout carries JSON output.
fn init_logging(json: bool) -> Result<()> {
    use tracing_subscriber::fmt::writer::MakeWriterExt;

    std::fs::create_dir_all("logs")?;

    let file_appender = tracing_appender::rolling::daily("logs", "gex-analyzer.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    // Leak the guard to keep it alive for the program duration
    Box::leak(Box::new(guard));

    let filter = EnvFilter::from_default_env()
        .add_directive("gex_analyzer=debug".parse()?)
        .add_directive(Level::INFO.into());

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr.and(file_writer))
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE);

    if json {
        builder.json().init();
    } else {
        builder.with_ansi(false).init();
    }

    Ok(())
}
