//! spendcast - forecast spending from a transaction file
//!
//! Prints the JSON response body of the chosen operation to stdout. Logs go
//! to stderr so the output can be piped.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use spend_forecast::{ForecastService, ServiceConfig, ServiceResponse, TransactionLoader};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Spending forecasts and budget risk from categorized transactions
#[derive(Parser, Debug)]
#[command(name = "spendcast", author, version, about)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Transactions as CSV, a JSON array, or a JSON request body
    #[arg(short, long, global = true)]
    input: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Forecast spending and assess budget risk
    Predict {
        /// Days to forecast (defaults to the configured horizon)
        #[arg(short, long)]
        days: Option<usize>,
    },

    /// Train and store a new model
    Train {
        /// Training epochs (defaults to the configured value)
        #[arg(short, long)]
        epochs: Option<usize>,
    },

    /// Break expenses down by category
    Insights,

    /// Report whether a trained model is available
    Health,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let level = match args.log_level.as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .finish();
    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("failed to install logger: {}", err);
    }

    match run(args) {
        Ok(response) => {
            println!("{}", response.body);
            if response.is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> anyhow::Result<ServiceResponse> {
    let config = match &args.config {
        Some(path) => ServiceConfig::load(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => ServiceConfig::default(),
    };
    let service = ForecastService::new(config);

    let response = match args.command {
        Command::Health => service.health(),
        Command::Predict { days } => {
            let mut body = request_body(args.input.as_deref())?;
            if let Some(days) = days {
                body["days"] = json!(days);
            }
            service.predict(body)
        }
        Command::Train { epochs } => {
            let mut body = request_body(args.input.as_deref())?;
            if let Some(epochs) = epochs {
                body["epochs"] = json!(epochs);
            }
            service.train(body)
        }
        Command::Insights => service.category_insights(request_body(args.input.as_deref())?),
    };

    Ok(response)
}

/// Read `--input` into a request body of the form `{"transactions": [...]}`
fn request_body(input: Option<&Path>) -> anyhow::Result<Value> {
    let Some(path) = input else {
        bail!("--input is required for this command");
    };

    let is_csv = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"));
    if is_csv {
        let transactions = TransactionLoader::from_csv(path)
            .with_context(|| format!("reading transactions from {}", path.display()))?;
        return Ok(json!({ "transactions": transactions }));
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let value: Value = serde_json::from_str(&content)
        .with_context(|| format!("parsing JSON from {}", path.display()))?;

    match value {
        Value::Array(_) => Ok(json!({ "transactions": value })),
        Value::Object(_) => Ok(value),
        _ => bail!("{} must hold a JSON array or object", path.display()),
    }
}
