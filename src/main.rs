//! CLI entry point for the commute tracker.
//!
//! Meant to be triggered by an external scheduler. The default `run` command
//! samples the current window's routes and updates the stats file; `report`
//! and `export` read that file back.

use anyhow::{Context, Result, bail};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use commute_tracker::{
    config::Config,
    directions::{DirectionsApi, GoogleDirections, MissingCredential, API_KEY_ENV},
    fetch::{BasicClient, auth::UrlParam},
    output::{append_snapshot, log_report, print_json},
    sampler::run_once,
    store::{DATE_FORMAT, StatsStore},
};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "commute_tracker")]
#[command(about = "Collects traffic-aware commute times into running statistics", long_about = None)]
struct Cli {
    /// JSON file overriding the built-in locations, windows and limits
    #[arg(long, global = true, env = "COMMUTE_TRACKER_CONFIG")]
    config: Option<PathBuf>,

    /// Stats file to read and update
    #[arg(long, global = true, env = "COMMUTE_TRACKER_DATA_FILE")]
    data_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sample the routes of the current window (the default)
    Run {
        /// Use this instant instead of the wall clock (RFC 3339)
        #[arg(long, value_name = "TIMESTAMP")]
        at: Option<DateTime<Utc>>,
    },
    /// Show the collected statistics
    Report {
        /// Also show the bucket for this local date (YYYY-MM-DD)
        #[arg(short, long)]
        date: Option<NaiveDate>,

        /// Print the whole stats file as JSON instead
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Append the current all-time statistics to a CSV file
    Export {
        /// CSV file to append rows to
        #[arg(short, long, default_value = "stats.csv")]
        output: PathBuf,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/commute_tracker.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("commute_tracker.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref(), cli.data_file)?;

    match cli.command.unwrap_or(Commands::Run { at: None }) {
        Commands::Run { at } => {
            let now = at.unwrap_or_else(Utc::now);
            let api = directions_client(&config)?;

            let summary = run_once(&config, api.as_ref(), now).await?;
            debug!(summary = %serde_json::to_string(&summary)?, "Run summary");

            if summary.all_failed() {
                error!(attempted = summary.attempted, "Every travel-time query failed");
                bail!("all {} travel-time queries failed", summary.attempted);
            }
        }
        Commands::Report { date, json } => {
            let store = StatsStore::load(&config.data_file, config.all_routes());
            if json {
                print_json(&store)?;
            } else {
                let label = date.map(|d| d.format(DATE_FORMAT).to_string());
                let bucket = date.and_then(|d| store.day(d));
                if let (Some(label), None) = (&label, bucket) {
                    warn!(date = %label, "No samples recorded for this date");
                }
                log_report(&store, label.as_deref().zip(bucket));
            }
        }
        Commands::Export { output } => {
            let store = StatsStore::load(&config.data_file, config.all_routes());
            let rows = append_snapshot(&output, &store, Utc::now())
                .with_context(|| format!("Failed to export to {}", output.display()))?;
            info!(rows, path = %output.display(), "Statistics exported");
        }
    }

    Ok(())
}

/// Builds the configuration from defaults, an optional file, and the environment.
fn load_config(path: Option<&Path>, data_file: Option<PathBuf>) -> Result<Config> {
    let mut config = match path {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    }
    .with_env_credentials();

    if let Some(data_file) = data_file {
        config.data_file = data_file;
    }
    config.validate()?;

    debug!(
        data_file = %config.data_file.display(),
        homes = config.homes.len(),
        batch_size = config.batch_size,
        retention_days = config.retention_days,
        "Configuration loaded"
    );
    Ok(config)
}

/// Directions client with the API key applied, or a stand-in that fails every query.
fn directions_client(config: &Config) -> Result<Box<dyn DirectionsApi>> {
    let Some(key) = config.api_key.clone() else {
        warn!("{API_KEY_ENV} is not set, every travel-time query will fail");
        return Ok(Box::new(MissingCredential));
    };

    let transport = BasicClient::with_timeout(config.request_timeout())?;
    let client = UrlParam::new(transport, "key", key);
    Ok(Box::new(GoogleDirections::new(client, &config.directions_url)?))
}
