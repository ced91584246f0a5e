//! CLI entry point for SCATS seasonality analysis.
//!
//! Provides subcommands for running the seasonality aggregation over a SCATS
//! volume export and for extracting raw observations from it.

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use scats_seasonality::analyzers::analyzer::{run_extract, run_seasonality};
use scats_seasonality::{
    config::Settings,
    fetch::{BasicClient, open_store},
    output::{print_json, write_aggregates_csv, write_json, write_observations_csv},
    query::RequestParams,
};
use std::ffi::OsStr;
use std::path::Path;
use tracing::{error, info};
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "scats_seasonality")]
#[command(about = "Seasonality analysis over SCATS traffic volume exports", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Site and date range shared by every request.
#[derive(Args)]
struct RequestArgs {
    /// Export file, directory of exports, or URL to load observations from
    #[arg(short, long, value_name = "FILE_DIR_OR_URL")]
    source: String,

    /// SCATS site id
    #[arg(long)]
    scats_id: String,

    /// First day of the range (YYYY-MM-DD, inclusive)
    #[arg(long)]
    from: String,

    /// Last day of the range (YYYY-MM-DD, inclusive)
    #[arg(long)]
    to: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Gap-fill and aggregate a site's detectors into one row per day
    Seasonality {
        #[command(flatten)]
        request: RequestArgs,

        /// Detector ids separated by commas, or "all"
        #[arg(short, long, default_value = "all")]
        detectors: String,

        /// Optional: write the JSON table document to this path
        #[arg(short, long)]
        output: Option<String>,

        /// Optional: also write the daily rows as CSV
        #[arg(long)]
        csv: Option<String>,
    },
    /// Extract raw observations for a site and date range
    Extract {
        #[command(flatten)]
        request: RequestArgs,

        /// CSV file to write the observations to
        #[arg(short, long, default_value = "extract.csv")]
        output: String,
    },
}

impl RequestArgs {
    fn params(&self, detectors: Option<String>) -> RequestParams {
        RequestParams {
            scats_id: Some(self.scats_id.clone()),
            from: Some(self.from.clone()),
            to: Some(self.to.clone()),
            detectors,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/scats_seasonality.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("scats_seasonality.log"));

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
    let settings = Settings::from_env()?;
    let client = BasicClient::new()?;

    match cli.command {
        Commands::Seasonality {
            request,
            detectors,
            output,
            csv,
        } => {
            let store = open_store(&client, &request.source).await?;
            let params = request.params(Some(detectors));

            let table = match run_seasonality(&store, &params, &settings).await {
                Ok(table) => table,
                Err(e) => {
                    error!(error = %e, client_error = e.is_client_error(), "Seasonality request failed");
                    return Err(e.into());
                }
            };

            match output {
                Some(path) => {
                    write_json(&path, &table)?;
                    info!(path = %path, days = table.len(), "Seasonality table written");
                }
                None => print_json(&table)?,
            }

            if let Some(path) = csv {
                let rows: Vec<_> = table.aggregates().cloned().collect();
                write_aggregates_csv(&path, &rows)?;
                info!(path = %path, "Seasonality CSV written");
            }
        }
        Commands::Extract { request, output } => {
            let store = open_store(&client, &request.source).await?;
            let params = request.params(None);

            let rows = match run_extract(&store, &params, &settings).await {
                Ok(rows) => rows,
                Err(e) => {
                    error!(error = %e, client_error = e.is_client_error(), "Extract request failed");
                    return Err(e.into());
                }
            };

            write_observations_csv(&output, &rows)?;
            info!(path = %output, rows = rows.len(), "Extract written");
        }
    }

    Ok(())
}
