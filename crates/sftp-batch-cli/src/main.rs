//! sftp-batch CLI - chunked transfers between PostgreSQL, local files and SFTP.

mod health;
mod server;
mod trigger;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use sftp_batch::{BatchError, Config, PipelineContext, PipelineKind, PipelineRunner, RunParams};
use tokio_util::sync::CancellationToken;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

use crate::trigger::Triggers;

#[derive(Parser)]
#[command(name = "sftp-batch")]
#[command(about = "Chunked batch transfers between PostgreSQL, local files and SFTP")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    /// Timeout in seconds for graceful shutdown (default: 60)
    #[arg(long, default_value = "60")]
    shutdown_timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one pipeline once: database-to-sftp, file-to-sftp or sftp-to-file
    Run {
        /// Pipeline to run
        pipeline: String,

        /// Free-form parameter recorded with the run
        #[arg(long)]
        param: Option<String>,
    },

    /// Serve HTTP triggers and run scheduled pipelines until shut down
    Serve,

    /// Test SFTP and database connections
    HealthCheck,

    /// Load and validate the configuration file
    ValidateConfig,
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), BatchError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format).map_err(BatchError::Config)?;

    let config = Arc::new(Config::load(&cli.config)?);
    info!("Loaded configuration from {:?}", cli.config);

    match cli.command {
        Commands::ValidateConfig => {
            println!("Configuration {} is valid", cli.config.display());
            let scheduled: Vec<_> = PipelineKind::ALL
                .into_iter()
                .filter_map(|kind| {
                    let period = config.schedule.interval_for(kind)?;
                    Some(format!("{} every {}s", kind, period.as_secs()))
                })
                .collect();
            if !scheduled.is_empty() {
                println!("  Scheduled: {}", scheduled.join(", "));
            }
            if config.database.is_none() {
                println!("  No database section: database-to-sftp is unavailable");
            }
        }

        Commands::Run { pipeline, param } => {
            let kind: PipelineKind = pipeline.parse()?;
            let cancel_token = setup_signal_handler(cli.shutdown_timeout).await?;
            let context = PipelineContext::connect(config, &[kind]).await?;

            let report = PipelineRunner::new(kind, context)
                .with_cancellation(cancel_token)
                .run(RunParams::new().with_param(param))
                .await;
            let summary = report.into_result()?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!("\n{} completed!", kind.title());
                println!("  Duration: {:.2}s", summary.duration_seconds);
                println!("  Items read: {}", summary.items_read);
                println!("  Accepted: {}", summary.accepted);
                println!("  Skipped: {}", summary.skipped);
                println!("  Chunks committed: {}", summary.chunks_committed);
                if summary.retries > 0 {
                    println!("  Commit retries: {}", summary.retries);
                }
            }
        }

        Commands::Serve => {
            let cancel_token = setup_signal_handler(cli.shutdown_timeout).await?;
            let context = PipelineContext::connect(config, &PipelineKind::ALL).await?;
            let triggers = Arc::new(Triggers::new(context, cancel_token));
            server::serve(triggers, Duration::from_secs(cli.shutdown_timeout)).await?;
        }

        Commands::HealthCheck => {
            let result = health::check(&config).await;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                health::print(&result);
            }

            if !result.healthy {
                return Err(BatchError::Config("Health check failed".to_string()));
            }
        }
    }

    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) -> Result<(), String> {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    let result = if format == "json" {
        subscriber.json().try_init()
    } else {
        subscriber.try_init()
    };
    result.map_err(|e| format!("failed to initialise logging: {}", e))
}

/// Cancel the returned token on SIGINT (Ctrl-C) or SIGTERM.
#[cfg(unix)]
async fn setup_signal_handler(shutdown_timeout: u64) -> Result<CancellationToken, BatchError> {
    let cancel_token = CancellationToken::new();

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let token = cancel_token.clone();

    tokio::spawn(async move {
        let name = tokio::select! {
            _ = sigint.recv() => "SIGINT",
            _ = sigterm.recv() => "SIGTERM",
        };
        eprintln!(
            "\nReceived {}. Shutting down gracefully (timeout: {}s)...",
            name, shutdown_timeout
        );
        token.cancel();
    });

    Ok(cancel_token)
}

/// Setup signal handler for Windows (only Ctrl-C)
#[cfg(not(unix))]
async fn setup_signal_handler(_shutdown_timeout: u64) -> Result<CancellationToken, BatchError> {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\nReceived Ctrl-C. Shutting down gracefully...");
            token.cancel();
        }
    });

    Ok(cancel_token)
}
