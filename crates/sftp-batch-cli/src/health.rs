//! Connectivity probes for the `health-check` command.

use std::time::Instant;

use serde::Serialize;
use sftp_batch::{Config, PgRecordRepository, RecordRepository, RemoteSession, Result};

/// Result of probing every configured endpoint.
#[derive(Debug, Serialize)]
pub struct HealthCheckResult {
    pub sftp_connected: bool,
    pub sftp_latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sftp_error: Option<String>,

    /// `None` when no database section is configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_connected: Option<bool>,
    pub database_latency_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub database_error: Option<String>,

    pub healthy: bool,
}

pub async fn check(config: &Config) -> HealthCheckResult {
    let start = Instant::now();
    let sftp = probe_sftp(config).await;
    let sftp_latency_ms = start.elapsed().as_millis() as u64;

    let (database, database_latency_ms) = match &config.database {
        Some(db) => {
            let start = Instant::now();
            let result = match PgRecordRepository::connect(db).await {
                Ok(repo) => repo.ping().await,
                Err(e) => Err(e),
            };
            (Some(result), start.elapsed().as_millis() as u64)
        }
        None => (None, 0),
    };

    let database_ok = database.as_ref().map_or(true, |r| r.is_ok());
    HealthCheckResult {
        healthy: sftp.is_ok() && database_ok,
        sftp_connected: sftp.is_ok(),
        sftp_latency_ms,
        sftp_error: sftp.err().map(|e| e.to_string()),
        database_connected: database.as_ref().map(|r| r.is_ok()),
        database_latency_ms,
        database_error: database.and_then(|r| r.err()).map(|e| e.to_string()),
    }
}

async fn probe_sftp(config: &Config) -> Result<()> {
    RemoteSession::from_config(&config.sftp)?.check().await
}

pub fn print(result: &HealthCheckResult) {
    println!("Health Check Results:");
    println!(
        "  SFTP: {} ({}ms)",
        if result.sftp_connected { "OK" } else { "FAILED" },
        result.sftp_latency_ms
    );
    if let Some(ref err) = result.sftp_error {
        println!("    Error: {}", err);
    }
    match result.database_connected {
        Some(connected) => {
            println!(
                "  Database (PostgreSQL): {} ({}ms)",
                if connected { "OK" } else { "FAILED" },
                result.database_latency_ms
            );
            if let Some(ref err) = result.database_error {
                println!("    Error: {}", err);
            }
        }
        None => println!("  Database (PostgreSQL): not configured"),
    }
    println!(
        "\n  Overall: {}",
        if result.healthy { "HEALTHY" } else { "UNHEALTHY" }
    );
}
