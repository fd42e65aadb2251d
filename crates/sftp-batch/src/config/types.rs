//! Configuration type definitions.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::pipeline::PipelineKind;

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Relational source for the database-to-SFTP pipeline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<DatabaseConfig>,

    /// Remote SFTP endpoint.
    pub sftp: SftpConfig,

    /// Local directories.
    pub local: LocalConfig,

    /// Chunking, retry and transform settings.
    #[serde(default)]
    pub batch: BatchConfig,

    /// Interval triggers per pipeline.
    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// HTTP trigger server.
    #[serde(default)]
    pub server: ServerConfig,
}

/// Source database (PostgreSQL) configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database host.
    pub host: String,

    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: u16,

    /// Database name.
    pub database: String,

    /// Username.
    pub user: String,

    /// Password.
    #[serde(default)]
    pub password: String,

    /// Table holding the exported records (default: "data_records").
    #[serde(default = "default_table")]
    pub table: String,

    /// SSL mode (default: "disable").
    #[serde(default = "default_disable")]
    pub ssl_mode: String,

    /// Maximum pooled connections (default: 4).
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("table", &self.table)
            .field("ssl_mode", &self.ssl_mode)
            .field("max_connections", &self.max_connections)
            .finish()
    }
}

/// Remote SFTP configuration.
///
/// Authentication is key based; the private key is handed to the system
/// OpenSSH client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SftpConfig {
    /// SFTP host.
    pub host: String,

    /// SFTP port (default: 22).
    #[serde(default = "default_sftp_port")]
    pub port: u16,

    /// Username.
    pub user: String,

    /// Path to the private key file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<PathBuf>,

    /// Known hosts strategy: strict, accept or add (default: "accept").
    #[serde(default = "default_known_hosts")]
    pub known_hosts: String,

    /// Remote directory files are downloaded from.
    pub input_dir: String,

    /// Remote directory files are uploaded to.
    pub output_dir: String,
}

impl SftpConfig {
    /// Endpoint URL understood by the SFTP backend.
    pub fn endpoint(&self) -> String {
        format!("ssh://{}:{}", self.host, self.port)
    }
}

/// Local filesystem layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalConfig {
    /// Directory scanned for `.txt` input files.
    pub input_dir: PathBuf,

    /// Directory downloaded files are written to.
    pub output_dir: PathBuf,

    /// Scratch directory for CSV exports and staged uploads.
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,
}

/// Chunking, retry and transform configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Items per committed chunk (default: 10).
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Additional commit attempts after a failed commit (default: 3).
    #[serde(default = "default_retry_limit")]
    pub retry_limit: u32,

    /// Base delay between commit attempts in milliseconds (default: 100).
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,

    /// Rows fetched per repository page (default: 100).
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Comma-separated fields expected per input line (default: 5).
    #[serde(default = "default_expected_fields")]
    pub expected_fields: usize,

    /// Longest accepted remote file name (default: 100).
    #[serde(default = "default_max_file_name_length")]
    pub max_file_name_length: usize,

    /// Remote file extensions accepted for download.
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: Vec<String>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            retry_limit: default_retry_limit(),
            retry_delay_ms: default_retry_delay_ms(),
            page_size: default_page_size(),
            expected_fields: default_expected_fields(),
            max_file_name_length: default_max_file_name_length(),
            allowed_extensions: default_allowed_extensions(),
        }
    }
}

impl BatchConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Interval triggers. A missing interval disables scheduling for that pipeline.
///
/// Schedules are fixed periods in seconds, not cron expressions: a pipeline
/// first runs one full period after `serve` starts and then every period
/// after that, regardless of wall-clock time. Use an external scheduler
/// calling `POST /api/jobs/{pipeline}` for calendar-based runs.
///
/// ```yaml
/// schedule:
///   database_to_sftp_secs: 3600
///   sftp_to_file_secs: 300
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_to_sftp_secs: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_to_sftp_secs: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sftp_to_file_secs: Option<u64>,
}

impl ScheduleConfig {
    /// Trigger interval for a pipeline, if scheduled.
    pub fn interval_for(&self, kind: PipelineKind) -> Option<Duration> {
        let secs = match kind {
            PipelineKind::DatabaseToSftp => self.database_to_sftp_secs,
            PipelineKind::FileToSftp => self.file_to_sftp_secs,
            PipelineKind::SftpToFile => self.sftp_to_file_secs,
        };
        secs.filter(|s| *s > 0).map(Duration::from_secs)
    }
}

/// HTTP trigger server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address (default: "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

// Default value functions for serde
fn default_pg_port() -> u16 {
    5432
}

fn default_table() -> String {
    "data_records".to_string()
}

fn default_disable() -> String {
    "disable".to_string()
}

fn default_max_connections() -> usize {
    4
}

fn default_sftp_port() -> u16 {
    22
}

fn default_known_hosts() -> String {
    "accept".to_string()
}

fn default_temp_dir() -> PathBuf {
    std::env::temp_dir()
}

fn default_chunk_size() -> usize {
    10
}

fn default_retry_limit() -> u32 {
    3
}

fn default_retry_delay_ms() -> u64 {
    100
}

fn default_page_size() -> usize {
    100
}

fn default_expected_fields() -> usize {
    5
}

fn default_max_file_name_length() -> usize {
    100
}

fn default_allowed_extensions() -> Vec<String> {
    vec!["csv".to_string(), "txt".to_string(), "dat".to_string()]
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}
