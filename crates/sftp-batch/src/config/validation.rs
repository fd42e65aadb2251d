//! Configuration validation.

use super::Config;
use crate::error::{BatchError, Result};
use crate::repository::{quote_table, SslMode};

const KNOWN_HOSTS_STRATEGIES: [&str; 3] = ["strict", "accept", "add"];

/// Validate the configuration.
pub fn validate(config: &Config) -> Result<()> {
    // Database validation
    if let Some(db) = &config.database {
        if db.host.is_empty() {
            return Err(BatchError::Config("database.host is required".into()));
        }
        if db.database.is_empty() {
            return Err(BatchError::Config("database.database is required".into()));
        }
        if db.user.is_empty() {
            return Err(BatchError::Config("database.user is required".into()));
        }
        if db.max_connections == 0 {
            return Err(BatchError::Config(
                "database.max_connections must be at least 1".into(),
            ));
        }
        SslMode::parse(&db.ssl_mode)?;
        quote_table(&db.table)?;
    }

    // SFTP validation
    if config.sftp.host.is_empty() {
        return Err(BatchError::Config("sftp.host is required".into()));
    }
    if config.sftp.user.is_empty() {
        return Err(BatchError::Config("sftp.user is required".into()));
    }
    if config.sftp.input_dir.is_empty() {
        return Err(BatchError::Config("sftp.input_dir is required".into()));
    }
    if config.sftp.output_dir.is_empty() {
        return Err(BatchError::Config("sftp.output_dir is required".into()));
    }
    let strategy = config.sftp.known_hosts.to_lowercase();
    if !KNOWN_HOSTS_STRATEGIES.contains(&strategy.as_str()) {
        return Err(BatchError::Config(format!(
            "sftp.known_hosts must be one of strict, accept, add; got '{}'",
            config.sftp.known_hosts
        )));
    }

    // Local directories
    if config.local.input_dir.as_os_str().is_empty() {
        return Err(BatchError::Config("local.input_dir is required".into()));
    }
    if config.local.output_dir.as_os_str().is_empty() {
        return Err(BatchError::Config("local.output_dir is required".into()));
    }

    // Batch settings
    if config.batch.chunk_size == 0 {
        return Err(BatchError::Config(
            "batch.chunk_size must be at least 1".into(),
        ));
    }
    if config.batch.page_size == 0 {
        return Err(BatchError::Config("batch.page_size must be at least 1".into()));
    }
    if config.batch.expected_fields == 0 {
        return Err(BatchError::Config(
            "batch.expected_fields must be at least 1".into(),
        ));
    }
    if config.batch.allowed_extensions.is_empty() {
        return Err(BatchError::Config(
            "batch.allowed_extensions must not be empty".into(),
        ));
    }

    Ok(())
}
