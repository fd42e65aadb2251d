//! Shared handle to the remote SFTP server.
//!
//! All pipelines share one [`RemoteSession`] behind an `Arc`. Each transfer or
//! listing holds an internal async mutex for its duration so directory-scoped
//! operations from concurrently running pipelines never interleave on the
//! connection.

use std::path::Path;

use futures::TryStreamExt;
use opendal::{services, Operator};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::SftpConfig;
use crate::error::{BatchError, Result};

/// Remote storage session rooted at the configured input and output directories.
pub struct RemoteSession {
    operator: Operator,
    input_dir: String,
    output_dir: String,
    lock: Mutex<()>,
}

impl RemoteSession {
    /// Connect to the SFTP server described by `config`.
    pub fn from_config(config: &SftpConfig) -> Result<Self> {
        let mut builder = services::Sftp::default()
            .endpoint(&config.endpoint())
            .user(&config.user)
            .known_hosts_strategy(&config.known_hosts.to_lowercase())
            .root("/");

        if let Some(key) = &config.key {
            let key = key.to_str().ok_or_else(|| {
                BatchError::Config(format!("sftp.key is not valid UTF-8: {}", key.display()))
            })?;
            builder = builder.key(key);
        }

        let operator = Operator::new(builder)?.finish();

        info!(
            "SFTP session configured for {}@{} (input: {}, output: {})",
            config.user,
            config.endpoint(),
            config.input_dir,
            config.output_dir
        );

        Ok(Self::from_operator(
            operator,
            &config.input_dir,
            &config.output_dir,
        ))
    }

    /// Wrap an existing operator.
    pub fn from_operator(operator: Operator, input_dir: &str, output_dir: &str) -> Self {
        Self {
            operator,
            input_dir: input_dir.to_string(),
            output_dir: output_dir.to_string(),
            lock: Mutex::new(()),
        }
    }

    pub fn input_dir(&self) -> &str {
        &self.input_dir
    }

    pub fn output_dir(&self) -> &str {
        &self.output_dir
    }

    /// Names of the regular files directly inside `dir`, sorted.
    pub async fn list(&self, dir: &str) -> Result<Vec<String>> {
        let _guard = self.lock.lock().await;
        let path = dir_path(dir);

        let entries: Vec<_> = self.operator.lister(&path).await?.try_collect().await?;
        let mut names: Vec<String> = entries
            .into_iter()
            .filter(|e| e.metadata().is_file())
            .map(|e| e.name().to_string())
            .collect();
        names.sort();

        debug!("listed {} files in {}", names.len(), path);
        Ok(names)
    }

    /// List the remote input directory.
    pub async fn list_input(&self) -> Result<Vec<String>> {
        self.list(&self.input_dir).await
    }

    /// Upload a local file to the remote output directory, replacing any
    /// existing file of the same name.
    pub async fn upload(&self, local_path: &Path, remote_name: &str) -> Result<()> {
        let data = tokio::fs::read(local_path).await?;
        let size = data.len();
        let path = file_path(&self.output_dir, remote_name);

        let _guard = self.lock.lock().await;
        self.operator.write(&path, data).await?;

        info!("uploaded {} ({} bytes) to {}", local_path.display(), size, path);
        Ok(())
    }

    /// Download a file from the remote input directory to `local_path`,
    /// creating parent directories as needed.
    pub async fn download(&self, remote_name: &str, local_path: &Path) -> Result<()> {
        let path = file_path(&self.input_dir, remote_name);

        let data = {
            let _guard = self.lock.lock().await;
            self.operator.read(&path).await?.to_vec()
        };

        if let Some(parent) = local_path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(local_path, &data).await?;

        info!("downloaded {} ({} bytes) to {}", path, data.len(), local_path.display());
        Ok(())
    }

    /// Whether `name` exists in `dir`.
    pub async fn exists(&self, dir: &str, name: &str) -> Result<bool> {
        let _guard = self.lock.lock().await;
        Ok(self.operator.exists(&file_path(dir, name)).await?)
    }

    /// Health probe: list the input directory.
    pub async fn check(&self) -> Result<()> {
        self.list_input().await.map(|_| ())
    }
}

#[cfg(test)]
impl RemoteSession {
    /// In-memory session with `/inbound` and `/outbound` directories.
    pub(crate) fn in_memory() -> Self {
        let operator = Operator::new(services::Memory::default())
            .expect("memory operator")
            .finish();
        Self::from_operator(operator, "/inbound", "/outbound")
    }

    pub(crate) fn operator(&self) -> &Operator {
        &self.operator
    }
}

impl std::fmt::Debug for RemoteSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteSession")
            .field("input_dir", &self.input_dir)
            .field("output_dir", &self.output_dir)
            .finish()
    }
}

/// Directory path in operator form: relative, with a trailing slash.
fn dir_path(dir: &str) -> String {
    let trimmed = dir.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("{}/", trimmed)
    }
}

fn file_path(dir: &str, name: &str) -> String {
    let trimmed = dir.trim_matches('/');
    if trimmed.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", trimmed, name)
    }
}
