//! Pipeline wiring.
//!
//! A [`PipelineRunner`] assembles the source, transform and sink for one
//! [`PipelineKind`] from a shared [`PipelineContext`] and drives them with a
//! fresh [`ChunkEngine`] on every [`run`](PipelineRunner::run).
//!
//! | Pipeline | Source | Transform | Sink |
//! |----------|--------|-----------|------|
//! | `database-to-sftp` | [`RecordSource`] | [`RecordTransform`] | [`CsvUploadSink`] |
//! | `file-to-sftp` | [`LineSource`] | [`LineTransform`] | [`FileUploadSink`] |
//! | `sftp-to-file` | [`RemoteListingSource`] | [`FilenameTransform`] | [`DownloadSink`] |

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, warn, Instrument};

use crate::config::Config;
use crate::core::{ItemSink, ItemSource, ItemTransform};
use crate::engine::{ChunkEngine, EngineConfig, RunReport};
use crate::error::{BatchError, Result};
use crate::remote::RemoteSession;
use crate::repository::{PgRecordRepository, RecordRepository};
use crate::sink::{CsvUploadSink, DownloadSink, FileUploadSink};
use crate::source::{LineSource, RecordSource, RemoteListingSource};
use crate::transform::{FilenameTransform, LineTransform, RecordTransform};

/// Extension of the local files picked up by the file-to-SFTP pipeline.
const INPUT_EXTENSION: &str = "txt";

/// The three directional pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineKind {
    DatabaseToSftp,
    FileToSftp,
    SftpToFile,
}

impl PipelineKind {
    pub const ALL: [PipelineKind; 3] = [
        PipelineKind::DatabaseToSftp,
        PipelineKind::FileToSftp,
        PipelineKind::SftpToFile,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineKind::DatabaseToSftp => "database-to-sftp",
            PipelineKind::FileToSftp => "file-to-sftp",
            PipelineKind::SftpToFile => "sftp-to-file",
        }
    }

    /// Human-readable name used in trigger responses.
    pub fn title(&self) -> &'static str {
        match self {
            PipelineKind::DatabaseToSftp => "Database to SFTP",
            PipelineKind::FileToSftp => "File to SFTP",
            PipelineKind::SftpToFile => "SFTP to file",
        }
    }
}

impl fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PipelineKind {
    type Err = BatchError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().replace('_', "-").as_str() {
            "database-to-sftp" => Ok(PipelineKind::DatabaseToSftp),
            "file-to-sftp" => Ok(PipelineKind::FileToSftp),
            "sftp-to-file" => Ok(PipelineKind::SftpToFile),
            other => Err(BatchError::Config(format!(
                "Unknown pipeline '{}'. Valid values: database-to-sftp, file-to-sftp, sftp-to-file",
                other
            ))),
        }
    }
}

/// Run-scoped parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunParams {
    /// Unique run identifier.
    pub run_id: String,

    /// When the run was triggered. Also stamps CSV export names.
    pub started_at: DateTime<Local>,

    /// Free-form parameter passed through from the trigger.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub param: Option<String>,
}

impl Default for RunParams {
    fn default() -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            started_at: Local::now(),
            param: None,
        }
    }
}

impl RunParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_param(mut self, param: Option<String>) -> Self {
        self.param = param;
        self
    }
}

/// Resources shared by every pipeline.
#[derive(Clone)]
pub struct PipelineContext {
    pub config: Arc<Config>,
    pub remote: Arc<RemoteSession>,
    pub repository: Option<Arc<dyn RecordRepository>>,
}

impl PipelineContext {
    pub fn new(config: Arc<Config>, remote: Arc<RemoteSession>) -> Self {
        Self {
            config,
            remote,
            repository: None,
        }
    }

    pub fn with_repository(mut self, repository: Arc<dyn RecordRepository>) -> Self {
        self.repository = Some(repository);
        self
    }

    /// Open the SFTP session, plus the record repository when `kinds`
    /// includes the database pipeline and a `database` section is configured.
    pub async fn connect(config: Arc<Config>, kinds: &[PipelineKind]) -> Result<Self> {
        let remote = Arc::new(RemoteSession::from_config(&config.sftp)?);
        let mut context = Self::new(config.clone(), remote);

        if kinds.contains(&PipelineKind::DatabaseToSftp) {
            if let Some(db) = &config.database {
                let repository = PgRecordRepository::connect(db).await?;
                context = context.with_repository(Arc::new(repository));
            }
        }

        Ok(context)
    }
}

/// Builds and runs one pipeline.
pub struct PipelineRunner {
    kind: PipelineKind,
    context: PipelineContext,
    cancel: Option<CancellationToken>,
}

impl PipelineRunner {
    pub fn new(kind: PipelineKind, context: PipelineContext) -> Self {
        Self {
            kind,
            context,
            cancel: None,
        }
    }

    /// Abort runs once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn kind(&self) -> PipelineKind {
        self.kind
    }

    /// Execute one run to completion.
    pub async fn run(&self, params: RunParams) -> RunReport {
        let span = info_span!("pipeline", pipeline = %self.kind, run_id = %params.run_id);

        async {
            info!(
                "Starting {} run {} (param: {})",
                self.kind,
                params.run_id,
                params.param.as_deref().unwrap_or("-")
            );
            match self.kind {
                PipelineKind::DatabaseToSftp => self.run_database_to_sftp(&params).await,
                PipelineKind::FileToSftp => self.run_file_to_sftp().await,
                PipelineKind::SftpToFile => self.run_sftp_to_file().await,
            }
        }
        .instrument(span)
        .await
    }

    async fn run_database_to_sftp(&self, params: &RunParams) -> RunReport {
        let config = &self.context.config;
        let repository = match &self.context.repository {
            Some(repo) => repo.clone(),
            None => {
                return RunReport::aborted(BatchError::Config(
                    "database-to-sftp requires a database section".into(),
                ))
            }
        };

        let source = RecordSource::new(repository, config.batch.page_size);
        let sink = CsvUploadSink::new(
            self.context.remote.clone(),
            &config.local.temp_dir,
            params.started_at.naive_local(),
            &params.run_id,
        );
        self.execute(source, RecordTransform::new(), sink).await
    }

    async fn run_file_to_sftp(&self) -> RunReport {
        let config = &self.context.config;
        let input = match resolve_input_file(&config.local.input_dir).await {
            Ok(Some(path)) => path,
            Ok(None) => {
                info!(
                    "No .{} files in {}, nothing to do",
                    INPUT_EXTENSION,
                    config.local.input_dir.display()
                );
                return RunReport::empty();
            }
            Err(e) => return RunReport::aborted(e),
        };

        info!("Processing input file {}", input.display());
        let source = LineSource::new(&input);
        let transform = LineTransform::new(config.batch.expected_fields);
        let remote = self.context.remote.clone();
        let sink = FileUploadSink::new(remote, &input, &config.local.temp_dir);
        self.execute(source, transform, sink).await
    }

    async fn run_sftp_to_file(&self) -> RunReport {
        let config = &self.context.config;
        let source = RemoteListingSource::new(self.context.remote.clone());
        let transform = FilenameTransform::new(
            &config.batch.allowed_extensions,
            config.batch.max_file_name_length,
        );
        let sink = DownloadSink::new(self.context.remote.clone(), &config.local.output_dir);
        self.execute(source, transform, sink).await
    }

    async fn execute<S, T, K>(&self, source: S, transform: T, sink: K) -> RunReport
    where
        S: ItemSource<Item = T::Input>,
        T: ItemTransform,
        K: ItemSink<Item = T::Output>,
    {
        let engine_config = EngineConfig::from(&self.context.config.batch);
        let name = self.kind.as_str();
        let mut engine = ChunkEngine::new(name, source, transform, sink, engine_config);
        if let Some(token) = &self.cancel {
            engine = engine.with_cancellation(token.clone());
        }
        engine.run().await
    }
}

/// First `*.txt` file in `dir` by name. A missing directory counts as empty.
async fn resolve_input_file(dir: &Path) -> Result<Option<PathBuf>> {
    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("Input directory {} does not exist", dir.display());
            return Ok(None);
        }
        Err(e) => return Err(listing_error(dir, e)),
    };

    let mut candidates = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| listing_error(dir, e))?
    {
        let path = entry.path();
        let is_txt = path.extension().is_some_and(|ext| ext == INPUT_EXTENSION);
        if !is_txt {
            continue;
        }
        let file_type = entry
            .file_type()
            .await
            .map_err(|e| listing_error(&path, e))?;
        if file_type.is_file() {
            candidates.push(path);
        }
    }

    candidates.sort();
    Ok(candidates.into_iter().next())
}

fn listing_error(path: &Path, e: std::io::Error) -> BatchError {
    BatchError::source_error(
        PipelineKind::FileToSftp.as_str(),
        format!("listing {}: {}", path.display(), e),
    )
}
