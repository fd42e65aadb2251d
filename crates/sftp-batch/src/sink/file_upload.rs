//! Staged upload of cleaned lines from a local file.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::core::{Chunk, ItemSink};
use crate::error::Result;
use crate::remote::RemoteSession;

/// Uploads the transformed lines of one input file.
///
/// Each chunk is staged as `<stem>_<sequence>.<ext>` in the temp directory,
/// uploaded under that name and the staging file removed. When the run
/// completes the input file itself is deleted.
pub struct FileUploadSink {
    session: Arc<RemoteSession>,
    input: PathBuf,
    temp_dir: PathBuf,
}

impl FileUploadSink {
    pub fn new(
        session: Arc<RemoteSession>,
        input: impl Into<PathBuf>,
        temp_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            session,
            input: input.into(),
            temp_dir: temp_dir.into(),
        }
    }

    pub fn input(&self) -> &Path {
        &self.input
    }

    /// Remote name for the chunk with the given sequence number.
    pub fn part_name(&self, sequence: usize) -> String {
        let stem = self
            .input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "input".to_string());
        match self.input.extension() {
            Some(ext) => format!("{}_{:04}.{}", stem, sequence, ext.to_string_lossy()),
            None => format!("{}_{:04}", stem, sequence),
        }
    }
}

#[async_trait]
impl ItemSink for FileUploadSink {
    type Item = String;

    async fn commit(&self, chunk: &Chunk<String>) -> Result<()> {
        let name = self.part_name(chunk.sequence());
        let staged = self.temp_dir.join(&name);

        let mut body = chunk.items().join("\n");
        body.push('\n');

        tokio::fs::create_dir_all(&self.temp_dir).await?;
        tokio::fs::write(&staged, body).await?;
        let uploaded = self.session.upload(&staged, &name).await;

        if let Err(e) = tokio::fs::remove_file(&staged).await {
            warn!("could not remove staging file {}: {}", staged.display(), e);
        }
        uploaded
    }

    async fn finish(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.input).await {
            Ok(()) => info!("deleted processed file {}", self.input.display()),
            Err(e) => warn!("could not delete processed file {}: {}", self.input.display(), e),
        }
        Ok(())
    }
}
