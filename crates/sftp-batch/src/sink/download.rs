//! Download of renamed remote files.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::core::{Chunk, ItemSink};
use crate::error::Result;
use crate::remote::RemoteSession;
use crate::transform::RenamedFile;

/// Downloads each file's `remote_name` to `<output_dir>/<local_name>`.
pub struct DownloadSink {
    session: Arc<RemoteSession>,
    output_dir: PathBuf,
}

impl DownloadSink {
    pub fn new(session: Arc<RemoteSession>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            session,
            output_dir: output_dir.into(),
        }
    }
}

#[async_trait]
impl ItemSink for DownloadSink {
    type Item = RenamedFile;

    async fn commit(&self, chunk: &Chunk<RenamedFile>) -> Result<()> {
        for file in chunk {
            let target = self.output_dir.join(&file.local_name);
            self.session.download(&file.remote_name, &target).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_downloads_remote_name_to_local_name() {
        let session = Arc::new(RemoteSession::in_memory());
        session.operator().write("inbound/report.csv", "1,2,3").await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("downloads");
        let sink = DownloadSink::new(session, &out);

        let chunk = Chunk::from_items(
            0,
            vec![RenamedFile {
                remote_name: "report.csv".into(),
                local_name: "report_0A1B2C3D.csv".into(),
            }],
        );
        sink.commit(&chunk).await.unwrap();

        let body = tokio::fs::read_to_string(out.join("report_0A1B2C3D.csv")).await.unwrap();
        assert_eq!(body, "1,2,3");
    }

    #[tokio::test]
    async fn test_missing_remote_file_fails_commit() {
        let session = Arc::new(RemoteSession::in_memory());
        let dir = tempfile::tempdir().unwrap();
        let sink = DownloadSink::new(session, dir.path());
        let chunk = Chunk::from_items(
            0,
            vec![RenamedFile {
                remote_name: "nope.csv".into(),
                local_name: "nope_00000000.csv".into(),
            }],
        );
        assert!(sink.commit(&chunk).await.is_err());
    }
}
