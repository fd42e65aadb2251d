//! CSV export and upload of database records.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use tracing::debug;

use crate::core::{Chunk, DataRecord, ItemSink};
use crate::error::{BatchError, Result};
use crate::remote::RemoteSession;

const HEADER: [&str; 5] = ["ID", "Field1", "Field2", "Field3", "Created At"];

/// Length of the run id prefix carried in export names.
const RUN_TAG_LEN: usize = 8;

/// Writes each chunk to `data_export_<run timestamp>_<run tag>_<sequence>.csv`
/// in the temp directory and uploads it under the same name.
///
/// The run tag keeps exports from runs started within the same second apart.
pub struct CsvUploadSink {
    session: Arc<RemoteSession>,
    temp_dir: PathBuf,
    stamp: String,
    run_tag: String,
}

impl CsvUploadSink {
    pub fn new(
        session: Arc<RemoteSession>,
        temp_dir: impl Into<PathBuf>,
        run_started: NaiveDateTime,
        run_id: &str,
    ) -> Self {
        Self {
            session,
            temp_dir: temp_dir.into(),
            stamp: run_started.format("%Y%m%d_%H%M%S").to_string(),
            run_tag: run_id
                .chars()
                .filter(|c| c.is_ascii_alphanumeric())
                .take(RUN_TAG_LEN)
                .collect(),
        }
    }

    /// File name for the chunk with the given sequence number.
    pub fn file_name(&self, sequence: usize) -> String {
        format!(
            "data_export_{}_{}_{:04}.csv",
            self.stamp, self.run_tag, sequence
        )
    }

    fn render(chunk: &Chunk<DataRecord>) -> Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(HEADER)?;

        for record in chunk {
            let created_at = record
                .created_at
                .map(|ts| ts.format("%Y-%m-%dT%H:%M:%S").to_string())
                .unwrap_or_default();
            writer.write_record([
                record.id.to_string().as_str(),
                record.field1.as_deref().unwrap_or_default(),
                record.field2.as_deref().unwrap_or_default(),
                record.field3.as_deref().unwrap_or_default(),
                created_at.as_str(),
            ])?;
        }

        writer
            .into_inner()
            .map_err(|e| BatchError::sink(format!("flushing CSV: {}", e)))
    }
}

#[async_trait]
impl ItemSink for CsvUploadSink {
    type Item = DataRecord;

    async fn commit(&self, chunk: &Chunk<DataRecord>) -> Result<()> {
        let name = self.file_name(chunk.sequence());
        let path = self.temp_dir.join(&name);
        let data = Self::render(chunk)?;

        tokio::fs::create_dir_all(&self.temp_dir).await?;
        tokio::fs::write(&path, &data).await?;
        debug!("wrote {} records to {}", chunk.len(), path.display());

        self.session.upload(&path, &name).await
    }
}
