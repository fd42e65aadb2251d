//! Paged record source.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::core::{DataRecord, ItemSource};
use crate::error::{BatchError, Result};
use crate::repository::RecordRepository;

/// Streams records from a [`RecordRepository`] one page at a time.
///
/// Each page starts after the last id of the previous one. A page shorter than
/// `page_size` is the last.
pub struct RecordSource {
    repository: Arc<dyn RecordRepository>,
    page_size: usize,
    buffer: VecDeque<DataRecord>,
    last_id: Option<i64>,
    exhausted: bool,
}

impl RecordSource {
    pub fn new(repository: Arc<dyn RecordRepository>, page_size: usize) -> Self {
        Self {
            repository,
            page_size: page_size.max(1),
            buffer: VecDeque::new(),
            last_id: None,
            exhausted: false,
        }
    }

    async fn fetch_page(&mut self) -> Result<()> {
        let page = self
            .repository
            .find_page(self.last_id, self.page_size)
            .await
            .map_err(|e| BatchError::source_error("database-to-sftp", e.to_string()))?;

        debug!(
            "fetched page of {} records after id {:?}",
            page.len(),
            self.last_id
        );

        if page.len() < self.page_size {
            self.exhausted = true;
        }
        if let Some(last) = page.last() {
            self.last_id = Some(last.id);
        }
        self.buffer.extend(page);
        Ok(())
    }
}

#[async_trait]
impl ItemSource for RecordSource {
    type Item = DataRecord;

    async fn next(&mut self) -> Result<Option<DataRecord>> {
        if self.buffer.is_empty() && !self.exhausted {
            self.fetch_page().await?;
        }
        Ok(self.buffer.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::memory::MemoryRecordRepository;
    use std::sync::atomic::Ordering;

    async fn drain(source: &mut RecordSource) -> Vec<i64> {
        let mut ids = Vec::new();
        while let Some(record) = source.next().await.unwrap() {
            ids.push(record.id);
        }
        ids
    }

    #[tokio::test]
    async fn test_reads_all_pages_in_order() {
        let repo = Arc::new(MemoryRecordRepository::numbered(250, &[]));
        let mut source = RecordSource::new(repo.clone(), 100);

        let ids = drain(&mut source).await;
        assert_eq!(ids, (1..=250).collect::<Vec<_>>());
        // Pages of 100, 100, 50; the short page ends the scan.
        assert_eq!(repo.fetches.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exact_multiple_needs_one_empty_fetch() {
        let repo = Arc::new(MemoryRecordRepository::numbered(20, &[]));
        let mut source = RecordSource::new(repo.clone(), 10);

        assert_eq!(drain(&mut source).await.len(), 20);
        assert_eq!(repo.fetches.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhausted_source_stays_exhausted() {
        let repo = Arc::new(MemoryRecordRepository::numbered(3, &[]));
        let mut source = RecordSource::new(repo.clone(), 10);

        assert_eq!(drain(&mut source).await.len(), 3);
        assert!(source.next().await.unwrap().is_none());
        assert!(source.next().await.unwrap().is_none());
        assert_eq!(repo.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_repository_error_is_source_error() {
        let repo = Arc::new(MemoryRecordRepository::numbered(30, &[]).failing_on_fetch(1));
        let mut source = RecordSource::new(repo, 10);

        for _ in 0..10 {
            assert!(source.next().await.unwrap().is_some());
        }
        let err = source.next().await.unwrap_err();
        assert!(matches!(err, BatchError::Source { .. }));
    }
}
