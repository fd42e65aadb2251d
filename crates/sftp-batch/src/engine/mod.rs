//! Chunk-oriented execution engine.
//!
//! The [`ChunkEngine`] drives one run of a pipeline: it reads items lazily from an
//! [`ItemSource`], applies an [`ItemTransform`] to each, accumulates accepted items
//! into fixed-size [`Chunk`]s and commits every full (or final partial) chunk to an
//! [`ItemSink`]. A failed commit is retried with linear backoff up to
//! [`EngineConfig::retry_limit`] additional attempts.
//!
//! ```text
//! Reading ──item──▶ Accumulating ──full──▶ Committing ──ok──▶ Reading
//!    │                                        │    ▲
//!    └──exhausted──▶ Committing (partial)     err  │ attempt <= limit
//!                                             ▼    │
//!                                           Retrying ──exhausted──▶ Aborted
//! ```
//!
//! Source errors and transform failures abort the run immediately. Chunks
//! committed before an abort stay committed.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::BatchConfig;
use crate::core::{Chunk, ItemSink, ItemSource, ItemTransform, TransformOutcome};
use crate::error::{BatchError, Result};

/// Chunking and retry settings for one engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Maximum items per committed chunk.
    pub chunk_size: usize,

    /// Additional commit attempts after the first failure.
    pub retry_limit: u32,

    /// Base delay between commit attempts; attempt `n` waits `n * retry_delay`.
    pub retry_delay: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_size: 10,
            retry_limit: 3,
            retry_delay: Duration::from_millis(100),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the chunk size.
    pub fn with_chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size.max(1);
        self
    }

    /// Set the number of additional commit attempts.
    pub fn with_retry_limit(mut self, limit: u32) -> Self {
        self.retry_limit = limit;
        self
    }

    /// Set the base retry delay.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }
}

impl From<&BatchConfig> for EngineConfig {
    fn from(batch: &BatchConfig) -> Self {
        EngineConfig::new()
            .with_chunk_size(batch.chunk_size)
            .with_retry_limit(batch.retry_limit)
            .with_retry_delay(batch.retry_delay())
    }
}

/// Engine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Reading,
    Accumulating,
    Committing,
    Retrying,
    Done,
    Aborted,
}

impl EngineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, EngineState::Done | EngineState::Aborted)
    }
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EngineState::Reading => "reading",
            EngineState::Accumulating => "accumulating",
            EngineState::Committing => "committing",
            EngineState::Retrying => "retrying",
            EngineState::Done => "done",
            EngineState::Aborted => "aborted",
        };
        write!(f, "{}", s)
    }
}

/// Counters for a single run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Items pulled from the source.
    pub items_read: u64,

    /// Items accepted by the transform.
    pub accepted: u64,

    /// Items rejected by the transform.
    pub skipped: u64,

    /// Chunks successfully committed.
    pub chunks_committed: u64,

    /// Chunks discarded or not committed within the retry bound.
    pub chunks_failed: u64,

    /// Additional commit attempts across all chunks.
    pub retries: u64,

    /// Terminal state.
    pub state: EngineState,

    /// Wall-clock duration in seconds.
    pub duration_seconds: f64,
}

impl Default for RunSummary {
    fn default() -> Self {
        Self {
            items_read: 0,
            accepted: 0,
            skipped: 0,
            chunks_committed: 0,
            chunks_failed: 0,
            retries: 0,
            state: EngineState::Reading,
            duration_seconds: 0.0,
        }
    }
}

/// Outcome of a run: the summary plus the error that aborted it, if any.
#[derive(Debug)]
pub struct RunReport {
    pub summary: RunSummary,
    pub error: Option<BatchError>,
}

impl RunReport {
    /// Report for a run that had nothing to do.
    pub fn empty() -> Self {
        Self {
            summary: RunSummary {
                state: EngineState::Done,
                ..RunSummary::default()
            },
            error: None,
        }
    }

    /// Report for a run that failed before the engine started.
    pub fn aborted(error: BatchError) -> Self {
        Self {
            summary: RunSummary {
                state: EngineState::Aborted,
                ..RunSummary::default()
            },
            error: Some(error),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.summary.state == EngineState::Done
    }

    /// Convert into a `Result`, discarding the summary on failure.
    pub fn into_result(self) -> Result<RunSummary> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(self.summary),
        }
    }
}

/// Drives one run of a source → transform → sink pipeline.
pub struct ChunkEngine<S, T, K> {
    name: String,
    source: S,
    transform: T,
    sink: K,
    config: EngineConfig,
    cancel: Option<CancellationToken>,
}

impl<S, T, K> ChunkEngine<S, T, K>
where
    S: ItemSource<Item = T::Input>,
    T: ItemTransform,
    K: ItemSink<Item = T::Output>,
{
    pub fn new(
        name: impl Into<String>,
        source: S,
        transform: T,
        sink: K,
        config: EngineConfig,
    ) -> Self {
        Self {
            name: name.into(),
            source,
            transform,
            sink,
            config,
            cancel: None,
        }
    }

    /// Abort the run with [`BatchError::Cancelled`] once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Execute the run to completion. The engine is consumed; sources are single use.
    pub async fn run(mut self) -> RunReport {
        let started = Instant::now();
        let mut summary = RunSummary::default();

        info!(
            "{}: starting run (chunk_size={}, retry_limit={})",
            self.name, self.config.chunk_size, self.config.retry_limit
        );

        let result = self.drive(&mut summary).await;
        summary.duration_seconds = started.elapsed().as_secs_f64();

        match result {
            Ok(()) => {
                summary.state = EngineState::Done;
                info!(
                    "{}: done - {} read, {} accepted, {} skipped, {} chunks committed, {} retries in {:.2}s",
                    self.name,
                    summary.items_read,
                    summary.accepted,
                    summary.skipped,
                    summary.chunks_committed,
                    summary.retries,
                    summary.duration_seconds
                );
                RunReport {
                    summary,
                    error: None,
                }
            }
            Err(e) => {
                summary.state = EngineState::Aborted;
                error!(
                    "{}: aborted after {} chunks committed: {}",
                    self.name, summary.chunks_committed, e
                );
                RunReport {
                    summary,
                    error: Some(e),
                }
            }
        }
    }

    async fn drive(&mut self, summary: &mut RunSummary) -> Result<()> {
        let mut sequence = 0;
        let mut chunk = Chunk::new(sequence, self.config.chunk_size);

        loop {
            if self.cancel.as_ref().is_some_and(|t| t.is_cancelled()) {
                if !chunk.is_empty() {
                    summary.chunks_failed += 1;
                }
                return Err(BatchError::Cancelled);
            }

            summary.state = EngineState::Reading;
            let item = match self.source.next().await? {
                Some(item) => item,
                None => break,
            };
            summary.items_read += 1;

            match self.transform.apply(item) {
                TransformOutcome::Accepted(value) => {
                    chunk.push(value);
                    summary.accepted += 1;
                    summary.state = EngineState::Accumulating;
                }
                TransformOutcome::Skipped { reason } => {
                    summary.skipped += 1;
                    warn!("{}: skipped item {}: {}", self.name, summary.items_read, reason);
                    continue;
                }
                TransformOutcome::Failed(e) => {
                    summary.chunks_failed += 1;
                    debug!(
                        "{}: discarding chunk {} with {} items",
                        self.name,
                        chunk.sequence(),
                        chunk.len()
                    );
                    return Err(e);
                }
            }

            if chunk.is_full() {
                commit_chunk(&self.name, &self.sink, &self.config, &chunk, summary).await?;
                sequence += 1;
                chunk = Chunk::new(sequence, self.config.chunk_size);
            }
        }

        if !chunk.is_empty() {
            commit_chunk(&self.name, &self.sink, &self.config, &chunk, summary).await?;
        }

        self.sink.finish().await
    }
}

/// Commit a chunk, retrying with linear backoff.
///
/// Borrows only the sink and settings so `ItemSource` needs `Send` but not `Sync`.
async fn commit_chunk<K: ItemSink>(
    name: &str,
    sink: &K,
    config: &EngineConfig,
    chunk: &Chunk<K::Item>,
    summary: &mut RunSummary,
) -> Result<()> {
    summary.state = EngineState::Committing;
    let mut retries: u32 = 0;

    loop {
        match sink.commit(chunk).await {
            Ok(()) => {
                summary.chunks_committed += 1;
                info!(
                    "{}: committed chunk {} ({} items)",
                    name,
                    chunk.sequence(),
                    chunk.len()
                );
                return Ok(());
            }
            Err(e) if retries < config.retry_limit => {
                retries += 1;
                summary.retries += 1;
                summary.state = EngineState::Retrying;
                warn!(
                    "{}: commit of chunk {} failed, retry {}/{}: {}",
                    name,
                    chunk.sequence(),
                    retries,
                    config.retry_limit,
                    e
                );
                let delay = config.retry_delay * retries;
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
            Err(e) => {
                summary.chunks_failed += 1;
                return Err(BatchError::CommitExhausted {
                    chunk: chunk.sequence(),
                    attempts: retries + 1,
                    source: Box::new(e),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};

    struct VecSource {
        items: VecDeque<i64>,
        fail_after: Option<usize>,
        served: usize,
    }

    impl VecSource {
        fn new(items: impl IntoIterator<Item = i64>) -> Self {
            Self {
                items: items.into_iter().collect(),
                fail_after: None,
                served: 0,
            }
        }

        fn failing_after(mut self, n: usize) -> Self {
            self.fail_after = Some(n);
            self
        }
    }

    #[async_trait]
    impl ItemSource for VecSource {
        type Item = i64;

        async fn next(&mut self) -> Result<Option<i64>> {
            if self.fail_after == Some(self.served) {
                return Err(BatchError::source_error("test", "connection reset"));
            }
            self.served += 1;
            Ok(self.items.pop_front())
        }
    }

    /// Accepts everything except negative numbers, which are skipped, and
    /// `fail_on`, which fails.
    struct TestTransform {
        fail_on: Option<i64>,
    }

    impl ItemTransform for TestTransform {
        type Input = i64;
        type Output = i64;

        fn apply(&self, item: i64) -> TransformOutcome<i64> {
            if self.fail_on == Some(item) {
                TransformOutcome::fail(item.to_string(), "poison item")
            } else if item < 0 {
                TransformOutcome::skip("negative")
            } else {
                TransformOutcome::Accepted(item * 10)
            }
        }
    }

    #[derive(Clone, Default)]
    struct RecordingSink {
        committed: Arc<Mutex<Vec<Vec<i64>>>>,
        attempts: Arc<AtomicU32>,
        failures_left: Arc<AtomicU32>,
        finished: Arc<AtomicU32>,
    }

    impl RecordingSink {
        fn failing(times: u32) -> Self {
            let sink = Self::default();
            sink.failures_left.store(times, Ordering::SeqCst);
            sink
        }

        fn chunk_sizes(&self) -> Vec<usize> {
            self.committed.lock().unwrap().iter().map(Vec::len).collect()
        }
    }

    #[async_trait]
    impl ItemSink for RecordingSink {
        type Item = i64;

        async fn commit(&self, chunk: &Chunk<i64>) -> Result<()> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            let left = self.failures_left.load(Ordering::SeqCst);
            if left > 0 {
                self.failures_left.store(left - 1, Ordering::SeqCst);
                return Err(BatchError::sink("remote unavailable"));
            }
            self.committed.lock().unwrap().push(chunk.items().to_vec());
            Ok(())
        }

        async fn finish(&self) -> Result<()> {
            self.finished.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn config(chunk_size: usize, retry_limit: u32) -> EngineConfig {
        EngineConfig::new()
            .with_chunk_size(chunk_size)
            .with_retry_limit(retry_limit)
            .with_retry_delay(Duration::ZERO)
    }

    fn engine(
        source: VecSource,
        sink: RecordingSink,
        cfg: EngineConfig,
    ) -> ChunkEngine<VecSource, TestTransform, RecordingSink> {
        ChunkEngine::new("test", source, TestTransform { fail_on: None }, sink, cfg)
    }

    #[tokio::test]
    async fn test_twenty_five_items_in_chunks_of_ten() {
        let sink = RecordingSink::default();
        let report = engine(VecSource::new(1..=25), sink.clone(), config(10, 3))
            .run()
            .await;

        assert!(report.is_success());
        assert_eq!(sink.chunk_sizes(), vec![10, 10, 5]);
        let s = &report.summary;
        assert_eq!(s.items_read, 25);
        assert_eq!(s.accepted, 25);
        assert_eq!(s.skipped, 0);
        assert_eq!(s.chunks_committed, 3);
        assert_eq!(s.chunks_failed, 0);
        assert_eq!(s.state, EngineState::Done);
        assert_eq!(sink.finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_commit_count_matches_ceiling() {
        for (n, c) in [(0usize, 3usize), (1, 1), (9, 3), (10, 3), (7, 10), (100, 7)] {
            let sink = RecordingSink::default();
            let report = engine(VecSource::new(0..n as i64), sink.clone(), config(c, 0))
                .run()
                .await;
            let sizes = sink.chunk_sizes();
            assert_eq!(sizes.len(), n.div_ceil(c), "n={} c={}", n, c);
            assert_eq!(report.summary.chunks_committed as usize, sizes.len());
            assert!(sizes.iter().all(|&len| len <= c));
            if let Some(last) = sizes.last() {
                let expected = if n % c == 0 { c } else { n % c };
                assert_eq!(*last, expected);
            }
        }
    }

    #[tokio::test]
    async fn test_skipped_items_do_not_fill_chunks() {
        let sink = RecordingSink::default();
        let items = vec![1, -1, 2, -2, 3, 4, -3, 5];
        let report = engine(VecSource::new(items), sink.clone(), config(2, 0))
            .run()
            .await;

        assert!(report.is_success());
        assert_eq!(report.summary.items_read, 8);
        assert_eq!(report.summary.skipped, 3);
        assert_eq!(report.summary.accepted, 5);
        assert_eq!(sink.chunk_sizes(), vec![2, 2, 1]);
        assert_eq!(
            *sink.committed.lock().unwrap(),
            vec![vec![10, 20], vec![30, 40], vec![50]]
        );
    }

    #[tokio::test]
    async fn test_all_items_skipped_commits_nothing() {
        let sink = RecordingSink::default();
        let report = engine(VecSource::new(vec![-1, -2, -3]), sink.clone(), config(2, 0))
            .run()
            .await;

        assert!(report.is_success());
        assert_eq!(report.summary.skipped, 3);
        assert_eq!(report.summary.chunks_committed, 0);
        assert_eq!(sink.attempts.load(Ordering::SeqCst), 0);
        assert_eq!(sink.finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_commit_succeeds_after_retry_limit_failures() {
        let sink = RecordingSink::failing(3);
        let report = engine(VecSource::new(1..=4), sink.clone(), config(10, 3))
            .run()
            .await;

        assert!(report.is_success());
        assert_eq!(report.summary.retries, 3);
        assert_eq!(report.summary.chunks_committed, 1);
        assert_eq!(sink.attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_commit_exhausted_after_retry_limit_plus_one_attempts() {
        let sink = RecordingSink::failing(u32::MAX);
        let report = engine(VecSource::new(1..=15), sink.clone(), config(10, 3))
            .run()
            .await;

        assert!(!report.is_success());
        assert_eq!(sink.attempts.load(Ordering::SeqCst), 4);
        assert_eq!(report.summary.state, EngineState::Aborted);
        assert_eq!(report.summary.chunks_committed, 0);
        assert_eq!(report.summary.chunks_failed, 1);
        assert_eq!(report.summary.retries, 3);
        // The run stops at the first exhausted chunk.
        assert_eq!(report.summary.items_read, 10);
        assert_eq!(sink.finished.load(Ordering::SeqCst), 0);
        match report.error {
            Some(BatchError::CommitExhausted {
                chunk, attempts, ..
            }) => {
                assert_eq!(chunk, 0);
                assert_eq!(attempts, 4);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_zero_retry_limit_fails_on_first_error() {
        let sink = RecordingSink::failing(1);
        let report = engine(VecSource::new(1..=3), sink.clone(), config(10, 0))
            .run()
            .await;

        assert!(!report.is_success());
        assert_eq!(sink.attempts.load(Ordering::SeqCst), 1);
        assert_eq!(report.summary.retries, 0);
    }

    #[tokio::test]
    async fn test_transform_failure_aborts_without_retry() {
        let sink = RecordingSink::default();
        let transform = TestTransform { fail_on: Some(13) };
        let source = VecSource::new(1..=30);
        let report = ChunkEngine::new("test", source, transform, sink.clone(), config(10, 3))
            .run()
            .await;

        assert_eq!(report.summary.state, EngineState::Aborted);
        assert_eq!(report.summary.chunks_committed, 1);
        assert_eq!(report.summary.chunks_failed, 1);
        assert_eq!(report.summary.retries, 0);
        assert_eq!(sink.chunk_sizes(), vec![10]);
        assert!(matches!(report.error, Some(BatchError::Transform { .. })));
    }

    #[tokio::test]
    async fn test_source_error_aborts_immediately() {
        let sink = RecordingSink::default();
        let source = VecSource::new(1..=30).failing_after(12);
        let report = engine(source, sink.clone(), config(5, 3)).run().await;

        assert_eq!(report.summary.state, EngineState::Aborted);
        assert_eq!(report.summary.items_read, 12);
        assert_eq!(report.summary.chunks_committed, 2);
        assert_eq!(report.summary.retries, 0);
        assert!(matches!(report.error, Some(BatchError::Source { .. })));
        assert_eq!(sink.finished.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let token = CancellationToken::new();
        token.cancel();
        let sink = RecordingSink::default();
        let report = engine(VecSource::new(1..=5), sink.clone(), config(2, 0))
            .with_cancellation(token)
            .run()
            .await;

        assert!(matches!(report.error, Some(BatchError::Cancelled)));
        assert_eq!(report.summary.items_read, 0);
        assert_eq!(sink.attempts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_engine_config_from_batch() {
        let batch = BatchConfig {
            chunk_size: 0,
            retry_limit: 7,
            retry_delay_ms: 250,
            ..BatchConfig::default()
        };
        let cfg = EngineConfig::from(&batch);
        assert_eq!(cfg.chunk_size, 1);
        assert_eq!(cfg.retry_limit, 7);
        assert_eq!(cfg.retry_delay, Duration::from_millis(250));
    }

    #[test]
    fn test_summary_serializes_state() {
        let report = RunReport::empty();
        let json = serde_json::to_string(&report.summary).unwrap();
        assert!(json.contains("\"state\":\"done\""));
        assert!(report.is_success());
        assert!(!RunReport::aborted(BatchError::Cancelled).is_success());
    }
}
