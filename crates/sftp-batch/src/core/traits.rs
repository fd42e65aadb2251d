//! Core traits for chunk-oriented pipelines.
//!
//! This module defines the abstractions the [`ChunkEngine`](crate::engine::ChunkEngine)
//! is generic over:
//!
//! - [`ItemSource`]: Produces a lazy, finite sequence of raw items
//! - [`ItemTransform`]: Validates and reshapes one item at a time
//! - [`ItemSink`]: Commits a completed chunk to its destination
//!
//! # Design Patterns
//!
//! - **Strategy**: each pipeline plugs its own source, transform and sink into
//!   the same engine
//! - **Template Method**: [`ItemSink::finish`] has a default no-op body that
//!   sinks override when the end of a run needs cleanup

use async_trait::async_trait;

use crate::error::{BatchError, Result};

use super::chunk::Chunk;

/// Result of applying an [`ItemTransform`] to a single item.
#[derive(Debug)]
pub enum TransformOutcome<T> {
    /// Item passed validation; the transformed value joins the current chunk.
    Accepted(T),

    /// Item was rejected on purpose. Counted, never retried, not an error.
    Skipped { reason: String },

    /// Processing the item failed. Aborts the containing chunk and the run.
    Failed(BatchError),
}

impl<T> TransformOutcome<T> {
    /// Reject an item with a reason.
    pub fn skip(reason: impl Into<String>) -> Self {
        TransformOutcome::Skipped {
            reason: reason.into(),
        }
    }

    /// Fail an item.
    pub fn fail(item: impl Into<String>, message: impl Into<String>) -> Self {
        TransformOutcome::Failed(BatchError::transform(item, message))
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, TransformOutcome::Accepted(_))
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, TransformOutcome::Skipped { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, TransformOutcome::Failed(_))
    }

    /// The accepted value, if any.
    pub fn accepted(self) -> Option<T> {
        match self {
            TransformOutcome::Accepted(v) => Some(v),
            _ => None,
        }
    }
}

/// Produce items for a pipeline run.
///
/// A source is single use: once [`next`](ItemSource::next) has returned
/// `Ok(None)` it keeps returning `Ok(None)`, and a new run needs a freshly
/// constructed source.
#[async_trait]
pub trait ItemSource: Send {
    /// Raw item type.
    type Item: Send;

    /// Read the next item.
    ///
    /// Returns `Ok(None)` when the source is exhausted and
    /// [`BatchError::Source`] when the underlying I/O fails.
    async fn next(&mut self) -> Result<Option<Self::Item>>;
}

/// Validate and reshape a single item.
///
/// Implementations are pure: the same input always yields the same
/// accept/skip/fail decision.
pub trait ItemTransform: Send + Sync {
    /// Item type read from the source.
    type Input: Send;

    /// Item type handed to the sink.
    type Output: Send + Sync;

    /// Apply the transform to one item.
    fn apply(&self, item: Self::Input) -> TransformOutcome<Self::Output>;
}

/// Commit completed chunks to a destination.
#[async_trait]
pub trait ItemSink: Send + Sync {
    /// Item type accepted in a chunk.
    type Item: Send + Sync;

    /// Durably write a chunk, all or nothing.
    ///
    /// The engine may call this again with the same chunk after a failure, so
    /// a replay must overwrite rather than append.
    async fn commit(&self, chunk: &Chunk<Self::Item>) -> Result<()>;

    /// Called once after the final chunk of a successful run.
    async fn finish(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_helpers() {
        let accepted: TransformOutcome<i32> = TransformOutcome::Accepted(7);
        assert!(accepted.is_accepted());
        assert_eq!(accepted.accepted(), Some(7));

        let skipped: TransformOutcome<i32> = TransformOutcome::skip("blank");
        assert!(skipped.is_skipped());
        assert_eq!(skipped.accepted(), None);

        let failed: TransformOutcome<i32> = TransformOutcome::fail("42", "boom");
        assert!(failed.is_failed());
        match failed {
            TransformOutcome::Failed(BatchError::Transform { item, message }) => {
                assert_eq!(item, "42");
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }
}
