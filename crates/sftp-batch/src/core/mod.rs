//! Core abstractions for chunk-oriented batch pipelines.
//!
//! - [`traits`]: the three per-pipeline seams ([`ItemSource`], [`ItemTransform`], [`ItemSink`])
//! - [`chunk`]: the bounded unit of commit and retry
//! - [`record`]: the relational record exported by the database pipeline
//!
//! Each pipeline supplies concrete implementations of the three traits and the
//! [`ChunkEngine`](crate::engine::ChunkEngine) drives them.

pub mod chunk;
pub mod record;
pub mod traits;

pub use chunk::Chunk;
pub use record::DataRecord;
pub use traits::{ItemSink, ItemSource, ItemTransform, TransformOutcome};
