//! # sftp-batch
//!
//! Chunk-oriented batch transfers between PostgreSQL, the local filesystem and
//! an SFTP server.
//!
//! Three pipelines share one engine:
//!
//! - **database-to-sftp**: export `data_records` as CSV files and upload them
//! - **file-to-sftp**: clean the lines of a local `.txt` file and upload them
//! - **sftp-to-file**: download remote files under checksum-tagged names
//!
//! Each run reads items lazily, transforms them one at a time (invalid items
//! are skipped, not failed), groups accepted items into fixed-size chunks and
//! commits every chunk atomically with bounded retry.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use sftp_batch::{Config, PipelineContext, PipelineKind, PipelineRunner, RunParams};
//!
//! #[tokio::main]
//! async fn main() -> sftp_batch::Result<()> {
//!     let config = Arc::new(Config::load("config.yaml")?);
//!     let context = PipelineContext::connect(config, &[PipelineKind::SftpToFile]).await?;
//!     let runner = PipelineRunner::new(PipelineKind::SftpToFile, context);
//!     let summary = runner.run(RunParams::new()).await.into_result()?;
//!     println!("Downloaded {} files", summary.accepted);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod engine;
pub mod error;
pub mod pipeline;
pub mod remote;
pub mod repository;
pub mod sink;
pub mod source;
pub mod transform;

// Re-exports for convenient access
pub use config::Config;
pub use core::{Chunk, DataRecord, ItemSink, ItemSource, ItemTransform, TransformOutcome};
pub use engine::{ChunkEngine, EngineConfig, EngineState, RunReport, RunSummary};
pub use error::{BatchError, Result};
pub use pipeline::{PipelineContext, PipelineKind, PipelineRunner, RunParams};
pub use remote::RemoteSession;
pub use repository::{PgRecordRepository, RecordRepository};
