//! Error types for the batch library.

use thiserror::Error;

/// Main error type for pipeline operations.
#[derive(Error, Debug)]
pub enum BatchError {
    /// Configuration error (invalid YAML, missing fields, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The item source could not produce the next item.
    #[error("Source error in {pipeline}: {message}")]
    Source { pipeline: String, message: String },

    /// A transform failed on an item (as opposed to rejecting it).
    #[error("Transform failed for item {item}: {message}")]
    Transform { item: String, message: String },

    /// Committing a chunk to its destination failed.
    #[error("Sink error: {0}")]
    Sink(String),

    /// A chunk could not be committed within the retry bound.
    #[error("Chunk {chunk} not committed after {attempts} attempts: {source}")]
    CommitExhausted {
        chunk: usize,
        attempts: u32,
        #[source]
        source: Box<BatchError>,
    },

    /// Remote (SFTP) operation failed
    #[error("Remote error: {0}")]
    Remote(#[from] opendal::Error),

    /// Source database query error
    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    /// Connection pool error with context
    #[error("Pool error: {message}\n  Context: {context}")]
    Pool { message: String, context: String },

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV encoding error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Run was cancelled (SIGINT, etc.)
    #[error("Run cancelled")]
    Cancelled,
}

impl BatchError {
    /// Create a Source error for a pipeline.
    pub fn source_error(pipeline: impl Into<String>, message: impl Into<String>) -> Self {
        BatchError::Source {
            pipeline: pipeline.into(),
            message: message.into(),
        }
    }

    /// Create a Transform error for an item.
    pub fn transform(item: impl Into<String>, message: impl Into<String>) -> Self {
        BatchError::Transform {
            item: item.into(),
            message: message.into(),
        }
    }

    /// Create a Sink error.
    pub fn sink(message: impl Into<String>) -> Self {
        BatchError::Sink(message.into())
    }

    /// Create a Pool error with context about where it occurred
    pub fn pool(message: impl std::fmt::Display, context: impl Into<String>) -> Self {
        BatchError::Pool {
            message: message.to_string(),
            context: context.into(),
        }
    }

    /// Process exit code for this error.
    pub fn exit_code(&self) -> u8 {
        match self {
            BatchError::Config(_) | BatchError::Yaml(_) => 1,
            BatchError::Source { .. } => 2,
            BatchError::Transform { .. } => 3,
            BatchError::Sink(_) | BatchError::CommitExhausted { .. } | BatchError::Csv(_) => 4,
            BatchError::Remote(_) => 5,
            BatchError::Database(_) | BatchError::Pool { .. } => 6,
            BatchError::Io(_) | BatchError::Json(_) => 7,
            BatchError::Cancelled => 8,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, BatchError>;
