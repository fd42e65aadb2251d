//! Chunk sinks for the three pipelines.
//!
//! Every sink derives destination names from the chunk sequence, so replaying
//! a commit after a failure overwrites the same files instead of adding new ones.

mod csv_upload;
mod download;
mod file_upload;

pub use csv_upload::CsvUploadSink;
pub use download::DownloadSink;
pub use file_upload::FileUploadSink;
