//! Per-item transforms for the three pipelines.
//!
//! Every transform is a pure function of its input (plus, for
//! [`RecordTransform`], an injectable clock) that accepts, skips or fails an
//! item. Skips are logged by the engine and never retried.

mod filename;
mod line;
mod record;

pub use filename::{name_checksum, FilenameTransform, RenamedFile};
pub use line::LineTransform;
pub use record::{Clock, RecordTransform};
