//! Item sources for the three pipelines.
//!
//! - [`RecordSource`]: keyset-paged scan of the record repository
//! - [`LineSource`]: lines of one local file
//! - [`RemoteListingSource`]: file names in the remote input directory
//!
//! All sources are lazy: nothing is read until the first call to `next()`.

mod lines;
mod records;
mod remote;

pub use lines::LineSource;
pub use records::RecordSource;
pub use remote::RemoteListingSource;
