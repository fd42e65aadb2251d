//! Relational record exported by the database pipeline.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// A row of the `data_records` table.
///
/// Text columns are nullable in the store; `created_at` is stamped by the
/// store on insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRecord {
    pub id: i64,
    pub field1: Option<String>,
    pub field2: Option<String>,
    pub field3: Option<String>,
    pub created_at: Option<NaiveDateTime>,
}

impl DataRecord {
    /// Create a record with all text fields set.
    pub fn new(
        id: i64,
        field1: impl Into<String>,
        field2: impl Into<String>,
        field3: impl Into<String>,
    ) -> Self {
        Self {
            id,
            field1: Some(field1.into()),
            field2: Some(field2.into()),
            field3: Some(field3.into()),
            created_at: None,
        }
    }

    /// Set the creation timestamp.
    pub fn with_created_at(mut self, created_at: NaiveDateTime) -> Self {
        self.created_at = Some(created_at);
        self
    }
}
