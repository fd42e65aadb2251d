//! Database record transform.

use chrono::{Local, NaiveDateTime};
use tracing::debug;

use crate::core::{DataRecord, ItemTransform, TransformOutcome};

/// Source of the timestamp appended to `field3`.
#[derive(Debug, Clone)]
pub enum Clock {
    /// Local wall clock at the moment of transformation.
    System,
    /// A fixed instant.
    Fixed(NaiveDateTime),
}

impl Clock {
    fn now(&self) -> NaiveDateTime {
        match self {
            Clock::System => Local::now().naive_local(),
            Clock::Fixed(ts) => *ts,
        }
    }
}

/// Validates and normalizes [`DataRecord`]s read from the database.
///
/// - `field1` null or empty: skipped
/// - `field1`: uppercased
/// - `field2`: non-alphanumeric, non-whitespace characters removed, then trimmed
/// - `field3`: suffixed with `_<timestamp>` (ISO-8601 local date-time)
///
/// Null `field2`/`field3` become empty strings.
#[derive(Debug, Clone)]
pub struct RecordTransform {
    clock: Clock,
}

impl Default for RecordTransform {
    fn default() -> Self {
        Self {
            clock: Clock::System,
        }
    }
}

impl RecordTransform {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `clock` for the `field3` suffix.
    pub fn with_clock(clock: Clock) -> Self {
        Self { clock }
    }

    fn sanitize(field: Option<&str>) -> String {
        match field {
            Some(f) => f
                .chars()
                .filter(|c| c.is_ascii_alphanumeric() || c.is_ascii_whitespace())
                .collect::<String>()
                .trim()
                .to_string(),
            None => String::new(),
        }
    }

    fn enrich(&self, field: Option<&str>) -> String {
        match field {
            Some(f) => format!("{}_{}", f, self.clock.now().format("%Y-%m-%dT%H:%M:%S%.3f")),
            None => String::new(),
        }
    }
}

impl ItemTransform for RecordTransform {
    type Input = DataRecord;
    type Output = DataRecord;

    fn apply(&self, record: DataRecord) -> TransformOutcome<DataRecord> {
        let field1 = match record.field1.as_deref() {
            Some(f) if !f.is_empty() => f.to_uppercase(),
            _ => return TransformOutcome::skip(format!("record {} has empty field1", record.id)),
        };

        debug!("transforming record {}", record.id);

        TransformOutcome::Accepted(DataRecord {
            id: record.id,
            field1: Some(field1),
            field2: Some(Self::sanitize(record.field2.as_deref())),
            field3: Some(self.enrich(record.field3.as_deref())),
            created_at: record.created_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn fixed() -> RecordTransform {
        let ts = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_milli_opt(9, 30, 15, 250)
            .unwrap();
        RecordTransform::with_clock(Clock::Fixed(ts))
    }

    #[test]
    fn test_empty_field1_is_skipped() {
        let t = fixed();
        let mut record = DataRecord::new(1, "", "x", "y");
        assert!(t.apply(record.clone()).is_skipped());
        record.field1 = None;
        assert!(t.apply(record).is_skipped());
    }

    #[test]
    fn test_transforms_fields() {
        let t = fixed();
        let record = DataRecord::new(7, "hello", "a!b@c", "note");
        let out = t.apply(record).accepted().unwrap();
        assert_eq!(out.id, 7);
        assert_eq!(out.field1.as_deref(), Some("HELLO"));
        assert_eq!(out.field2.as_deref(), Some("abc"));
        assert_eq!(out.field3.as_deref(), Some("note_2024-03-01T09:30:15.250"));
    }

    #[test]
    fn test_sanitize_keeps_whitespace_and_trims() {
        let t = fixed();
        let record = DataRecord::new(2, "x", "  hi there! #1  ", "n");
        let out = t.apply(record).accepted().unwrap();
        assert_eq!(out.field2.as_deref(), Some("hi there 1"));
    }

    #[test]
    fn test_null_fields_become_empty() {
        let t = fixed();
        let record = DataRecord {
            id: 3,
            field1: Some("a".into()),
            field2: None,
            field3: None,
            created_at: None,
        };
        let out = t.apply(record).accepted().unwrap();
        assert_eq!(out.field2.as_deref(), Some(""));
        assert_eq!(out.field3.as_deref(), Some(""));
    }

    #[test]
    fn test_fixed_clock_is_deterministic() {
        let t = fixed();
        let record = DataRecord::new(4, "a", "b", "c");
        let first = t.apply(record.clone()).accepted();
        let second = t.apply(record).accepted();
        assert_eq!(first, second);
    }
}
