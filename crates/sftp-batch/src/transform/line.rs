//! Local file line transform.

use crate::core::{ItemTransform, TransformOutcome};

/// Placeholder written for fields that end up empty after cleaning.
const EMPTY_FIELD: &str = "N/A";

/// Validates and normalizes comma-separated lines.
///
/// A line is skipped when it is blank, when any field is empty (leading,
/// trailing or doubled comma), or when its field count differs from
/// `expected_fields`.
#[derive(Debug, Clone)]
pub struct LineTransform {
    expected_fields: usize,
}

impl Default for LineTransform {
    fn default() -> Self {
        Self { expected_fields: 5 }
    }
}

impl LineTransform {
    pub fn new(expected_fields: usize) -> Self {
        Self { expected_fields }
    }

    fn clean_field(field: &str) -> String {
        let mut cleaned: String = field
            .trim()
            .chars()
            .filter(|c| {
                c.is_ascii_alphanumeric()
                    || c.is_ascii_whitespace()
                    || matches!(c, ',' | '.' | '-')
            })
            .collect();

        if !cleaned.chars().any(|c| c.is_ascii_digit()) {
            cleaned = cleaned.to_uppercase();
        }

        let cleaned = cleaned.trim();
        if cleaned.is_empty() {
            EMPTY_FIELD.to_string()
        } else {
            cleaned.to_string()
        }
    }
}

impl ItemTransform for LineTransform {
    type Input = String;
    type Output = String;

    fn apply(&self, line: String) -> TransformOutcome<String> {
        if line.trim().is_empty() {
            return TransformOutcome::skip("empty line");
        }

        let fields: Vec<&str> = line.split(',').collect();
        if fields.iter().any(|f| f.is_empty()) {
            return TransformOutcome::skip(format!("invalid CSV format: {}", line));
        }
        if fields.len() != self.expected_fields {
            return TransformOutcome::skip(format!(
                "expected {} fields, got {}: {}",
                self.expected_fields,
                fields.len(),
                line
            ));
        }

        let cleaned: Vec<String> = fields.into_iter().map(Self::clean_field).collect();
        TransformOutcome::Accepted(cleaned.join(","))
    }
}
