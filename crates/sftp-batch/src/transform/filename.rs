//! Remote file name transform.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::core::{ItemTransform, TransformOutcome};

/// A remote file to download and the local name to store it under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenamedFile {
    /// Name of the file in the remote input directory.
    pub remote_name: String,
    /// Name to write in the local output directory.
    pub local_name: String,
}

/// 32-bit checksum of a file name: the first four bytes of its SHA-256 digest,
/// rendered as eight uppercase hex digits.
pub fn name_checksum(name: &str) -> String {
    let digest = Sha256::digest(name.as_bytes());
    let value = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    format!("{:08X}", value)
}

/// Filters remote file names by extension and length and derives a
/// checksum-tagged local name: `report.csv` becomes `report_<checksum>.csv`.
#[derive(Debug, Clone)]
pub struct FilenameTransform {
    allowed_extensions: Vec<String>,
    max_name_length: usize,
}

impl Default for FilenameTransform {
    fn default() -> Self {
        Self::new(&["csv", "txt", "dat"], 100)
    }
}

impl FilenameTransform {
    pub fn new<S: AsRef<str>>(allowed_extensions: &[S], max_name_length: usize) -> Self {
        Self {
            allowed_extensions: allowed_extensions
                .iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_lowercase())
                .collect(),
            max_name_length,
        }
    }

    /// Split into stem and extension at the last dot. Names without a stem
    /// (`.csv`) or without an extension (`report.`) do not qualify.
    fn split(name: &str) -> Option<(&str, &str)> {
        let (stem, ext) = name.rsplit_once('.')?;
        if stem.is_empty() || ext.is_empty() {
            return None;
        }
        Some((stem, ext))
    }
}

impl ItemTransform for FilenameTransform {
    type Input = String;
    type Output = RenamedFile;

    fn apply(&self, name: String) -> TransformOutcome<RenamedFile> {
        if name.trim().is_empty() {
            return TransformOutcome::skip("empty file name");
        }

        let (stem, ext) = match Self::split(&name) {
            Some(parts) => parts,
            None => return TransformOutcome::skip(format!("no file extension: {}", name)),
        };
        if !self.allowed_extensions.contains(&ext.to_lowercase()) {
            return TransformOutcome::skip(format!("extension not allowed: {}", name));
        }

        if name.chars().count() > self.max_name_length {
            return TransformOutcome::skip(format!("file name too long: {}", name));
        }

        let local_name = format!("{}_{}.{}", stem, name_checksum(&name), ext);
        TransformOutcome::Accepted(RenamedFile {
            remote_name: name,
            local_name,
        })
    }
}
