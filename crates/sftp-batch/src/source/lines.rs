//! Local file line source.

use std::borrow::Cow;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;

use crate::core::ItemSource;
use crate::error::{BatchError, Result};

/// Reads one local file line by line. The file is opened on the first read.
///
/// Lines are decoded as UTF-8 with invalid bytes replaced by U+FFFD, so a
/// badly encoded line reaches the transform instead of ending the run.
pub struct LineSource {
    path: PathBuf,
    reader: Option<BufReader<File>>,
    buf: Vec<u8>,
    line_number: u64,
    done: bool,
}

impl LineSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            reader: None,
            buf: Vec::new(),
            line_number: 0,
            done: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn error(&self, e: std::io::Error) -> BatchError {
        BatchError::source_error(
            "file-to-sftp",
            format!("reading {}: {}", self.path.display(), e),
        )
    }

    fn decode_line(&self) -> String {
        let mut bytes = self.buf.as_slice();
        if let Some(rest) = bytes.strip_suffix(b"\n") {
            bytes = rest;
        }
        if let Some(rest) = bytes.strip_suffix(b"\r") {
            bytes = rest;
        }

        match String::from_utf8_lossy(bytes) {
            Cow::Borrowed(line) => line.to_string(),
            Cow::Owned(line) => {
                warn!(
                    "{}: line {} is not valid UTF-8, invalid bytes replaced",
                    self.path.display(),
                    self.line_number
                );
                line
            }
        }
    }
}

#[async_trait]
impl ItemSource for LineSource {
    type Item = String;

    async fn next(&mut self) -> Result<Option<String>> {
        if self.done {
            return Ok(None);
        }

        if self.reader.is_none() {
            let file = File::open(&self.path).await.map_err(|e| self.error(e))?;
            self.reader = Some(BufReader::new(file));
        }

        self.buf.clear();
        let read = match self.reader.as_mut() {
            Some(reader) => reader.read_until(b'\n', &mut self.buf).await,
            None => Ok(0),
        };

        match read {
            Ok(0) => {
                self.done = true;
                self.reader = None;
                Ok(None)
            }
            Ok(_) => {
                self.line_number += 1;
                Ok(Some(self.decode_line()))
            }
            Err(e) => Err(self.error(e)),
        }
    }
}
