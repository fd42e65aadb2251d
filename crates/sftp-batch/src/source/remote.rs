//! Remote directory listing source.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::core::ItemSource;
use crate::error::{BatchError, Result};
use crate::remote::RemoteSession;

/// Yields the names of the regular files in the remote input directory,
/// sorted. The directory is listed once, on the first read.
pub struct RemoteListingSource {
    session: Arc<RemoteSession>,
    names: Option<VecDeque<String>>,
}

impl RemoteListingSource {
    pub fn new(session: Arc<RemoteSession>) -> Self {
        Self {
            session,
            names: None,
        }
    }
}

#[async_trait]
impl ItemSource for RemoteListingSource {
    type Item = String;

    async fn next(&mut self) -> Result<Option<String>> {
        if self.names.is_none() {
            let names = self.session.list_input().await.map_err(|e| {
                BatchError::source_error(
                    "sftp-to-file",
                    format!("listing {}: {}", self.session.input_dir(), e),
                )
            })?;
            info!(
                "found {} remote files in {}",
                names.len(),
                self.session.input_dir()
            );
            self.names = Some(names.into());
        }

        Ok(self.names.as_mut().and_then(VecDeque::pop_front))
    }
}
