//! Shared trigger entry point for the HTTP server and the scheduler.

use sftp_batch::{PipelineContext, PipelineKind, PipelineRunner, RunParams, RunReport};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Runs pipelines on behalf of every trigger.
///
/// Holds one lock per pipeline kind: a trigger arriving while the same
/// pipeline is running waits for it to finish. Different pipelines run
/// concurrently.
pub struct Triggers {
    context: PipelineContext,
    cancel: CancellationToken,
    locks: [Mutex<()>; 3],
}

impl Triggers {
    pub fn new(context: PipelineContext, cancel: CancellationToken) -> Self {
        Self {
            context,
            cancel,
            locks: [Mutex::new(()), Mutex::new(()), Mutex::new(())],
        }
    }

    pub fn context(&self) -> &PipelineContext {
        &self.context
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    fn lock_for(&self, kind: PipelineKind) -> &Mutex<()> {
        match kind {
            PipelineKind::DatabaseToSftp => &self.locks[0],
            PipelineKind::FileToSftp => &self.locks[1],
            PipelineKind::SftpToFile => &self.locks[2],
        }
    }

    /// Run `kind` to completion, waiting for any in-flight run of the same kind.
    pub async fn trigger(&self, kind: PipelineKind, param: Option<String>) -> RunReport {
        let lock = self.lock_for(kind);
        let _guard = match lock.try_lock() {
            Ok(guard) => guard,
            Err(_) => {
                warn!("{} is already running; waiting for it to finish", kind);
                lock.lock().await
            }
        };

        let params = RunParams::new().with_param(param);
        let report = PipelineRunner::new(kind, self.context.clone())
            .with_cancellation(self.cancel.clone())
            .run(params)
            .await;

        info!(
            "{} finished: {} ({} chunks committed)",
            kind, report.summary.state, report.summary.chunks_committed
        );
        report
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::Path;
    use std::sync::Arc;

    use sftp_batch::config::{
        BatchConfig, LocalConfig, ScheduleConfig, ServerConfig, SftpConfig,
    };
    use sftp_batch::{Config, PipelineContext, RemoteSession};
    use tokio_util::sync::CancellationToken;

    use super::Triggers;

    /// Triggers over an in-memory remote and local dirs under `dir`.
    pub(crate) fn triggers(dir: &Path) -> Arc<Triggers> {
        let config = Config {
            database: None,
            sftp: SftpConfig {
                host: "memory".into(),
                port: 22,
                user: "test".into(),
                key: None,
                known_hosts: "accept".into(),
                input_dir: "/inbound".into(),
                output_dir: "/outbound".into(),
            },
            local: LocalConfig {
                input_dir: dir.join("in"),
                output_dir: dir.join("out"),
                temp_dir: dir.join("tmp"),
            },
            batch: BatchConfig {
                chunk_size: 2,
                retry_delay_ms: 0,
                ..BatchConfig::default()
            },
            schedule: ScheduleConfig::default(),
            server: ServerConfig::default(),
        };
        let operator = opendal::Operator::new(opendal::services::Memory::default())
            .unwrap()
            .finish();
        let remote = Arc::new(RemoteSession::from_operator(operator, "/inbound", "/outbound"));
        let context = PipelineContext::new(Arc::new(config), remote);
        Arc::new(Triggers::new(context, CancellationToken::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::triggers;
    use super::*;
    use std::time::Duration;

    async fn write_input(dir: &std::path::Path) {
        tokio::fs::create_dir_all(dir.join("in")).await.unwrap();
        tokio::fs::write(
            dir.join("in").join("orders.txt"),
            "a,1,b,2,c\nd,3,e,4,f\ng,5,h,6,i\nj,7,k,8,l\n",
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_trigger_waits_for_running_pipeline_of_same_kind() {
        let dir = tempfile::tempdir().unwrap();
        let triggers = triggers(dir.path());

        let running = triggers.lock_for(PipelineKind::FileToSftp).lock().await;
        let waiting = triggers.clone();
        let mut handle =
            tokio::spawn(async move { waiting.trigger(PipelineKind::FileToSftp, None).await });

        let blocked = tokio::time::timeout(Duration::from_millis(100), &mut handle).await;
        assert!(blocked.is_err(), "trigger ran while the same pipeline was running");

        drop(running);
        let report = tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(report.is_success(), "{:?}", report.error);
    }

    #[tokio::test]
    async fn test_other_pipelines_are_not_blocked() {
        let dir = tempfile::tempdir().unwrap();
        let triggers = triggers(dir.path());

        let _running = triggers.lock_for(PipelineKind::SftpToFile).lock().await;
        let report = tokio::time::timeout(
            Duration::from_secs(5),
            triggers.trigger(PipelineKind::FileToSftp, None),
        )
        .await
        .unwrap();
        assert!(report.is_success(), "{:?}", report.error);
    }

    #[tokio::test]
    async fn test_concurrent_triggers_of_same_kind_run_one_after_another() {
        let dir = tempfile::tempdir().unwrap();
        write_input(dir.path()).await;
        let triggers = triggers(dir.path());

        let (first, second) = tokio::join!(
            triggers.trigger(PipelineKind::FileToSftp, None),
            triggers.trigger(PipelineKind::FileToSftp, None)
        );

        assert!(first.is_success(), "{:?}", first.error);
        assert!(second.is_success(), "{:?}", second.error);
        // The first run consumes and deletes the input; the second finds nothing.
        let mut read = [first.summary.items_read, second.summary.items_read];
        read.sort();
        assert_eq!(read, [0, 4]);

        let uploaded = triggers.context().remote.list("/outbound").await.unwrap();
        assert_eq!(uploaded, vec!["orders_0000.txt", "orders_0001.txt"]);
        assert!(!dir.path().join("in").join("orders.txt").exists());
    }
}
