//! HTTP trigger endpoints and the interval scheduler.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use sftp_batch::{BatchError, PipelineKind, Result, RunSummary};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info};

use crate::trigger::Triggers;

#[derive(Debug, Deserialize)]
pub struct JobQuery {
    pub param: Option<String>,
}

/// Body of a successful trigger response.
#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub message: String,
    pub summary: RunSummary,
}

pub fn router(triggers: Arc<Triggers>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/jobs/{pipeline}", post(run_job))
        .with_state(triggers)
}

async fn health() -> &'static str {
    "ok"
}

async fn run_job(
    State(triggers): State<Arc<Triggers>>,
    Path(pipeline): Path<String>,
    Query(query): Query<JobQuery>,
) -> Response {
    let kind = match pipeline.parse::<PipelineKind>() {
        Ok(kind) => kind,
        Err(e) => return (StatusCode::NOT_FOUND, e.to_string()).into_response(),
    };

    let report = triggers.trigger(kind, query.param).await;
    match report.error {
        None => Json(JobResponse {
            message: format!("{} job completed successfully", kind.title()),
            summary: report.summary,
        })
        .into_response(),
        Some(e) => {
            error!("Error running {} job: {}", kind, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error running job: {}", e),
            )
                .into_response()
        }
    }
}

/// Spawn one interval task per scheduled pipeline. The first run happens one
/// full interval after startup; ticks missed while a run is in progress are
/// delayed, not bursted.
pub fn spawn_scheduler(triggers: Arc<Triggers>) -> Vec<JoinHandle<()>> {
    let schedule = triggers.context().config.schedule.clone();

    PipelineKind::ALL
        .into_iter()
        .filter_map(|kind| schedule.interval_for(kind).map(|period| (kind, period)))
        .map(|(kind, period)| {
            info!("Scheduling {} every {}s", kind, period.as_secs());
            let triggers = triggers.clone();
            tokio::spawn(async move { schedule_loop(triggers, kind, period).await })
        })
        .collect()
}

async fn schedule_loop(triggers: Arc<Triggers>, kind: PipelineKind, period: Duration) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let cancel = triggers.cancel_token().clone();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let report = triggers.trigger(kind, None).await;
                if let Some(e) = report.error {
                    error!("Scheduled {} run failed: {}", kind, e);
                }
            }
        }
    }
}

/// Serve HTTP triggers and run the scheduler until the cancel token fires.
pub async fn serve(triggers: Arc<Triggers>, shutdown_timeout: Duration) -> Result<()> {
    let bind = triggers.context().config.server.bind.clone();
    let listener = TcpListener::bind(&bind).await.map_err(|e| {
        BatchError::Config(format!("failed to bind server.bind '{}': {}", bind, e))
    })?;
    info!("Listening on {}", bind);

    let scheduled = spawn_scheduler(triggers.clone());
    let cancel = triggers.cancel_token().clone();
    let shutdown = cancel.clone();

    let server = tokio::spawn(async move {
        axum::serve(listener, router(triggers))
            .with_graceful_shutdown(async move { shutdown.cancelled().await })
            .await
    });

    cancel.cancelled().await;
    info!(
        "Shutting down; waiting up to {}s for running jobs",
        shutdown_timeout.as_secs()
    );

    let drain = async {
        for handle in scheduled {
            let _ = handle.await;
        }
        server.await
    };
    match tokio::time::timeout(shutdown_timeout, drain).await {
        Ok(Ok(result)) => result?,
        Ok(Err(join_err)) => error!("Server task failed: {}", join_err),
        Err(_) => error!("Shutdown timed out after {}s", shutdown_timeout.as_secs()),
    }

    Ok(())
}
