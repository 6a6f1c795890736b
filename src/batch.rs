//! Bounded fan-out / full fan-in runner shared by both engines
//!
//! Every job is spawned as its own Tokio task immediately. A task waits for a
//! permit from the batch's semaphore before doing any work and keeps it until
//! it has emitted its terminal event, so `Started` and `Completed`/`Failed`
//! events bracket exactly the interval during which the job holds a slot.
//! [`run_batch`] returns only after every task has finished.

use futures::StreamExt;
use futures::future::BoxFuture;
use futures::stream::FuturesUnordered;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Semaphore, broadcast};

use crate::error::DownloadError;
use crate::types::{BatchResult, DownloadFailure, DownloadOutcome, Event};

/// One unit of work in a batch
pub(crate) struct Job {
    /// Statistical table ID, used in events and logs
    pub(crate) stats_data_id: String,
    /// What a failure record names (URL for files, ID for metadata)
    pub(crate) target: String,
    /// The fetch itself; not polled until a permit is held
    pub(crate) work: BoxFuture<'static, Result<PathBuf, DownloadError>>,
}

/// Run `jobs` with at most `max_concurrent` in flight and collect every outcome
///
/// Outcomes are recorded in completion order.
pub(crate) async fn run_batch(
    jobs: Vec<Job>,
    max_concurrent: usize,
    event_tx: &broadcast::Sender<Event>,
) -> BatchResult {
    let limit = Arc::new(Semaphore::new(max_concurrent.max(1)));

    let mut tasks = FuturesUnordered::new();
    for job in jobs {
        let _ = event_tx.send(Event::Queued {
            stats_data_id: job.stats_data_id.clone(),
        });

        let target = job.target.clone();
        let stats_data_id = job.stats_data_id.clone();
        let handle = tokio::spawn(run_job(job, Arc::clone(&limit), event_tx.clone()));

        tasks.push(async move {
            match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(stats_data_id = %stats_data_id, error = %e, "Download task panicked");
                    DownloadOutcome::Failure(DownloadFailure::new(
                        target,
                        &DownloadError::Unexpected(format!("download task failed: {e}")),
                    ))
                }
            }
        });
    }

    let mut result = BatchResult::default();
    while let Some(outcome) = tasks.next().await {
        result.record(outcome);
    }
    result
}

async fn run_job(
    job: Job,
    limit: Arc<Semaphore>,
    event_tx: broadcast::Sender<Event>,
) -> DownloadOutcome {
    let Job {
        stats_data_id,
        target,
        work,
    } = job;

    // Held until the terminal event has been sent
    let _permit = match limit.acquire_owned().await {
        Ok(permit) => permit,
        Err(e) => {
            let error = DownloadError::Unexpected(format!("concurrency limiter closed: {e}"));
            return fail(&event_tx, stats_data_id, target, error);
        }
    };

    let _ = event_tx.send(Event::Started {
        stats_data_id: stats_data_id.clone(),
    });
    tracing::debug!(stats_data_id = %stats_data_id, target = %target, "Download started");

    match work.await {
        Ok(path) => {
            tracing::info!(stats_data_id = %stats_data_id, path = %path.display(), "Download complete");
            let _ = event_tx.send(Event::Completed {
                stats_data_id,
                path: path.clone(),
            });
            DownloadOutcome::Success { path }
        }
        Err(error) => fail(&event_tx, stats_data_id, target, error),
    }
}

fn fail(
    event_tx: &broadcast::Sender<Event>,
    stats_data_id: String,
    target: String,
    error: DownloadError,
) -> DownloadOutcome {
    tracing::warn!(
        stats_data_id = %stats_data_id,
        target = %target,
        status = ?error.status_code(),
        error = %error,
        "Download failed"
    );
    let failure = DownloadFailure::new(target, &error);
    let _ = event_tx.send(Event::Failed {
        stats_data_id,
        status_code: failure.status_code,
        message: failure.message.clone(),
    });
    DownloadOutcome::Failure(failure)
}
