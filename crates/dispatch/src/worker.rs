use std::sync::{
    atomic::{AtomicU64, Ordering},
};

use serde::Serialize;
use tokio::{task::JoinHandle, time::Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    job::{Job, JobError, JobState, SoftLimit, transition},
    queue::JobReceiver,
};

#[derive(Debug, Default)]
pub struct JobMetrics {
    submitted: AtomicU64,
    started: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    expired: AtomicU64,
    timed_out: AtomicU64,
    total_runtime_ms: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct JobMetricsSnapshot {
    pub submitted: u64,
    pub started: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub expired: u64,
    pub timed_out: u64,
    pub avg_runtime_ms: u64,
}

impl JobMetrics {
    pub(crate) fn record_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_expired(&self) {
        self.expired.fetch_add(1, Ordering::Relaxed);
    }

    fn record_started(&self) {
        self.started.fetch_add(1, Ordering::Relaxed);
    }

    fn record_finished(&self, outcome: &Result<(), JobError>, runtime_ms: u64) {
        self.total_runtime_ms
            .fetch_add(runtime_ms, Ordering::Relaxed);
        let counter = match outcome {
            Ok(()) => &self.succeeded,
            Err(JobError::TimeLimitExceeded { .. } | JobError::SoftTimeLimitExceeded { .. }) => {
                &self.timed_out
            }
            Err(_) => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> JobMetricsSnapshot {
        let started = self.started.load(Ordering::Relaxed);
        let total = self.total_runtime_ms.load(Ordering::Relaxed);
        JobMetricsSnapshot {
            submitted: self.submitted.load(Ordering::Relaxed),
            started,
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            expired: self.expired.load(Ordering::Relaxed),
            timed_out: self.timed_out.load(Ordering::Relaxed),
            avg_runtime_ms: if started == 0 { 0 } else { total / started },
        }
    }
}

pub fn spawn_job_worker<T: Send + 'static>(receiver: JobReceiver<T>) -> JoinHandle<()> {
    tokio::spawn(run_job_worker(receiver))
}

/// Runs jobs one at a time until every `JobQueue` handle is dropped.
pub async fn run_job_worker<T: Send + 'static>(receiver: JobReceiver<T>) {
    let JobReceiver { mut rx, metrics } = receiver;
    while let Some(job) = rx.recv().await {
        run_job(job, &metrics).await;
    }
    info!("job queue closed, worker exiting");
}

enum Outcome<T> {
    Finished(Result<anyhow::Result<T>, tokio::task::JoinError>),
    FinishedAfterSoftLimit(Result<anyhow::Result<T>, tokio::task::JoinError>),
    Abandoned,
}

async fn run_job<T: Send + 'static>(job: Job<T>, metrics: &JobMetrics) {
    let Job {
        id,
        name,
        limits,
        submitted_at,
        state,
        computation,
        result_tx,
    } = job;

    let waited = submitted_at.elapsed();
    let picked_up = waited <= limits.expires()
        && transition(&state, JobState::Pending, JobState::Running);
    if !picked_up {
        // The caller may already have marked (and counted) it expired.
        if transition(&state, JobState::Pending, JobState::Expired) {
            metrics.record_expired();
        }
        warn!(job_id = %id, job = name, waited_ms = waited.as_millis() as u64, "job expired before start");
        let _ = result_tx.send(Err(JobError::Expired { job: id, waited }));
        return;
    }

    metrics.record_started();
    debug!(job_id = %id, job = name, waited_ms = waited.as_millis() as u64, "job started");
    let started = Instant::now();
    let token = CancellationToken::new();
    let soft = SoftLimit::new(token.clone());
    let mut task = tokio::task::spawn_blocking(move || computation(&soft));

    let outcome = match tokio::time::timeout(limits.soft_time_limit(), &mut task).await {
        Ok(joined) => Outcome::Finished(joined),
        Err(_) => {
            token.cancel();
            warn!(job_id = %id, job = name, "soft time limit exceeded, cancelling");
            let remaining = limits
                .time_limit()
                .saturating_sub(limits.soft_time_limit());
            match tokio::time::timeout(remaining, &mut task).await {
                Ok(joined) => Outcome::FinishedAfterSoftLimit(joined),
                Err(_) => Outcome::Abandoned,
            }
        }
    };

    let result = match outcome {
        Outcome::Finished(Ok(Ok(value))) => Ok(value),
        Outcome::Finished(Ok(Err(err))) => Err(JobError::Failed {
            job: id,
            reason: format!("{err:#}"),
        }),
        Outcome::Finished(Err(join_err)) => Err(JobError::Failed {
            job: id,
            reason: format!("computation panicked: {join_err}"),
        }),
        // Once the soft limit fired the job has failed, whatever it returned.
        Outcome::FinishedAfterSoftLimit(_) => Err(JobError::SoftTimeLimitExceeded {
            job: id,
            limit: limits.soft_time_limit(),
        }),
        Outcome::Abandoned => {
            // A blocking computation cannot be pre-empted; its eventual output is dropped.
            task.abort();
            Err(JobError::TimeLimitExceeded {
                job: id,
                limit: limits.time_limit(),
            })
        }
    };

    let runtime_ms = started.elapsed().as_millis() as u64;
    let summary = result.as_ref().map(|_| ()).map_err(Clone::clone);
    metrics.record_finished(&summary, runtime_ms);
    match &summary {
        Ok(()) => {
            state.send_replace(JobState::Succeeded);
            info!(job_id = %id, job = name, runtime_ms, "job succeeded");
        }
        Err(err) => {
            state.send_replace(JobState::Failed);
            warn!(job_id = %id, job = name, runtime_ms, error = %err, "job failed");
        }
    }
    let _ = result_tx.send(result);
}
