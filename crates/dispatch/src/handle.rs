use std::{sync::Arc, time::Duration};

use tokio::{
    sync::{oneshot, watch},
    time::Instant,
};
use tracing::warn;

use crate::{
    job::{JobError, JobId, JobLimits, JobState, transition},
    worker::JobMetrics,
};

/// Extra time granted past `time_limit` before the caller stops waiting for
/// the worker to report.
const HARD_LIMIT_GRACE: Duration = Duration::from_secs(1);

/// Caller side of a submitted job.
pub struct JobHandle<T> {
    id: JobId,
    limits: JobLimits,
    submitted_at: Instant,
    state: Arc<watch::Sender<JobState>>,
    state_rx: watch::Receiver<JobState>,
    result_rx: oneshot::Receiver<Result<T, JobError>>,
    metrics: Arc<JobMetrics>,
}

impl<T> JobHandle<T> {
    pub(crate) const fn new(
        id: JobId,
        limits: JobLimits,
        submitted_at: Instant,
        state: Arc<watch::Sender<JobState>>,
        state_rx: watch::Receiver<JobState>,
        result_rx: oneshot::Receiver<Result<T, JobError>>,
        metrics: Arc<JobMetrics>,
    ) -> Self {
        Self {
            id,
            limits,
            submitted_at,
            state,
            state_rx,
            result_rx,
            metrics,
        }
    }

    pub const fn id(&self) -> JobId {
        self.id
    }

    pub fn state(&self) -> JobState {
        *self.state_rx.borrow()
    }

    /// Waits for the outcome. The wait is bounded by the job's own limits:
    /// `expires` while pending, `time_limit` once running. A job dropped
    /// unrun is reported as lost rather than awaited.
    pub async fn wait(mut self) -> Result<T, JobError> {
        let expiry = self.submitted_at + self.limits.expires();
        while *self.state_rx.borrow_and_update() == JobState::Pending {
            tokio::select! {
                changed = self.state_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                received = &mut self.result_rx => {
                    return received.unwrap_or(Err(JobError::WorkerLost { job: self.id }));
                }
                () = tokio::time::sleep_until(expiry) => {
                    if transition(&self.state, JobState::Pending, JobState::Expired) {
                        self.metrics.record_expired();
                        return Err(JobError::Expired {
                            job: self.id,
                            waited: self.submitted_at.elapsed(),
                        });
                    }
                }
            }
        }

        let budget = self.limits.time_limit() + HARD_LIMIT_GRACE;
        match tokio::time::timeout(budget, self.result_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(JobError::WorkerLost { job: self.id }),
            Err(_) => {
                warn!(job_id = %self.id, "worker did not report within the time limit");
                self.state.send_replace(JobState::Failed);
                Err(JobError::TimeLimitExceeded {
                    job: self.id,
                    limit: self.limits.time_limit(),
                })
            }
        }
    }
}
