use std::{sync::Arc, time::Duration};

use serde::Serialize;
use thiserror::Error;
use tokio::{
    sync::{oneshot, watch},
    time::Instant,
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub type JobId = Uuid;

/// Execution bounds of a job.
///
/// `soft_time_limit` asks the computation to stop, `time_limit` abandons it,
/// `expires` bounds the time spent waiting in the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobLimits {
    time_limit: Duration,
    soft_time_limit: Duration,
    expires: Duration,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid job limits: {0}")]
pub struct InvalidLimits(String);

impl JobLimits {
    pub fn new(
        time_limit: Duration,
        soft_time_limit: Duration,
        expires: Duration,
    ) -> Result<Self, InvalidLimits> {
        if time_limit.is_zero() || soft_time_limit.is_zero() || expires.is_zero() {
            return Err(InvalidLimits("limits must be non-zero".to_string()));
        }
        if soft_time_limit > time_limit {
            return Err(InvalidLimits(format!(
                "soft_time_limit {soft_time_limit:?} exceeds time_limit {time_limit:?}"
            )));
        }
        Ok(Self {
            time_limit,
            soft_time_limit,
            expires,
        })
    }

    pub fn from_secs(
        time_limit: u64,
        soft_time_limit: u64,
        expires: u64,
    ) -> Result<Self, InvalidLimits> {
        Self::new(
            Duration::from_secs(time_limit),
            Duration::from_secs(soft_time_limit),
            Duration::from_secs(expires),
        )
    }

    /// Five minutes of execution, one hour in the queue.
    pub const fn web_default() -> Self {
        Self {
            time_limit: Duration::from_secs(60 * 5),
            soft_time_limit: Duration::from_secs(60 * 5),
            expires: Duration::from_secs(60 * 60),
        }
    }

    pub const fn time_limit(&self) -> Duration {
        self.time_limit
    }

    pub const fn soft_time_limit(&self) -> Duration {
        self.soft_time_limit
    }

    pub const fn expires(&self) -> Duration {
        self.expires
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Succeeded,
    Failed,
    Expired,
}

impl JobState {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Expired)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum JobError {
    #[error("job {job} expired after {waited:?} in queue")]
    Expired { job: JobId, waited: Duration },

    #[error("job {job} exceeded its soft time limit of {limit:?}")]
    SoftTimeLimitExceeded { job: JobId, limit: Duration },

    #[error("job {job} was terminated after its time limit of {limit:?}")]
    TimeLimitExceeded { job: JobId, limit: Duration },

    #[error("job {job} failed: {reason}")]
    Failed { job: JobId, reason: String },

    #[error("job {job} was dropped by its worker")]
    WorkerLost { job: JobId },

    #[error("job queue is closed")]
    QueueClosed,
}

/// Cooperative cancellation signal handed to a running computation.
#[derive(Debug, Clone, Default)]
pub struct SoftLimit {
    token: CancellationToken,
}

impl SoftLimit {
    pub(crate) fn new(token: CancellationToken) -> Self {
        Self { token }
    }

    pub fn is_exceeded(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Errors once the soft time limit has passed; call between units of work.
    pub fn check(&self) -> anyhow::Result<()> {
        if self.is_exceeded() {
            anyhow::bail!("soft time limit exceeded");
        }
        Ok(())
    }
}

pub(crate) type Computation<T> = Box<dyn FnOnce(&SoftLimit) -> anyhow::Result<T> + Send>;

pub(crate) struct Job<T> {
    pub(crate) id: JobId,
    pub(crate) name: String,
    pub(crate) limits: JobLimits,
    pub(crate) submitted_at: Instant,
    pub(crate) state: Arc<watch::Sender<JobState>>,
    pub(crate) computation: Computation<T>,
    pub(crate) result_tx: oneshot::Sender<Result<T, JobError>>,
}

/// Moves `state` from `from` to `to` only if it still holds `from`.
pub(crate) fn transition(state: &watch::Sender<JobState>, from: JobState, to: JobState) -> bool {
    state.send_if_modified(|current| {
        if *current == from {
            *current = to;
            true
        } else {
            false
        }
    })
}
