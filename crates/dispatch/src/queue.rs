use std::sync::Arc;

use tokio::{
    sync::{mpsc, oneshot, watch},
    time::Instant,
};
use tracing::debug;
use uuid::Uuid;

use crate::{
    handle::JobHandle,
    job::{Job, JobError, JobLimits, JobState, SoftLimit},
    worker::JobMetrics,
};

/// Submitting side of the job queue. Cheap to clone; the worker stops once
/// every clone has been dropped.
pub struct JobQueue<T> {
    tx: mpsc::Sender<Job<T>>,
    metrics: Arc<JobMetrics>,
}

pub struct JobReceiver<T> {
    pub(crate) rx: mpsc::Receiver<Job<T>>,
    pub(crate) metrics: Arc<JobMetrics>,
}

impl<T> Clone for JobQueue<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

impl<T: Send + 'static> JobQueue<T> {
    pub fn new(buffer: usize) -> (Self, JobReceiver<T>) {
        let (tx, rx) = mpsc::channel(buffer.max(1));
        let metrics = Arc::new(JobMetrics::default());
        (
            Self {
                tx,
                metrics: Arc::clone(&metrics),
            },
            JobReceiver { rx, metrics },
        )
    }

    pub fn metrics(&self) -> Arc<JobMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Queues `computation`. Waiting for queue capacity counts against
    /// `expires`.
    pub async fn submit<F>(
        &self,
        name: impl Into<String>,
        limits: JobLimits,
        computation: F,
    ) -> Result<JobHandle<T>, JobError>
    where
        F: FnOnce(&SoftLimit) -> anyhow::Result<T> + Send + 'static,
    {
        let id = Uuid::new_v4();
        let name = name.into();
        let submitted_at = Instant::now();
        let (state_tx, state_rx) = watch::channel(JobState::Pending);
        let state = Arc::new(state_tx);
        let (result_tx, result_rx) = oneshot::channel();
        let job = Job {
            id,
            name: name.clone(),
            limits,
            submitted_at,
            state: Arc::clone(&state),
            computation: Box::new(computation),
            result_tx,
        };

        match tokio::time::timeout(limits.expires(), self.tx.send(job)).await {
            Ok(Ok(())) => {}
            Ok(Err(_)) => return Err(JobError::QueueClosed),
            Err(_) => {
                self.metrics.record_expired();
                return Err(JobError::Expired {
                    job: id,
                    waited: submitted_at.elapsed(),
                });
            }
        }
        self.metrics.record_submitted();
        debug!(job_id = %id, job = name, "job submitted");

        Ok(JobHandle::new(
            id,
            limits,
            submitted_at,
            state,
            state_rx,
            result_rx,
            Arc::clone(&self.metrics),
        ))
    }
}
