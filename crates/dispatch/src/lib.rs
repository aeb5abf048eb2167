pub mod handle;
pub mod job;
pub mod queue;
pub mod worker;

pub use handle::JobHandle;
pub use job::{InvalidLimits, JobError, JobId, JobLimits, JobState, SoftLimit};
pub use queue::{JobQueue, JobReceiver};
pub use worker::{JobMetrics, JobMetricsSnapshot, run_job_worker, spawn_job_worker};
