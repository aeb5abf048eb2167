use std::sync::Arc;

use anyhow::Context;
use common::{FeaturesResult, config::AppConfig};
use dispatch::{JobLimits, JobQueue, JobReceiver};
use embeddings::{Device, Embedder, EmbedderKind};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

#[derive(Clone)]
pub struct AppState {
    pub metrics: PrometheusHandle,
    pub embedder: Arc<Embedder>,
    pub jobs: JobQueue<FeaturesResult>,
    pub limits: JobLimits,
    pub max_sequence_length: usize,
}

impl AppState {
    pub fn new(
        embedder: Arc<Embedder>,
        jobs: JobQueue<FeaturesResult>,
        config: &AppConfig,
    ) -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new().install_recorder()?;
        let limits = JobLimits::from_secs(
            config.jobs.time_limit_secs,
            config.jobs.soft_time_limit_secs,
            config.jobs.expires_secs,
        )
        .context("invalid [jobs] limits in config")?;
        Ok(Self {
            metrics: handle,
            embedder,
            jobs,
            limits,
            max_sequence_length: config.max_sequence_length,
        })
    }

    /// State over a synthetic SeqVec embedder. The receiver is returned so a
    /// test decides whether a worker ever runs.
    pub fn for_tests() -> (Self, JobReceiver<FeaturesResult>) {
        let recorder = PrometheusBuilder::new().build_recorder();
        let (jobs, receiver) = JobQueue::new(8);
        let state = Self {
            metrics: recorder.handle(),
            embedder: Arc::new(Embedder::synthetic(EmbedderKind::SeqVec, Some(Device::Cpu))),
            jobs,
            limits: JobLimits::web_default(),
            max_sequence_length: AppConfig::default().max_sequence_length,
        };
        (state, receiver)
    }
}
