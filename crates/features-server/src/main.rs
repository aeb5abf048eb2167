use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    path::PathBuf,
    sync::Arc,
};

use anyhow::Context;
use common::config::AppConfig;
use dispatch::{JobQueue, spawn_job_worker};
use embeddings::EmbedderInterface;
use features_server::{app, services::embedder::build_embedder, state::AppState};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let config_path = std::env::var("PROTEMBED_CONFIG")
        .map_or_else(|_| PathBuf::from("protembed.toml"), PathBuf::from);
    let config = AppConfig::load(&config_path)?;
    let addr = build_bind_addr(&config.bind_addr, config.port, config.allow_non_local)?;

    let settings = config.embedder.clone();
    let embedder = tokio::task::spawn_blocking(move || build_embedder(&settings))
        .await
        .context("embedder construction task panicked")??;
    info!(
        embedder = embedder.name(),
        device = %embedder.device(),
        runtime = embedder.runtime_name(),
        "embedder loaded"
    );

    let (jobs, receiver) = JobQueue::new(config.queue_capacity);
    let worker = spawn_job_worker(receiver);
    let state = AppState::new(Arc::new(embedder), jobs, &config)?;

    info!("features-server listening on http://{addr}");
    info!("Features endpoint: http://{addr}/features");
    info!("Metrics endpoint: http://{addr}/metrics");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed binding {addr}"))?;
    axum::serve(listener, app::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router held the last queue handles; the worker drains and exits.
    if let Err(err) = worker.await {
        warn!(error = %err, "job worker ended abnormally");
    }
    Ok(())
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(err) => {
                warn!(error = %err, "SIGTERM handler unavailable, waiting for ctrl-c");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
    info!("shutdown requested");
}

fn build_bind_addr(host: &str, port: u16, allow_non_local: bool) -> anyhow::Result<SocketAddr> {
    let ip = host
        .parse::<IpAddr>()
        .with_context(|| format!("invalid bind address {host}"))?;
    let is_local_default = ip == IpAddr::V4(Ipv4Addr::LOCALHOST);

    if !is_local_default && !allow_non_local {
        anyhow::bail!(
            "non-local bind requested for {ip}, set allow_non_local = true in the config to opt in"
        );
    }

    Ok(SocketAddr::new(ip, port))
}

#[cfg(test)]
mod tests {
    use super::build_bind_addr;

    #[test]
    fn defaults_to_localhost() {
        let addr = build_bind_addr("127.0.0.1", 38090, false).expect("default bind addr");
        assert_eq!(addr.ip().to_string(), "127.0.0.1");
        assert_eq!(addr.port(), 38090);
    }

    #[test]
    fn rejects_non_local_without_opt_in() {
        let err = build_bind_addr("0.0.0.0", 38090, false).expect_err("expected rejection");
        assert!(err.to_string().contains("allow_non_local"));
        assert!(build_bind_addr("0.0.0.0", 38090, true).is_ok());
    }
}
