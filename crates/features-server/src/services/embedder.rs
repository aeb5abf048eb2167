use std::path::PathBuf;

use anyhow::Context;
use common::config::EmbedderSettings;
use embeddings::{
    BackendKind, Device, Embedder, EmbedderConfig, EmbedderKind, HttpModelFetcher,
};
use tracing::info;

/// Builds the configured embedder. Blocking: may download model files and
/// runs warmup passes.
pub fn build_embedder(settings: &EmbedderSettings) -> anyhow::Result<Embedder> {
    let kind: EmbedderKind = settings
        .name
        .parse()
        .with_context(|| format!("invalid embedder name in config: {}", settings.name))?;
    let device: Device = settings
        .device
        .parse()
        .with_context(|| format!("invalid device in config: {}", settings.device))?;

    let has_files = settings.weights_file.is_some()
        || settings.options_file.is_some()
        || settings.model_directory.is_some();
    if settings.synthetic && !has_files {
        info!(embedder = kind.name(), "using synthetic embedder without model files");
        return Ok(Embedder::synthetic(kind, Some(device)));
    }

    let config = EmbedderConfig {
        weights_file: settings.weights_file.as_ref().map(PathBuf::from),
        options_file: settings.options_file.as_ref().map(PathBuf::from),
        model_directory: settings.model_directory.as_ref().map(PathBuf::from),
        device: Some(device),
        backend: if settings.synthetic {
            BackendKind::Synthetic
        } else {
            BackendKind::Onnx
        },
        warmup_rounds: settings.warmup_rounds,
    };
    let fetcher = HttpModelFetcher::new(&settings.download_base_url, &settings.cache_dir)
        .context("failed creating model download client")?;
    Embedder::new(kind, config, &fetcher)
        .with_context(|| format!("failed loading embedder {}", kind.name()))
}

#[cfg(test)]
mod tests {
    use common::config::EmbedderSettings;
    use embeddings::{EmbedderInterface, EmbedderKind};

    use super::build_embedder;

    #[test]
    fn synthetic_without_files_needs_no_download() {
        let settings = EmbedderSettings {
            name: "esm".to_string(),
            synthetic: true,
            ..EmbedderSettings::default()
        };
        let embedder = build_embedder(&settings).expect("synthetic embedder");
        assert_eq!(embedder.kind(), EmbedderKind::Esm);
        assert_eq!(embedder.embedding_dimension(), 1280);
        assert_eq!(embedder.runtime_name(), "synthetic");
    }

    #[test]
    fn rejects_unknown_embedder_name() {
        let settings = EmbedderSettings {
            name: "word2vec".to_string(),
            synthetic: true,
            ..EmbedderSettings::default()
        };
        let err = build_embedder(&settings).err().expect("unknown embedder");
        assert!(err.to_string().contains("word2vec"));
    }
}
