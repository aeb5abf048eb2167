//! Locating the weights/options pair an embedder needs, downloading it when
//! nothing was supplied.

use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use tracing::{info, warn};

use crate::{
    config::{EmbedderConfig, ModelOptions},
    error::{EmbedError, Result},
    variants::EmbedderKind,
};

pub const WEIGHTS_FILE_NAME: &str = "weights.onnx";
pub const OPTIONS_FILE_NAME: &str = "options.json";
const REQUIRED_FILES: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelFiles {
    pub weights: PathBuf,
    pub options: PathBuf,
}

impl ModelFiles {
    pub fn in_directory(directory: &Path) -> Self {
        Self {
            weights: directory.join(WEIGHTS_FILE_NAME),
            options: directory.join(OPTIONS_FILE_NAME),
        }
    }

    fn ensure_exist(&self) -> Result<()> {
        for path in [&self.weights, &self.options] {
            if !path.is_file() {
                return Err(EmbedError::MissingResource { path: path.clone() });
            }
        }
        Ok(())
    }
}

/// Source of model files when the caller supplied none.
pub trait ModelFetcher: Send + Sync {
    fn fetch(&self, kind: EmbedderKind) -> Result<ModelFiles>;
}

pub fn resolve_model_files(
    kind: EmbedderKind,
    config: &EmbedderConfig,
    fetcher: &dyn ModelFetcher,
) -> Result<ModelFiles> {
    if let Some(directory) = &config.model_directory {
        if !directory.is_dir() {
            return Err(EmbedError::MissingResource {
                path: directory.clone(),
            });
        }
        let files = ModelFiles::in_directory(directory);
        files.ensure_exist()?;
        return Ok(files);
    }

    match (&config.weights_file, &config.options_file) {
        (Some(weights), Some(options)) => {
            let files = ModelFiles {
                weights: weights.clone(),
                options: options.clone(),
            };
            files.ensure_exist()?;
            Ok(files)
        }
        (None, None) => {
            info!(embedder = kind.name(), "no model files supplied, fetching");
            let files = fetcher.fetch(kind)?;
            files.ensure_exist()?;
            Ok(files)
        }
        (weights, _) => {
            let provided = usize::from(config.weights_file.is_some())
                + usize::from(config.options_file.is_some());
            warn!(
                "You should pass either all necessary files or directories, or none, while you provide {provided} of {REQUIRED_FILES}"
            );
            let absent = if weights.is_none() {
                WEIGHTS_FILE_NAME
            } else {
                OPTIONS_FILE_NAME
            };
            Err(EmbedError::MissingResource {
                path: PathBuf::from(absent),
            })
        }
    }
}

pub fn load_options(path: &Path) -> Result<ModelOptions> {
    let raw = fs::read_to_string(path).map_err(|err| match err.kind() {
        std::io::ErrorKind::NotFound => EmbedError::MissingResource {
            path: path.to_path_buf(),
        },
        _ => EmbedError::Io(err),
    })?;
    serde_json::from_str(&raw).map_err(|err| EmbedError::MalformedResource {
        path: path.to_path_buf(),
        reason: err.to_string(),
    })
}

/// Downloads `<base_url>/<embedder>/{weights.onnx,options.json}` into a local
/// cache, reusing files that are already there.
pub struct HttpModelFetcher {
    base_url: String,
    cache_dir: PathBuf,
    client: reqwest::blocking::Client,
}

impl HttpModelFetcher {
    pub fn new(base_url: impl Into<String>, cache_dir: impl Into<PathBuf>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(30 * 60))
            .build()
            .map_err(|err| EmbedError::Download(err.to_string()))?;
        Ok(Self {
            base_url: base_url.into(),
            cache_dir: cache_dir.into(),
            client,
        })
    }

    fn download(&self, url: &str, target: &Path) -> Result<()> {
        info!(url, target = %target.display(), "downloading model file");
        let bytes = self
            .client
            .get(url)
            .send()
            .and_then(reqwest::blocking::Response::error_for_status)
            .and_then(reqwest::blocking::Response::bytes)
            .map_err(|err| EmbedError::Download(format!("{url}: {err}")))?;
        let partial = target.with_extension("part");
        fs::write(&partial, &bytes)?;
        fs::rename(&partial, target)?;
        Ok(())
    }
}

impl ModelFetcher for HttpModelFetcher {
    fn fetch(&self, kind: EmbedderKind) -> Result<ModelFiles> {
        let directory = self.cache_dir.join(kind.name());
        fs::create_dir_all(&directory)?;
        let files = ModelFiles::in_directory(&directory);
        for (name, target) in [
            (WEIGHTS_FILE_NAME, &files.weights),
            (OPTIONS_FILE_NAME, &files.options),
        ] {
            if target.is_file() {
                continue;
            }
            let url = format!(
                "{}/{}/{name}",
                self.base_url.trim_end_matches('/'),
                kind.name()
            );
            self.download(&url, target)?;
        }
        Ok(files)
    }
}
