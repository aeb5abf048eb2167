use std::{fs, path::Path, str::FromStr};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    pub bind_addr: String,
    pub port: u16,
    pub allow_non_local: bool,
    pub max_sequence_length: usize,
    pub queue_capacity: usize,
    pub embedder: EmbedderSettings,
    pub jobs: JobSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EmbedderSettings {
    pub name: String,
    pub device: String,
    pub synthetic: bool,
    pub weights_file: Option<String>,
    pub options_file: Option<String>,
    pub model_directory: Option<String>,
    pub warmup_rounds: usize,
    pub download_base_url: String,
    pub cache_dir: String,
}

/// Bounds applied to every `/features` job, in seconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct JobSettings {
    pub time_limit_secs: u64,
    pub soft_time_limit_secs: u64,
    pub expires_secs: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".to_string(),
            port: 38090,
            allow_non_local: false,
            max_sequence_length: 2000,
            queue_capacity: 64,
            embedder: EmbedderSettings::default(),
            jobs: JobSettings::default(),
        }
    }
}

impl Default for EmbedderSettings {
    fn default() -> Self {
        Self {
            name: "seqvec".to_string(),
            device: "cpu".to_string(),
            synthetic: false,
            weights_file: None,
            options_file: None,
            model_directory: None,
            warmup_rounds: 0,
            download_base_url: "https://models.protembed.dev".to_string(),
            cache_dir: ".protembed/models".to_string(),
        }
    }
}

impl Default for JobSettings {
    fn default() -> Self {
        Self {
            time_limit_secs: 60 * 5,
            soft_time_limit_secs: 60 * 5,
            expires_secs: 60 * 60,
        }
    }
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let mut cfg = if path.exists() {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed reading config file: {}", path.display()))?;
            toml::from_str::<Self>(&raw)
                .with_context(|| format!("failed parsing config file: {}", path.display()))?
        } else {
            Self::default()
        };

        if let Ok(addr) = std::env::var("PROTEMBED_BIND_ADDR") {
            cfg.bind_addr = addr;
        }
        if let Ok(port) = std::env::var("PROTEMBED_PORT") {
            cfg.port = parse_or_keep("PROTEMBED_PORT", &port, cfg.port);
        }
        if let Ok(name) = std::env::var("PROTEMBED_EMBEDDER") {
            cfg.embedder.name = name;
        }
        if let Ok(dir) = std::env::var("PROTEMBED_MODEL_DIR") {
            cfg.embedder.model_directory = Some(dir);
        }
        if let Ok(device) = std::env::var("PROTEMBED_DEVICE") {
            cfg.embedder.device = device;
        }
        if let Ok(flag) = std::env::var("PROTEMBED_SYNTHETIC") {
            cfg.embedder.synthetic = flag.eq_ignore_ascii_case("true");
        }

        Ok(cfg)
    }
}

fn parse_or_keep<T: FromStr + Copy>(key: &str, raw: &str, current: T) -> T {
    raw.parse().unwrap_or_else(|_| {
        warn!(key, value = raw, "ignoring unparsable config override");
        current
    })
}
