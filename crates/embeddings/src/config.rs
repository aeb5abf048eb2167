use std::{fmt, path::PathBuf, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::EmbedError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    Cpu,
    Cuda,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    #[default]
    Onnx,
    /// Deterministic stand-in for the forward pass, seeded from the weights file.
    Synthetic,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedderConfig {
    pub weights_file: Option<PathBuf>,
    pub options_file: Option<PathBuf>,
    pub model_directory: Option<PathBuf>,
    pub device: Option<Device>,
    pub backend: BackendKind,
    pub warmup_rounds: usize,
}

impl Default for EmbedderConfig {
    fn default() -> Self {
        Self {
            weights_file: None,
            options_file: None,
            model_directory: None,
            device: None,
            backend: BackendKind::Onnx,
            warmup_rounds: 0,
        }
    }
}

/// Contents of the JSON options file shipped next to the weights.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelOptions {
    #[serde(default)]
    pub embedding_dimension: Option<usize>,
    #[serde(default)]
    pub max_sequence_length: Option<usize>,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Device {
    /// `PROTEMBED_DEVICE=cuda` selects the accelerator; anything else is CPU.
    pub fn from_env() -> Self {
        let raw = std::env::var("PROTEMBED_DEVICE").unwrap_or_default();
        raw.parse().unwrap_or(Self::Cpu)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cpu => "cpu",
            Self::Cuda => "cuda",
        }
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Device {
    type Err = EmbedError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        if raw.eq_ignore_ascii_case("cpu") {
            Ok(Self::Cpu)
        } else if raw.eq_ignore_ascii_case("cuda") || raw.eq_ignore_ascii_case("gpu") {
            Ok(Self::Cuda)
        } else {
            Err(EmbedError::computation(format!("unknown device {raw:?}")))
        }
    }
}

pub(crate) fn resolve_device(preferred: Device) -> Device {
    match preferred {
        Device::Cpu => Device::Cpu,
        Device::Cuda => {
            if cuda_runtime_available() {
                Device::Cuda
            } else {
                Device::Cpu
            }
        }
    }
}

fn cuda_runtime_available() -> bool {
    std::env::var("PROTEMBED_CUDA_AVAILABLE")
        .map(|v| v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}
