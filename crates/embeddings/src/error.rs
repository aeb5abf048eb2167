use std::path::PathBuf;

use thiserror::Error;

pub type Result<T, E = EmbedError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum EmbedError {
    /// A required model file or directory is absent.
    #[error("model resource not found: {}", path.display())]
    MissingResource { path: PathBuf },

    /// A required model file exists but cannot be decoded.
    #[error("model resource {} is malformed: {reason}", path.display())]
    MalformedResource { path: PathBuf, reason: String },

    #[error("unknown embedder {0:?}")]
    UnknownEmbedder(String),

    #[error("batch_size must be positive, got {0}")]
    InvalidBatchSize(usize),

    #[error("embedding computation failed: {0}")]
    Computation(String),

    #[error("model download failed: {0}")]
    Download(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl EmbedError {
    pub fn computation(message: impl Into<String>) -> Self {
        Self::Computation(message.into())
    }

    pub const fn is_missing_resource(&self) -> bool {
        matches!(self, Self::MissingResource { .. })
    }
}
