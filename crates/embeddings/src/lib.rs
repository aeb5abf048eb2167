pub mod alphabet;
mod backend;
pub mod batch;
pub mod config;
pub mod embedder;
pub mod error;
pub mod fasta;
pub mod matrix;
pub mod padding;
pub mod reduce;
pub mod reference;
pub mod resources;
pub mod variants;

pub use batch::{Batch, SequenceBatchBuilder};
pub use config::{BackendKind, Device, EmbedderConfig, ModelOptions};
pub use embedder::{EmbedMany, EmbedderInterface};
pub use error::{EmbedError, Result};
pub use matrix::{EmbeddingMatrix, ProteinVector};
pub use resources::{HttpModelFetcher, ModelFetcher, ModelFiles};
pub use variants::{Embedder, EmbedderKind};
