use std::{fmt, str::FromStr};

use tracing::{debug, info};

use crate::{
    backend::{Backend, OnnxBackend, SyntheticBackend},
    config::{BackendKind, Device, EmbedderConfig, ModelOptions, resolve_device},
    embedder::{EmbedMany, EmbedderInterface},
    error::{EmbedError, Result},
    padding::{BatchOutput, PaddedBatch, TokenLayout},
    resources::{ModelFetcher, load_options, resolve_model_files},
};

const WARMUP_SEQUENCE: &str = "SEQWENCE";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EmbedderKind {
    SeqVec,
    ProtTransBertBfd,
    Esm,
    /// Batched output drifts slightly from unbatched output; explicit batch
    /// sizes are refused.
    ProtTransT5Bfd,
    /// Runs on the CPU regardless of the requested device.
    UniRep,
}

impl EmbedderKind {
    pub const ALL: [Self; 5] = [
        Self::SeqVec,
        Self::ProtTransBertBfd,
        Self::Esm,
        Self::ProtTransT5Bfd,
        Self::UniRep,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::SeqVec => "seqvec",
            Self::ProtTransBertBfd => "prottrans_bert_bfd",
            Self::Esm => "esm",
            Self::ProtTransT5Bfd => "prottrans_t5_bfd",
            Self::UniRep => "unirep",
        }
    }

    pub const fn embedding_dimension(self) -> usize {
        match self {
            Self::SeqVec | Self::ProtTransBertBfd | Self::ProtTransT5Bfd => 1024,
            Self::Esm => 1280,
            Self::UniRep => 1900,
        }
    }

    pub const fn token_layout(self) -> TokenLayout {
        match self {
            Self::SeqVec => TokenLayout::NONE,
            Self::ProtTransBertBfd | Self::Esm => TokenLayout::new(1, 1),
            Self::ProtTransT5Bfd => TokenLayout::new(0, 1),
            Self::UniRep => TokenLayout::new(1, 0),
        }
    }

    pub const fn fixed_device(self) -> Option<Device> {
        match self {
            Self::UniRep => Some(Device::Cpu),
            _ => None,
        }
    }

    pub const fn has_batch_drift(self) -> bool {
        matches!(self, Self::ProtTransT5Bfd)
    }

    const fn synthetic_seed(self) -> u64 {
        match self {
            Self::SeqVec => 0x5E0_7EC,
            Self::ProtTransBertBfd => 0xBE27,
            Self::Esm => 0xE5,
            Self::ProtTransT5Bfd => 0x75,
            Self::UniRep => 0x0017_2E9,
        }
    }
}

impl fmt::Display for EmbedderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EmbedderKind {
    type Err = EmbedError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let wanted = raw.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == wanted)
            .ok_or_else(|| EmbedError::UnknownEmbedder(raw.to_string()))
    }
}

/// A concrete embedder: one variant plus the backend running its forward pass.
pub struct Embedder {
    kind: EmbedderKind,
    device: Device,
    options: ModelOptions,
    backend: Backend,
}

impl Embedder {
    /// Resolves and loads model files; every configuration problem surfaces
    /// here rather than on first use.
    pub fn new(
        kind: EmbedderKind,
        config: EmbedderConfig,
        fetcher: &dyn ModelFetcher,
    ) -> Result<Self> {
        let files = resolve_model_files(kind, &config, fetcher)?;
        let options = load_options(&files.options)?;
        if let Some(dim) = options.embedding_dimension {
            if dim != kind.embedding_dimension() {
                return Err(EmbedError::MalformedResource {
                    path: files.options,
                    reason: format!(
                        "embedding_dimension {dim} does not match {} ({})",
                        kind.name(),
                        kind.embedding_dimension()
                    ),
                });
            }
        }

        let backend = match config.backend {
            BackendKind::Onnx => Backend::Onnx(OnnxBackend::load(&files.weights)?),
            BackendKind::Synthetic => {
                let seed = match options.seed {
                    Some(seed) => seed,
                    None => SyntheticBackend::seed_from_weights(&files.weights)?,
                };
                Backend::Synthetic(SyntheticBackend::new(
                    seed,
                    kind.embedding_dimension(),
                    kind.has_batch_drift(),
                ))
            }
        };

        let embedder = Self {
            kind,
            device: select_device(kind, config.device),
            options,
            backend,
        };
        embedder.warm_up(config.warmup_rounds)?;
        info!(
            embedder = kind.name(),
            device = %embedder.device,
            runtime = embedder.runtime_name(),
            weights = %files.weights.display(),
            "embedder ready"
        );
        Ok(embedder)
    }

    /// Embedder backed by the synthetic forward pass, without model files.
    pub fn synthetic(kind: EmbedderKind, device: Option<Device>) -> Self {
        Self {
            kind,
            device: select_device(kind, device),
            options: ModelOptions::default(),
            backend: Backend::Synthetic(SyntheticBackend::new(
                kind.synthetic_seed(),
                kind.embedding_dimension(),
                kind.has_batch_drift(),
            )),
        }
    }

    pub const fn kind(&self) -> EmbedderKind {
        self.kind
    }

    pub const fn runtime_name(&self) -> &'static str {
        self.backend.runtime_name()
    }

    fn warm_up(&self, rounds: usize) -> Result<()> {
        for round in 0..rounds {
            debug!(embedder = self.kind.name(), round, "warmup");
            self.embed(WARMUP_SEQUENCE)?;
        }
        Ok(())
    }
}

fn select_device(kind: EmbedderKind, requested: Option<Device>) -> Device {
    kind.fixed_device()
        .unwrap_or_else(|| resolve_device(requested.unwrap_or_else(Device::from_env)))
}

impl EmbedderInterface for Embedder {
    fn name(&self) -> &str {
        self.kind.name()
    }

    fn embedding_dimension(&self) -> usize {
        self.kind.embedding_dimension()
    }

    fn device(&self) -> Device {
        self.device
    }

    fn token_layout(&self) -> TokenLayout {
        self.kind.token_layout()
    }

    fn forward(&self, batch: &PaddedBatch) -> Result<BatchOutput> {
        if let Some(limit) = self.options.max_sequence_length {
            if batch.max_residues() > limit {
                return Err(EmbedError::computation(format!(
                    "{} accepts at most {limit} residues, got {}",
                    self.kind.name(),
                    batch.max_residues()
                )));
            }
        }
        self.backend.forward(batch, self.embedding_dimension())
    }

    /// For T5 an explicit `batch_size` is refused and `None` embeds one
    /// sequence at a time; every other variant uses the shared batching.
    fn embed_many<'a, S>(
        &'a self,
        sequences: &'a [S],
        batch_size: Option<usize>,
    ) -> Result<EmbedMany<'a, Self, S>>
    where
        S: AsRef<str>,
    {
        if !self.kind.has_batch_drift() {
            return self.embed_many_unchecked(sequences, batch_size);
        }
        match batch_size {
            Some(size) => Err(EmbedError::computation(format!(
                "{} returns different embeddings when batching, refusing batch_size={size}; pass None",
                self.kind.name()
            ))),
            None => Ok(EmbedMany::one_by_one(self, sequences)),
        }
    }
}
