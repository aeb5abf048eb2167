use std::{collections::HashMap, path::Path};

use ort::{session::Session, value::Tensor};
use parking_lot::Mutex;
use rayon::prelude::*;
use sha2::{Digest, Sha256};

use crate::{
    error::{EmbedError, Result},
    padding::{BatchOutput, PaddedBatch},
};

pub(crate) enum Backend {
    Onnx(OnnxBackend),
    Synthetic(SyntheticBackend),
}

impl Backend {
    pub(crate) fn forward(&self, batch: &PaddedBatch, hidden: usize) -> Result<BatchOutput> {
        if batch.batch_size == 0 {
            return Ok(BatchOutput {
                values: Vec::new(),
                batch_size: 0,
                seq_len: batch.seq_len,
                hidden,
            });
        }
        match self {
            Self::Onnx(backend) => backend.forward(batch),
            Self::Synthetic(backend) => Ok(backend.forward(batch)),
        }
    }

    pub(crate) const fn runtime_name(&self) -> &'static str {
        match self {
            Self::Onnx(_) => "ort",
            Self::Synthetic(_) => "synthetic",
        }
    }
}

pub(crate) struct OnnxBackend {
    session: Mutex<Session>,
}

impl OnnxBackend {
    pub(crate) fn load(weights: &Path) -> Result<Self> {
        let malformed = |err: ort::Error| EmbedError::MalformedResource {
            path: weights.to_path_buf(),
            reason: err.to_string(),
        };
        let session = Session::builder()
            .map_err(malformed)?
            .commit_from_file(weights)
            .map_err(malformed)?;
        Ok(Self {
            session: Mutex::new(session),
        })
    }

    fn forward(&self, batch: &PaddedBatch) -> Result<BatchOutput> {
        let shape = vec![batch.batch_size as i64, batch.seq_len as i64];
        let ids_tensor = Tensor::<i64>::from_array((shape.clone(), batch.input_ids.clone()))
            .map_err(runtime_error)?;
        let mask_tensor = Tensor::<i64>::from_array((shape, batch.attention_mask.clone()))
            .map_err(runtime_error)?;

        let mut session = self.session.lock();
        let mut model_inputs = HashMap::new();
        for input in session.inputs() {
            let name = input.name().to_lowercase();
            let value = if name.contains("attention") && name.contains("mask") {
                mask_tensor.clone().upcast()
            } else {
                ids_tensor.clone().upcast()
            };
            model_inputs.insert(input.name().to_string(), value);
        }

        let mut outputs = session.run(model_inputs).map_err(runtime_error)?;
        let first_key = outputs
            .keys()
            .next()
            .map(str::to_string)
            .ok_or_else(|| EmbedError::computation("embedding model returned no outputs"))?;
        let output = outputs
            .remove(first_key)
            .ok_or_else(|| EmbedError::computation("embedding model output extraction failed"))?;
        let (shape, values) = output
            .try_extract_tensor::<f32>()
            .map_err(|err| EmbedError::computation(format!("output decode failed: {err}")))?;

        decode_output(shape, values, batch)
    }
}

fn runtime_error(err: ort::Error) -> EmbedError {
    EmbedError::computation(err.to_string())
}

fn decode_output(shape: &[i64], values: &[f32], batch: &PaddedBatch) -> Result<BatchOutput> {
    if shape.len() != 3 {
        return Err(EmbedError::computation(format!(
            "per-residue output must have rank 3, got {}",
            shape.len()
        )));
    }
    let dims = shape
        .iter()
        .map(|d| usize::try_from(*d).unwrap_or(0))
        .collect::<Vec<_>>();
    let (batch_size, seq_len, hidden) = (dims[0], dims[1], dims[2]);
    if hidden == 0 || batch_size != batch.batch_size || seq_len != batch.seq_len {
        return Err(EmbedError::computation(format!(
            "model output shape {shape:?} does not match padded batch {}x{}",
            batch.batch_size, batch.seq_len
        )));
    }
    if values.len() < batch_size * seq_len * hidden {
        return Err(EmbedError::computation(
            "embedding output tensor too small for its declared shape",
        ));
    }
    Ok(BatchOutput {
        values: values[..batch_size * seq_len * hidden].to_vec(),
        batch_size,
        seq_len,
        hidden,
    })
}

/// Deterministic forward pass used for tests and local development.
///
/// Each position depends on its own token, its unmasked neighbours and its
/// offset, never on padding, so a sequence embeds identically alone or in a
/// batch unless `batch_drift` is set.
pub(crate) struct SyntheticBackend {
    seed: u64,
    hidden: usize,
    batch_drift: bool,
}

const MAX_BATCH_DRIFT: f32 = 3.0e-5;

impl SyntheticBackend {
    pub(crate) const fn new(seed: u64, hidden: usize, batch_drift: bool) -> Self {
        Self {
            seed,
            hidden,
            batch_drift,
        }
    }

    pub(crate) fn seed_from_weights(weights: &Path) -> Result<u64> {
        let bytes = std::fs::read(weights).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => EmbedError::MissingResource {
                path: weights.to_path_buf(),
            },
            _ => EmbedError::Io(err),
        })?;
        let digest = Sha256::digest(&bytes);
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        Ok(u64::from_le_bytes(prefix))
    }

    fn forward(&self, batch: &PaddedBatch) -> BatchOutput {
        let hidden = self.hidden;
        let drift = if self.batch_drift && batch.batch_size > 1 {
            1.0 + MAX_BATCH_DRIFT * (1.0 - (-((batch.batch_size - 1) as f32)).exp())
        } else {
            1.0
        };

        let rows = (0..batch.batch_size)
            .into_par_iter()
            .map(|row| {
                let ids = batch.row_ids(row);
                let mask = batch.row_mask(row);
                let mut out = vec![0.0f32; batch.seq_len * hidden];
                for position in 0..batch.seq_len {
                    if mask[position] == 0 {
                        continue;
                    }
                    let prev = position
                        .checked_sub(1)
                        .filter(|p| mask[*p] != 0)
                        .map_or(-1, |p| ids[p]);
                    let next = Some(position + 1)
                        .filter(|p| *p < batch.seq_len && mask[*p] != 0)
                        .map_or(-1, |p| ids[p]);
                    let slot = &mut out[position * hidden..(position + 1) * hidden];
                    self.fill_position(slot, ids[position], prev, next, position, drift);
                }
                out
            })
            .collect::<Vec<_>>();

        BatchOutput {
            values: rows.concat(),
            batch_size: batch.batch_size,
            seq_len: batch.seq_len,
            hidden,
        }
    }

    fn fill_position(
        &self,
        slot: &mut [f32],
        token: i64,
        prev: i64,
        next: i64,
        position: usize,
        drift: f32,
    ) {
        for (d, value) in slot.iter_mut().enumerate() {
            let d = d as u64;
            let frequency = 1.0 / (1.0 + d as f32);
            let positional = ((position as f32 + 1.0) * frequency).sin();
            let mixed = 0.6 * self.unit(token, d, 0)
                + 0.25 * self.unit(prev, d, 1)
                + 0.15 * self.unit(next, d, 2)
                + 0.05 * positional;
            *value = mixed * drift;
        }
    }

    /// Uniform value in `[-1, 1)` derived from the seed and the inputs.
    fn unit(&self, token: i64, dim: u64, salt: u64) -> f32 {
        let mut h = self.seed
            ^ (token as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
            ^ dim.wrapping_mul(0xC2B2_AE3D_27D4_EB4F)
            ^ salt.wrapping_mul(0x1656_67B1_9E37_79F9);
        h = (h ^ (h >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        h = (h ^ (h >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        h ^= h >> 31;
        ((h >> 40) as f32 / (1u64 << 24) as f32).mul_add(2.0, -1.0)
    }
}
