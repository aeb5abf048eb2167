//! Padding a batch of tokenized sequences to a common length and slicing the
//! model output back to each sequence's true length.

use crate::{
    alphabet::{PAD_TOKEN, VOCAB_SIZE},
    error::{EmbedError, Result},
    matrix::EmbeddingMatrix,
};

pub const START_TOKEN: u32 = VOCAB_SIZE;
pub const END_TOKEN: u32 = VOCAB_SIZE + 1;

/// Special tokens a model wraps around the residues of every sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TokenLayout {
    pub prefix: usize,
    pub suffix: usize,
}

impl TokenLayout {
    pub const NONE: Self = Self {
        prefix: 0,
        suffix: 0,
    };

    pub const fn new(prefix: usize, suffix: usize) -> Self {
        Self { prefix, suffix }
    }

    pub const fn specials(self) -> usize {
        self.prefix + self.suffix
    }
}

/// Token ids of a batch laid out `[batch_size, seq_len]`, row-major.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaddedBatch {
    pub input_ids: Vec<i64>,
    pub attention_mask: Vec<i64>,
    pub batch_size: usize,
    pub seq_len: usize,
    pub lengths: Vec<usize>,
    pub layout: TokenLayout,
}

/// Raw model output laid out `[batch_size, seq_len, hidden]`, row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutput {
    pub values: Vec<f32>,
    pub batch_size: usize,
    pub seq_len: usize,
    pub hidden: usize,
}

impl PaddedBatch {
    pub fn new(tokenized: &[Vec<u32>], layout: TokenLayout) -> Self {
        let lengths = tokenized.iter().map(Vec::len).collect::<Vec<_>>();
        let max_len = lengths.iter().copied().max().unwrap_or(0);
        let seq_len = max_len + layout.specials();
        let batch_size = tokenized.len();

        let mut input_ids = vec![i64::from(PAD_TOKEN); batch_size * seq_len];
        let mut attention_mask = vec![0i64; batch_size * seq_len];
        for (row, tokens) in tokenized.iter().enumerate() {
            let base = row * seq_len;
            let wrapped = std::iter::repeat_n(START_TOKEN, layout.prefix)
                .chain(tokens.iter().copied())
                .chain(std::iter::repeat_n(END_TOKEN, layout.suffix));
            for (col, token) in wrapped.enumerate() {
                input_ids[base + col] = i64::from(token);
                attention_mask[base + col] = 1;
            }
        }

        Self {
            input_ids,
            attention_mask,
            batch_size,
            seq_len,
            lengths,
            layout,
        }
    }

    pub fn row_ids(&self, row: usize) -> &[i64] {
        &self.input_ids[row * self.seq_len..(row + 1) * self.seq_len]
    }

    pub fn row_mask(&self, row: usize) -> &[i64] {
        &self.attention_mask[row * self.seq_len..(row + 1) * self.seq_len]
    }

    pub fn max_residues(&self) -> usize {
        self.lengths.iter().copied().max().unwrap_or(0)
    }

    /// Slices rows `prefix..prefix + len` of every sequence using the
    /// recorded lengths; pad ids are never scanned for.
    pub fn unpad(&self, output: &BatchOutput, dim: usize) -> Result<Vec<EmbeddingMatrix>> {
        if output.batch_size != self.batch_size || output.seq_len != self.seq_len {
            return Err(EmbedError::computation(format!(
                "model output shape {}x{} does not match padded batch {}x{}",
                output.batch_size, output.seq_len, self.batch_size, self.seq_len
            )));
        }
        if output.hidden != dim {
            return Err(EmbedError::computation(format!(
                "model produced hidden size {}, expected {dim}",
                output.hidden
            )));
        }
        if output.values.len() < self.batch_size * self.seq_len * dim {
            return Err(EmbedError::computation(
                "model output tensor too small for its declared shape",
            ));
        }

        self.lengths
            .iter()
            .enumerate()
            .map(|(row, &len)| {
                let start = (row * self.seq_len + self.layout.prefix) * dim;
                let end = start + len * dim;
                EmbeddingMatrix::new(len, dim, output.values[start..end].to_vec())
            })
            .collect()
    }
}
