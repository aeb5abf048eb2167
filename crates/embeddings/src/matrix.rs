use serde::{Deserialize, Serialize};

use crate::error::{EmbedError, Result};

/// Per-residue embedding: `rows × dim` values stored row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingMatrix {
    rows: usize,
    dim: usize,
    values: Vec<f32>,
}

/// Per-protein embedding of length `embedding_dimension`.
pub type ProteinVector = Vec<f32>;

impl EmbeddingMatrix {
    pub fn new(rows: usize, dim: usize, values: Vec<f32>) -> Result<Self> {
        if values.len() != rows * dim {
            return Err(EmbedError::computation(format!(
                "matrix of shape {rows}x{dim} needs {} values, got {}",
                rows * dim,
                values.len()
            )));
        }
        Ok(Self { rows, dim, values })
    }

    pub fn zeros(rows: usize, dim: usize) -> Self {
        Self {
            rows,
            dim,
            values: vec![0.0; rows * dim],
        }
    }

    pub const fn rows(&self) -> usize {
        self.rows
    }

    pub const fn dim(&self) -> usize {
        self.dim
    }

    pub const fn shape(&self) -> (usize, usize) {
        (self.rows, self.dim)
    }

    pub fn row(&self, index: usize) -> &[f32] {
        &self.values[index * self.dim..(index + 1) * self.dim]
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[f32]> {
        // chunks_exact panics on a zero chunk size
        self.values.chunks_exact(self.dim.max(1)).take(self.rows)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    pub fn into_values(self) -> Vec<f32> {
        self.values
    }
}
