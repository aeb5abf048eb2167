use crate::matrix::{EmbeddingMatrix, ProteinVector};

/// Mean over the residue axis. An empty matrix reduces to `dim` zeros.
pub fn mean_pool(matrix: &EmbeddingMatrix, dim: usize) -> ProteinVector {
    if matrix.rows() == 0 {
        return vec![0.0f32; dim];
    }
    debug_assert_eq!(matrix.dim(), dim, "matrix width must match the embedder");
    let mut pooled = vec![0.0f32; matrix.dim()];
    for row in matrix.iter_rows() {
        for (acc, value) in pooled.iter_mut().zip(row) {
            *acc += value;
        }
    }
    let denom = matrix.rows() as f32;
    for value in &mut pooled {
        *value /= denom;
    }
    pooled
}
