//! The capability set every embedder variant exposes.
//!
//! Implementors only provide identity, their token layout and the raw forward
//! pass; tokenization, padding, unpadding, batching and reduction are shared.

use std::collections::VecDeque;

use crate::{
    alphabet,
    batch::{Batch, SequenceBatchBuilder},
    config::Device,
    error::{EmbedError, Result},
    matrix::{EmbeddingMatrix, ProteinVector},
    padding::{BatchOutput, PaddedBatch, TokenLayout},
    reduce,
};

pub trait EmbedderInterface: Send + Sync {
    fn name(&self) -> &str;

    fn embedding_dimension(&self) -> usize;

    fn device(&self) -> Device;

    fn token_layout(&self) -> TokenLayout {
        TokenLayout::NONE
    }

    /// Runs the model on an already padded batch.
    fn forward(&self, batch: &PaddedBatch) -> Result<BatchOutput>;

    fn embed_batch(&self, sequences: &[&str]) -> Result<Vec<EmbeddingMatrix>> {
        if sequences.is_empty() {
            return Ok(Vec::new());
        }
        let tokenized = sequences
            .iter()
            .map(|sequence| alphabet::tokenize(sequence))
            .collect::<Result<Vec<_>>>()?;
        let padded = PaddedBatch::new(&tokenized, self.token_layout());
        let output = self.forward(&padded)?;
        padded.unpad(&output, self.embedding_dimension())
    }

    fn embed(&self, sequence: &str) -> Result<EmbeddingMatrix> {
        self.embed_batch(&[sequence])?
            .pop()
            .ok_or_else(|| EmbedError::computation("model returned no embedding"))
    }

    /// Lazily embeds `sequences` in input order. `batch_size` bounds
    /// `sequences × longest sequence` per batch; `None` means a single batch.
    ///
    /// The returned iterator is single-pass: call `embed_many` again to
    /// recompute.
    fn embed_many<'a, S>(
        &'a self,
        sequences: &'a [S],
        batch_size: Option<usize>,
    ) -> Result<EmbedMany<'a, Self, S>>
    where
        Self: Sized,
        S: AsRef<str>,
    {
        self.embed_many_unchecked(sequences, batch_size)
    }

    /// The shared batching path, without any variant-specific guard.
    fn embed_many_unchecked<'a, S>(
        &'a self,
        sequences: &'a [S],
        batch_size: Option<usize>,
    ) -> Result<EmbedMany<'a, Self, S>>
    where
        Self: Sized,
        S: AsRef<str>,
    {
        let builder = SequenceBatchBuilder::new(batch_size)?;
        let lengths = sequences
            .iter()
            .map(|s| s.as_ref().chars().count())
            .collect::<Vec<_>>();
        Ok(EmbedMany::new(self, sequences, builder.plan(&lengths)))
    }

    fn reduce_per_protein(&self, matrix: &EmbeddingMatrix) -> ProteinVector {
        reduce::mean_pool(matrix, self.embedding_dimension())
    }
}

/// Single-pass producer of per-sequence embeddings; a batch is computed only
/// once the previous one has been drained. Stops after the first error.
pub struct EmbedMany<'a, E: ?Sized, S> {
    embedder: &'a E,
    sequences: &'a [S],
    batches: std::vec::IntoIter<Batch>,
    ready: VecDeque<EmbeddingMatrix>,
    remaining: usize,
    failed: bool,
}

impl<'a, E, S> EmbedMany<'a, E, S>
where
    E: EmbedderInterface + ?Sized,
    S: AsRef<str>,
{
    pub fn new(embedder: &'a E, sequences: &'a [S], batches: Vec<Batch>) -> Self {
        Self {
            embedder,
            sequences,
            remaining: batches.iter().map(Batch::len).sum(),
            batches: batches.into_iter(),
            ready: VecDeque::new(),
            failed: false,
        }
    }

    /// One batch per sequence.
    pub fn one_by_one(embedder: &'a E, sequences: &'a [S]) -> Self {
        let batches = sequences
            .iter()
            .enumerate()
            .map(|(index, sequence)| Batch {
                indices: vec![index],
                max_len: sequence.as_ref().chars().count(),
            })
            .collect();
        Self::new(embedder, sequences, batches)
    }

    fn compute_next_batch(&mut self) -> Option<Result<()>> {
        let batch = self.batches.next()?;
        let inputs = batch
            .indices
            .iter()
            .map(|&index| self.sequences[index].as_ref())
            .collect::<Vec<_>>();
        match self.embedder.embed_batch(&inputs) {
            Ok(matrices) if matrices.len() == inputs.len() => {
                self.ready.extend(matrices);
                Some(Ok(()))
            }
            Ok(matrices) => Some(Err(EmbedError::computation(format!(
                "batch of {} sequences produced {} embeddings",
                inputs.len(),
                matrices.len()
            )))),
            Err(err) => Some(Err(err)),
        }
    }
}

impl<E, S> Iterator for EmbedMany<'_, E, S>
where
    E: EmbedderInterface + ?Sized,
    S: AsRef<str>,
{
    type Item = Result<EmbeddingMatrix>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        if self.ready.is_empty() {
            match self.compute_next_batch()? {
                Ok(()) => {}
                Err(err) => {
                    self.failed = true;
                    return Some(Err(err));
                }
            }
        }
        let matrix = self.ready.pop_front()?;
        self.remaining = self.remaining.saturating_sub(1);
        Some(Ok(matrix))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.failed {
            (0, Some(0))
        } else {
            (0, Some(self.remaining))
        }
    }
}

impl<E, S> std::iter::FusedIterator for EmbedMany<'_, E, S>
where
    E: EmbedderInterface + ?Sized,
    S: AsRef<str>,
{
}
