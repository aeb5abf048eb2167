//! Memory-bounded grouping of variable-length sequences.
//!
//! The cost of a batch is `sequences × longest sequence`, i.e. the number of
//! positions the padded batch occupies. Batches are built in input order; a
//! sequence whose own length exceeds the budget still gets a batch of its own.

use crate::error::{EmbedError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Batch {
    pub indices: Vec<usize>,
    pub max_len: usize,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn cost(&self) -> usize {
        self.indices.len() * self.max_len
    }

    fn cost_with(&self, len: usize) -> usize {
        (self.indices.len() + 1) * self.max_len.max(len)
    }

    fn push(&mut self, index: usize, len: usize) {
        self.indices.push(index);
        self.max_len = self.max_len.max(len);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceBatchBuilder {
    budget: Option<usize>,
}

impl SequenceBatchBuilder {
    /// `None` puts every sequence into a single batch.
    pub fn new(batch_size: Option<usize>) -> Result<Self> {
        match batch_size {
            Some(0) => Err(EmbedError::InvalidBatchSize(0)),
            budget => Ok(Self { budget }),
        }
    }

    pub const fn budget(&self) -> Option<usize> {
        self.budget
    }

    pub fn plan(&self, lengths: &[usize]) -> Vec<Batch> {
        let mut batches = Vec::new();
        let mut current = Batch::default();
        for (index, &len) in lengths.iter().enumerate() {
            let overflows = self
                .budget
                .is_some_and(|budget| current.cost_with(len) > budget);
            if overflows && !current.is_empty() {
                batches.push(std::mem::take(&mut current));
            }
            current.push(index, len);
        }
        if !current.is_empty() {
            batches.push(current);
        }
        batches
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::SequenceBatchBuilder;

    #[test]
    fn zero_batch_size_is_rejected() {
        assert!(SequenceBatchBuilder::new(Some(0)).is_err());
    }

    #[test]
    fn unbounded_builder_makes_one_batch() {
        let builder = SequenceBatchBuilder::new(None).expect("builder");
        let batches = builder.plan(&[7, 8, 9]);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].indices, vec![0, 1, 2]);
        assert_eq!(batches[0].max_len, 9);
        assert!(builder.plan(&[]).is_empty());
    }

    #[test]
    fn closes_batch_when_padded_cost_would_exceed_budget() {
        let builder = SequenceBatchBuilder::new(Some(20)).expect("builder");
        // 2 x 8 = 16 fits, 3 x 9 = 27 does not
        let batches = builder.plan(&[7, 8, 9, 2]);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].indices, vec![0, 1]);
        assert_eq!(batches[1].indices, vec![2, 3]);
        assert_eq!(batches[1].cost(), 18);
    }

    #[test]
    fn oversized_sequence_gets_its_own_batch() {
        let builder = SequenceBatchBuilder::new(Some(10)).expect("builder");
        let batches = builder.plan(&[3, 50, 3]);
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[1].indices, vec![1]);
        assert_eq!(batches[1].max_len, 50);
    }

    proptest! {
        #[test]
        fn plan_covers_every_index_once_in_order(
            lengths in proptest::collection::vec(0usize..300, 0..60),
            budget in 1usize..2000,
        ) {
            let builder = SequenceBatchBuilder::new(Some(budget)).expect("builder");
            let batches = builder.plan(&lengths);
            let flattened = batches.iter().flat_map(|b| b.indices.iter().copied()).collect::<Vec<_>>();
            prop_assert_eq!(flattened, (0..lengths.len()).collect::<Vec<_>>());
            for batch in &batches {
                prop_assert!(!batch.is_empty());
                prop_assert!(batch.len() == 1 || batch.cost() <= budget);
                let longest = batch.indices.iter().map(|i| lengths[*i]).max().unwrap_or(0);
                prop_assert_eq!(batch.max_len, longest);
            }
        }
    }
}
