//! Residue alphabet shared by every embedder variant.
//!
//! Token id `0` is reserved for padding. Canonical residues map to `1..=20`,
//! wildcard and rare residues (`X`, `B`, `Z`, `U`, `O`) to `21..=25`.

use crate::error::{EmbedError, Result};

pub const PAD_TOKEN: u32 = 0;
pub const CANONICAL_RESIDUES: &str = "ACDEFGHIKLMNPQRSTVWY";
pub const WILDCARD_RESIDUES: &str = "XBZUO";
/// Number of ids used by residues plus the pad token.
pub const VOCAB_SIZE: u32 = 26;

pub fn residue_token(residue: char) -> Option<u32> {
    CANONICAL_RESIDUES
        .chars()
        .chain(WILDCARD_RESIDUES.chars())
        .position(|c| c == residue)
        .and_then(|idx| u32::try_from(idx + 1).ok())
}

pub fn is_wildcard(residue: char) -> bool {
    WILDCARD_RESIDUES.contains(residue)
}

/// True for a non-empty sequence made only of alphabet symbols.
pub fn is_valid_sequence(sequence: &str) -> bool {
    !sequence.is_empty() && sequence.chars().all(|c| residue_token(c).is_some())
}

pub fn tokenize(sequence: &str) -> Result<Vec<u32>> {
    sequence
        .chars()
        .enumerate()
        .map(|(position, residue)| {
            residue_token(residue).ok_or_else(|| {
                EmbedError::computation(format!(
                    "unsupported residue {residue:?} at position {position}"
                ))
            })
        })
        .collect()
}
