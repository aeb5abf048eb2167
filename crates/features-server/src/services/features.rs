use anyhow::Context;
use common::FeaturesResult;
use dispatch::SoftLimit;
use embeddings::{Embedder, EmbedderInterface, alphabet::is_valid_sequence};

/// Checks a request sequence before any job is submitted.
pub fn validate_sequence(
    sequence: Option<String>,
    max_length: usize,
) -> Result<String, String> {
    let Some(sequence) = sequence else {
        return Err("missing field `sequence`".to_string());
    };
    if sequence.is_empty() {
        return Err("sequence must not be empty".to_string());
    }
    let length = sequence.chars().count();
    if length > max_length {
        return Err(format!(
            "sequence has {length} residues, at most {max_length} are accepted"
        ));
    }
    if !is_valid_sequence(&sequence) {
        return Err("sequence contains symbols outside the amino acid alphabet".to_string());
    }
    Ok(sequence)
}

/// Body of the `features` job: embed, then reduce to one vector per protein.
pub fn compute_features(
    embedder: &Embedder,
    sequence: &str,
    soft: &SoftLimit,
) -> anyhow::Result<FeaturesResult> {
    soft.check()?;
    let matrix = embedder
        .embed(sequence)
        .with_context(|| format!("{} failed to embed sequence", embedder.name()))?;
    soft.check()?;
    Ok(FeaturesResult {
        embedder: embedder.name().to_string(),
        embedding_dimension: embedder.embedding_dimension(),
        length: matrix.rows(),
        per_protein: embedder.reduce_per_protein(&matrix),
    })
}
