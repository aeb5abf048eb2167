use embeddings::{
    Embedder, EmbedderInterface, EmbedderKind,
    reference::{ReferenceArchive, ReferenceEntry, Tolerance, allclose},
};

const SEQUENCES: [&str; 3] = ["PROTEIN", "SEQWENCE", "VLSXXXIEP"];

fn supported_batch_sizes(kind: EmbedderKind) -> Vec<Option<usize>> {
    if kind.has_batch_drift() {
        vec![None]
    } else {
        vec![None, Some(1), Some(9), Some(100), Some(10_000)]
    }
}

#[test]
fn embed_many_returns_one_matrix_per_sequence_with_true_lengths() {
    for kind in EmbedderKind::ALL {
        let embedder = Embedder::synthetic(kind, None);
        for batch_size in supported_batch_sizes(kind) {
            let matrices = embedder
                .embed_many(&SEQUENCES, batch_size)
                .expect("plan")
                .collect::<Result<Vec<_>, _>>()
                .expect("embeddings");
            let rows = matrices.iter().map(|m| m.rows()).collect::<Vec<_>>();
            assert_eq!(rows, vec![7, 8, 9], "{kind} with batch_size {batch_size:?}");
            for matrix in &matrices {
                assert_eq!(matrix.dim(), kind.embedding_dimension());
            }
        }
    }
}

#[test]
fn reduce_per_protein_always_has_embedding_dimension() {
    for kind in EmbedderKind::ALL {
        let embedder = Embedder::synthetic(kind, None);
        let protein = embedder.embed("PROTEIN").expect("embed");
        assert_eq!(
            embedder.reduce_per_protein(&protein).len(),
            embedder.embedding_dimension()
        );
        let empty = embedder.embed("").expect("empty embeds");
        assert_eq!(empty.rows(), 0);
        let reduced = embedder.reduce_per_protein(&empty);
        assert_eq!(reduced.len(), embedder.embedding_dimension());
        assert!(reduced.iter().all(|v| *v == 0.0));
    }
}

#[test]
fn embed_many_of_nothing_is_empty() {
    let empty: Vec<String> = Vec::new();
    for kind in EmbedderKind::ALL {
        let embedder = Embedder::synthetic(kind, None);
        for batch_size in supported_batch_sizes(kind) {
            let out = embedder.embed_many(&empty, batch_size).expect("plan");
            assert_eq!(out.count(), 0, "{kind}");
        }
    }
}

#[test]
fn wildcard_run_keeps_its_length_in_a_mixed_batch() {
    let embedder = Embedder::synthetic(EmbedderKind::ProtTransBertBfd, None);
    let sequences = ["XXXXXXXXXXXX", "VLSXXXIEP", "X"];
    let rows = embedder
        .embed_many(&sequences, None)
        .expect("plan")
        .map(|m| m.expect("embedding").rows())
        .collect::<Vec<_>>();
    assert_eq!(rows, vec![12, 9, 1]);
}

#[test]
fn batched_and_unbatched_agree_for_consistent_variants() {
    for kind in EmbedderKind::ALL.into_iter().filter(|k| !k.has_batch_drift()) {
        let embedder = Embedder::synthetic(kind, None);
        let batched = embedder
            .embed_many(&SEQUENCES, Some(10_000))
            .expect("plan")
            .collect::<Result<Vec<_>, _>>()
            .expect("batched");
        for (sequence, batched) in SEQUENCES.iter().zip(&batched) {
            let single = embedder.embed(sequence).expect("single");
            assert!(
                allclose(batched.as_slice(), single.as_slice(), Tolerance::SINGLE_SEQUENCE),
                "{kind} drifted on {sequence}"
            );
        }
    }
}

#[test]
fn t5_batching_still_drifts_within_loose_tolerance() {
    let embedder = Embedder::synthetic(EmbedderKind::ProtTransT5Bfd, None);
    let unbatched = SEQUENCES
        .iter()
        .map(|s| embedder.embed(s))
        .collect::<Result<Vec<_>, _>>()
        .expect("unbatched");
    let batched = embedder
        .embed_many_unchecked(&SEQUENCES, Some(10_000))
        .expect("plan")
        .collect::<Result<Vec<_>, _>>()
        .expect("batched");

    for (a, b) in unbatched.iter().zip(&batched) {
        assert!(!allclose(a.as_slice(), b.as_slice(), Tolerance::NUMPY_DEFAULT));
        assert!(allclose(a.as_slice(), b.as_slice(), Tolerance::BATCHED_REGRESSION));
    }
}

#[test]
fn reference_archive_round_trips_through_disk() {
    let embedder = Embedder::synthetic(EmbedderKind::SeqVec, None);
    let mut archive = ReferenceArchive::new(embedder.name());
    let matrices = embedder
        .embed_many(&SEQUENCES[..2], Some(100))
        .expect("plan")
        .collect::<Result<Vec<_>, _>>()
        .expect("embeddings");
    for (idx, matrix) in matrices.into_iter().enumerate() {
        archive.insert(format!("test_case {}", idx + 1), ReferenceEntry::PerResidue(matrix));
    }

    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("seqvec.json");
    archive.save(&path).expect("save");
    let loaded = ReferenceArchive::load(&path).expect("load");

    let fresh = Embedder::synthetic(EmbedderKind::SeqVec, None);
    for (case, sequence) in [("test_case 1", "PROTEIN"), ("test_case 2", "SEQWENCE")] {
        let actual = fresh.embed(sequence).expect("embed");
        let expected = loaded.get(case).expect("case present");
        assert!(expected.matches(actual.as_slice(), Tolerance::SINGLE_SEQUENCE));
    }
}
