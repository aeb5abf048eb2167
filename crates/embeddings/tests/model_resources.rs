use std::{
    io::Write,
    path::{Path, PathBuf},
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};

use embeddings::{
    BackendKind, EmbedError, Embedder, EmbedderConfig, EmbedderInterface, EmbedderKind,
    ModelFetcher, ModelFiles,
};

/// Writes fixed files into a directory instead of downloading.
struct FakeFetcher {
    directory: PathBuf,
    options: &'static str,
    calls: AtomicUsize,
}

impl FakeFetcher {
    fn new(directory: &Path, options: &'static str) -> Self {
        Self {
            directory: directory.to_path_buf(),
            options,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ModelFetcher for FakeFetcher {
    fn fetch(&self, _kind: EmbedderKind) -> embeddings::Result<ModelFiles> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let files = ModelFiles::in_directory(&self.directory);
        std::fs::write(&files.weights, b"synthetic weights")?;
        std::fs::write(&files.options, self.options)?;
        Ok(files)
    }
}

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn lines(&self) -> Vec<String> {
        let raw = self.0.lock().expect("log buffer").clone();
        String::from_utf8(raw)
            .expect("utf8 logs")
            .lines()
            .map(ToOwned::to_owned)
            .collect()
    }
}

impl Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().expect("log buffer").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn synthetic_config() -> EmbedderConfig {
    EmbedderConfig {
        backend: BackendKind::Synthetic,
        ..EmbedderConfig::default()
    }
}

#[test]
fn one_of_two_files_fails_and_logs_once() {
    let dir = tempfile::tempdir().expect("tempdir");
    let fetcher = FakeFetcher::new(dir.path(), "{}");
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();

    let result = tracing::subscriber::with_default(subscriber, || {
        Embedder::new(
            EmbedderKind::SeqVec,
            EmbedderConfig {
                weights_file: Some(PathBuf::from("/none/existent/path")),
                ..synthetic_config()
            },
            &fetcher,
        )
    });

    let err = result.err().expect("partial files rejected");
    assert!(err.is_missing_resource());
    assert_eq!(fetcher.calls(), 0);
    let lines = logs.lines();
    assert_eq!(lines.len(), 1, "{lines:?}");
    assert!(lines[0].contains(
        "You should pass either all necessary files or directories, or none, while you provide 1 of 2"
    ));
}

#[test]
fn no_files_downloads_exactly_once() {
    let dir = tempfile::tempdir().expect("tempdir");
    let fetcher = FakeFetcher::new(dir.path(), r#"{"seed": 11}"#);
    let embedder =
        Embedder::new(EmbedderKind::Esm, synthetic_config(), &fetcher).expect("embedder");
    assert_eq!(fetcher.calls(), 1);
    assert_eq!(embedder.embed("PROTEIN").expect("embed").rows(), 7);
}

#[test]
fn both_files_skip_download() {
    let dir = tempfile::tempdir().expect("tempdir");
    let seeding = FakeFetcher::new(dir.path(), "{}");
    let files = seeding.fetch(EmbedderKind::SeqVec).expect("seed files");

    let fetcher = FakeFetcher::new(dir.path(), "{}");
    let embedder = Embedder::new(
        EmbedderKind::SeqVec,
        EmbedderConfig {
            weights_file: Some(files.weights.clone()),
            options_file: Some(files.options.clone()),
            warmup_rounds: 2,
            ..synthetic_config()
        },
        &fetcher,
    )
    .expect("embedder");
    assert_eq!(fetcher.calls(), 0);
    assert_eq!(embedder.runtime_name(), "synthetic");

    let from_directory = Embedder::new(
        EmbedderKind::SeqVec,
        EmbedderConfig {
            model_directory: Some(dir.path().to_path_buf()),
            ..synthetic_config()
        },
        &fetcher,
    )
    .expect("embedder from directory");
    assert_eq!(fetcher.calls(), 0);
    // same weights bytes, same seed
    assert_eq!(
        embedder.embed("SEQWENCE").expect("a"),
        from_directory.embed("SEQWENCE").expect("b")
    );
}

#[test]
fn both_paths_missing_is_missing_resource_without_download() {
    let dir = tempfile::tempdir().expect("tempdir");
    let fetcher = FakeFetcher::new(dir.path(), "{}");
    let err = Embedder::new(
        EmbedderKind::SeqVec,
        EmbedderConfig {
            weights_file: Some(PathBuf::from("/none/existent/path")),
            options_file: Some(PathBuf::from("/none/existent/path")),
            ..synthetic_config()
        },
        &fetcher,
    )
    .err()
    .expect("missing files");
    assert!(err.is_missing_resource());
    assert_eq!(fetcher.calls(), 0);
}

#[test]
fn empty_downloaded_options_is_malformed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let fetcher = FakeFetcher::new(dir.path(), "");
    let err = Embedder::new(EmbedderKind::SeqVec, synthetic_config(), &fetcher)
        .err()
        .expect("empty options");
    assert!(matches!(err, EmbedError::MalformedResource { .. }));
    assert_eq!(fetcher.calls(), 1);
}

#[test]
fn options_disagreeing_with_variant_dimension_are_malformed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let fetcher = FakeFetcher::new(dir.path(), r#"{"embedding_dimension": 768}"#);
    let err = Embedder::new(EmbedderKind::SeqVec, synthetic_config(), &fetcher)
        .err()
        .expect("wrong dimension");
    assert!(err.to_string().contains("768"));
}

#[test]
fn max_sequence_length_from_options_is_enforced() {
    let dir = tempfile::tempdir().expect("tempdir");
    let fetcher = FakeFetcher::new(dir.path(), r#"{"max_sequence_length": 8}"#);
    let embedder = Embedder::new(EmbedderKind::ProtTransBertBfd, synthetic_config(), &fetcher)
        .expect("embedder");
    assert!(embedder.embed("SEQWENCE").is_ok());
    let err = embedder.embed("VLSXXXIEP").expect_err("too long");
    assert!(matches!(err, EmbedError::Computation(_)));
}
