use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use common::config::EmbedderSettings;
use embeddings::{
    BackendKind, Device, Embedder, EmbedderConfig, EmbedderInterface, EmbedderKind,
    HttpModelFetcher, fasta::read_fasta,
};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "protembed")]
#[command(about = "Embed protein sequences with pretrained language models")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Embed every record of a FASTA file and write JSON.
    Embed(EmbedArgs),
    /// List the available embedders and their dimensions.
    List,
}

#[derive(Debug, Args)]
struct EmbedArgs {
    #[arg(long)]
    fasta: PathBuf,
    #[arg(long, default_value = "seqvec")]
    embedder: EmbedderKind,
    /// Upper bound on `sequences × longest sequence` per forward pass.
    #[arg(long)]
    batch_size: Option<usize>,
    /// Reduce each per-residue matrix to a single vector.
    #[arg(long)]
    per_protein: bool,
    /// Use the deterministic synthetic backend instead of ONNX weights.
    #[arg(long)]
    synthetic: bool,
    #[arg(long)]
    weights_file: Option<PathBuf>,
    #[arg(long)]
    options_file: Option<PathBuf>,
    #[arg(long, conflicts_with_all = ["weights_file", "options_file"])]
    model_directory: Option<PathBuf>,
    #[arg(long, default_value = "cpu")]
    device: Device,
    #[arg(long)]
    download_base_url: Option<String>,
    #[arg(long)]
    cache_dir: Option<PathBuf>,
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
struct EmbeddedRecord {
    id: String,
    length: usize,
    embedding: Embedding,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Embedding {
    PerResidue(Vec<Vec<f32>>),
    PerProtein(Vec<f32>),
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Embed(args) => embed(&args),
        Commands::List => {
            list();
            Ok(())
        }
    }
}

fn list() {
    for kind in EmbedderKind::ALL {
        println!("{}\t{}", kind.name(), kind.embedding_dimension());
    }
}

fn embed(args: &EmbedArgs) -> anyhow::Result<()> {
    let records = read_fasta(&args.fasta)
        .with_context(|| format!("failed reading {}", args.fasta.display()))?;
    let embedder = load_embedder(args)?;
    info!(
        embedder = embedder.name(),
        records = records.len(),
        batch_size = ?args.batch_size,
        "embedding fasta"
    );

    let sequences = records
        .iter()
        .map(|record| record.sequence.as_str())
        .collect::<Vec<_>>();
    let matrices = embedder
        .embed_many(&sequences, args.batch_size)
        .with_context(|| format!("{} cannot embed this input", embedder.name()))?;

    let mut output = Vec::with_capacity(records.len());
    for (record, matrix) in records.iter().zip(matrices) {
        let matrix = matrix.with_context(|| format!("failed embedding record {}", record.id))?;
        let embedding = if args.per_protein {
            Embedding::PerProtein(embedder.reduce_per_protein(&matrix))
        } else {
            Embedding::PerResidue(matrix.iter_rows().map(<[f32]>::to_vec).collect())
        };
        output.push(EmbeddedRecord {
            id: record.id.clone(),
            length: matrix.rows(),
            embedding,
        });
    }

    let json = serde_json::to_string_pretty(&output)?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, json)
                .with_context(|| format!("failed writing {}", path.display()))?;
            println!("wrote {} embeddings to {}", output.len(), path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn load_embedder(args: &EmbedArgs) -> anyhow::Result<Embedder> {
    let has_files =
        args.weights_file.is_some() || args.options_file.is_some() || args.model_directory.is_some();
    if args.synthetic && !has_files {
        return Ok(Embedder::synthetic(args.embedder, Some(args.device)));
    }

    let defaults = EmbedderSettings::default();
    let fetcher = HttpModelFetcher::new(
        args.download_base_url
            .clone()
            .unwrap_or(defaults.download_base_url),
        args.cache_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(defaults.cache_dir)),
    )?;
    let config = EmbedderConfig {
        weights_file: args.weights_file.clone(),
        options_file: args.options_file.clone(),
        model_directory: args.model_directory.clone(),
        device: Some(args.device),
        backend: if args.synthetic {
            BackendKind::Synthetic
        } else {
            BackendKind::Onnx
        },
        warmup_rounds: 0,
    };
    Embedder::new(args.embedder, config, &fetcher)
        .with_context(|| format!("failed loading embedder {}", args.embedder))
}
