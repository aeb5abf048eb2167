pub mod embedder;
pub mod features;
