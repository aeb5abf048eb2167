//! Stored reference embeddings keyed by named test case, and the tolerance
//! checks used to compare fresh output against them.

use std::{collections::BTreeMap, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    error::{EmbedError, Result},
    matrix::EmbeddingMatrix,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerance {
    pub rtol: f32,
    pub atol: f32,
}

impl Tolerance {
    /// Single-sequence output against stored references.
    pub const SINGLE_SEQUENCE: Self = Self {
        rtol: 1.0e-3,
        atol: 1.0e-5,
    };
    /// Batched against unbatched output of the same sequences.
    pub const BATCHED_REGRESSION: Self = Self {
        rtol: 1.0e-4,
        atol: 1.0e-5,
    };
    pub const NUMPY_DEFAULT: Self = Self {
        rtol: 1.0e-5,
        atol: 1.0e-8,
    };
}

/// Elementwise `|a - b| <= atol + rtol * |b|`; differing lengths never match.
pub fn allclose(a: &[f32], b: &[f32], tolerance: Tolerance) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b)
            .all(|(x, y)| (x - y).abs() <= tolerance.rtol.mul_add(y.abs(), tolerance.atol))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReferenceEntry {
    PerResidue(EmbeddingMatrix),
    PerProtein(Vec<f32>),
}

impl ReferenceEntry {
    pub fn values(&self) -> &[f32] {
        match self {
            Self::PerResidue(matrix) => matrix.as_slice(),
            Self::PerProtein(vector) => vector,
        }
    }

    pub fn matches(&self, actual: &[f32], tolerance: Tolerance) -> bool {
        allclose(actual, self.values(), tolerance)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReferenceArchive {
    pub embedder: String,
    pub cases: BTreeMap<String, ReferenceEntry>,
}

impl ReferenceArchive {
    pub fn new(embedder: impl Into<String>) -> Self {
        Self {
            embedder: embedder.into(),
            cases: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, case: impl Into<String>, entry: ReferenceEntry) {
        self.cases.insert(case.into(), entry);
    }

    pub fn get(&self, case: &str) -> Option<&ReferenceEntry> {
        self.cases.get(case)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|err| match err.kind() {
            std::io::ErrorKind::NotFound => EmbedError::MissingResource {
                path: path.to_path_buf(),
            },
            _ => EmbedError::Io(err),
        })?;
        serde_json::from_str(&raw).map_err(|err| EmbedError::MalformedResource {
            path: path.to_path_buf(),
            reason: err.to_string(),
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let raw = serde_json::to_string(self)
            .map_err(|err| EmbedError::computation(format!("archive serialization: {err}")))?;
        std::fs::write(path, raw)?;
        Ok(())
    }
}
