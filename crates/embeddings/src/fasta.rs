use std::path::Path;

use crate::error::{EmbedError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FastaRecord {
    pub id: String,
    pub description: String,
    pub sequence: String,
}

pub fn read_fasta(path: &Path) -> Result<Vec<FastaRecord>> {
    let raw = std::fs::read_to_string(path).map_err(|err| match err.kind() {
        std::io::ErrorKind::NotFound => EmbedError::MissingResource {
            path: path.to_path_buf(),
        },
        _ => EmbedError::Io(err),
    })?;
    parse_fasta(&raw).map_err(|reason| EmbedError::MalformedResource {
        path: path.to_path_buf(),
        reason,
    })
}

/// Sequence lines are concatenated, stripped of whitespace and upper-cased.
pub fn parse_fasta(raw: &str) -> std::result::Result<Vec<FastaRecord>, String> {
    let mut records = Vec::new();
    for (line_no, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(';') {
            continue;
        }
        if let Some(header) = line.strip_prefix('>') {
            let header = header.trim();
            let id = header.split_whitespace().next().unwrap_or_default();
            records.push(FastaRecord {
                id: id.to_string(),
                description: header.to_string(),
                sequence: String::new(),
            });
            continue;
        }
        let Some(record) = records.last_mut() else {
            return Err(format!("line {}: sequence data before first header", line_no + 1));
        };
        record.sequence.extend(
            line.chars()
                .filter(|c| !c.is_whitespace())
                .map(|c| c.to_ascii_uppercase()),
        );
    }
    Ok(records)
}
