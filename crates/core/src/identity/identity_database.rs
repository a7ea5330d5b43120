use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use crate::identity::identity_record::{IdentityRecord, FIELD_DELIMITER};
use crate::shared::math::{cosine_similarity, l2_norm, l2_normalize};

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to read identity database {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed identity database {} at line {line}: {reason}", path.display())]
    Malformed {
        path: PathBuf,
        line: usize,
        reason: String,
    },
}

#[derive(Error, Debug, PartialEq)]
pub enum QueryError {
    #[error("feature vector has {actual} dimensions, database expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Best-matching record for a query and its cosine similarity.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryHit {
    pub record: Arc<IdentityRecord>,
    pub confidence: f64,
}

/// In-memory table of registered identities.
///
/// Loaded once and never mutated afterwards, so it can be shared across
/// threads behind an `Arc` without locking.
#[derive(Debug, Default)]
pub struct IdentityDatabase {
    records: Vec<Arc<IdentityRecord>>,
    dimension: usize,
}

impl IdentityDatabase {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds a database from records that all share one feature dimension.
    pub fn from_records(records: Vec<IdentityRecord>) -> Result<Self, QueryError> {
        let dimension = records.first().map_or(0, |r| r.features().len());
        if let Some(bad) = records.iter().find(|r| r.features().len() != dimension) {
            return Err(QueryError::DimensionMismatch {
                expected: dimension,
                actual: bad.features().len(),
            });
        }
        Ok(Self {
            records: records.into_iter().map(Arc::new).collect(),
            dimension,
        })
    }

    /// Reads the identity table at `path`.
    ///
    /// One record per line: `label[,aux...],features` where the last column
    /// holds whitespace-separated floats. Blank lines and `#` comments are
    /// skipped. Any malformed row fails the whole load.
    pub fn load(path: &Path) -> Result<Self, LoadError> {
        let text = fs::read_to_string(path).map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let malformed = |line: usize, reason: String| LoadError::Malformed {
            path: path.to_path_buf(),
            line,
            reason,
        };

        let mut records = Vec::new();
        let mut dimension = 0;
        for (idx, raw) in text.lines().enumerate() {
            let line_no = idx + 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let record = parse_row(line).map_err(|reason| malformed(line_no, reason))?;
            let dim = record.features().len();
            if records.is_empty() {
                dimension = dim;
            } else if dim != dimension {
                return Err(malformed(
                    line_no,
                    format!("expected {dimension} feature values, found {dim}"),
                ));
            }
            records.push(Arc::new(record));
        }

        log::info!(
            "Loaded {} identities ({dimension}-d features) from {}",
            records.len(),
            path.display()
        );
        Ok(Self { records, dimension })
    }

    /// Like [`load`](Self::load), but reports a failure once and falls back
    /// to an empty database so every face classifies as unknown.
    pub fn load_or_empty(path: &Path) -> Self {
        Self::load(path).unwrap_or_else(|e| {
            log::warn!("{e}; continuing with an empty identity database");
            Self::empty()
        })
    }

    /// Appends `record` as a new row, creating the file if needed.
    pub fn append_record(path: &Path, record: &IdentityRecord) -> std::io::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let needs_newline = fs::read(path)
            .map(|bytes| !bytes.is_empty() && !bytes.ends_with(b"\n"))
            .unwrap_or(false);

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)?;
        if needs_newline {
            writeln!(file)?;
        }
        writeln!(file, "{}", record.to_row())
    }

    /// Finds the record most similar to `features`.
    ///
    /// Ties go to the record that appears first in the table. An empty
    /// database never matches.
    pub fn query(&self, features: &[f32]) -> Result<Option<QueryHit>, QueryError> {
        if self.records.is_empty() {
            return Ok(None);
        }
        if features.len() != self.dimension {
            return Err(QueryError::DimensionMismatch {
                expected: self.dimension,
                actual: features.len(),
            });
        }

        let mut query = features.to_vec();
        l2_normalize(&mut query);

        let mut best: Option<(usize, f64)> = None;
        for (i, record) in self.records.iter().enumerate() {
            let similarity = cosine_similarity(&query, record.features());
            if best.map_or(true, |(_, s)| similarity > s) {
                best = Some((i, similarity));
            }
        }

        Ok(best.map(|(i, confidence)| QueryHit {
            record: Arc::clone(&self.records[i]),
            confidence,
        }))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn records(&self) -> &[Arc<IdentityRecord>] {
        &self.records
    }
}

fn parse_row(line: &str) -> Result<IdentityRecord, String> {
    let columns: Vec<&str> = line.split(FIELD_DELIMITER).map(str::trim).collect();
    if columns.len() < 2 {
        return Err("expected at least a label and a feature column".to_string());
    }

    let label = columns[0];
    if label.is_empty() {
        return Err("empty label".to_string());
    }

    let feature_column = columns[columns.len() - 1];
    let features = feature_column
        .split_whitespace()
        .map(|v| {
            v.parse::<f32>()
                .ok()
                .filter(|f| f.is_finite())
                .ok_or_else(|| format!("invalid feature value '{v}'"))
        })
        .collect::<Result<Vec<f32>, String>>()?;
    if features.is_empty() {
        return Err("no feature values".to_string());
    }
    if l2_norm(&features) == 0.0 {
        return Err("feature vector is all zeros".to_string());
    }

    let aux = columns[1..columns.len() - 1]
        .iter()
        .map(|s| s.to_string())
        .collect();
    Ok(IdentityRecord::new(label, aux, features))
}
