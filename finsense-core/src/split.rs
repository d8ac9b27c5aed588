//! Chronological train/validation split, persisted as an artifact.
//!
//! The split is computed once at training time and written to
//! `artifacts/split.json`; any later consumer (attribution, evaluation)
//! loads the same file instead of recomputing, and verifies it still
//! matches the dataset it was computed from.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// A prefix/suffix split over chronologically ordered rows.
///
/// Rows `0..split_idx` train, rows `split_idx..n_rows` validate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChronoSplit {
    pub n_rows: usize,
    pub split_idx: usize,
    /// Timestamp of the first validation row.
    pub boundary: NaiveDate,
    pub train_fraction: f64,
    /// Content hash of the dataset the split was computed from.
    pub dataset_hash: String,
}

#[derive(Debug, Error)]
pub enum SplitError {
    #[error("dataset has {n_rows} rows; need at least {min} for a {train_fraction} split")]
    TooFewRows {
        n_rows: usize,
        min: usize,
        train_fraction: f64,
    },

    #[error("split file {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("split file is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error(
        "split does not match dataset: split was computed over {split_rows} rows \
         with hash {split_hash}, dataset has {dataset_rows} rows with hash {dataset_hash}"
    )]
    Mismatch {
        split_rows: usize,
        split_hash: String,
        dataset_rows: usize,
        dataset_hash: String,
    },
}

impl ChronoSplit {
    /// Compute the split over timestamps already sorted chronologically.
    ///
    /// `split_idx = floor(train_fraction * n)`. Fails when either side of
    /// the split would be empty.
    pub fn compute(
        timestamps: &[NaiveDate],
        train_fraction: f64,
        dataset_hash: String,
    ) -> Result<Self, SplitError> {
        let n_rows = timestamps.len();
        let split_idx = (train_fraction * n_rows as f64).floor() as usize;
        if split_idx == 0 || split_idx >= n_rows {
            return Err(SplitError::TooFewRows {
                n_rows,
                min: 2,
                train_fraction,
            });
        }
        Ok(Self {
            n_rows,
            split_idx,
            boundary: timestamps[split_idx],
            train_fraction,
            dataset_hash,
        })
    }

    pub fn train_len(&self) -> usize {
        self.split_idx
    }

    pub fn validation_len(&self) -> usize {
        self.n_rows - self.split_idx
    }

    /// Check this split against the dataset it is about to be applied to.
    pub fn verify(&self, n_rows: usize, dataset_hash: &str) -> Result<(), SplitError> {
        if self.n_rows != n_rows || self.dataset_hash != dataset_hash {
            return Err(SplitError::Mismatch {
                split_rows: self.n_rows,
                split_hash: self.dataset_hash.clone(),
                dataset_rows: n_rows,
                dataset_hash: dataset_hash.to_string(),
            });
        }
        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<(), SplitError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| SplitError::Io {
            path: path.to_path_buf(),
            source: e,
        })
    }

    pub fn load(path: &Path) -> Result<Self, SplitError> {
        let content = std::fs::read_to_string(path).map_err(|e| SplitError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(serde_json::from_str(&content)?)
    }
}
