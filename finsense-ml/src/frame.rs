//! The in-memory training frame.
//!
//! Rows come from the assembled training table, re-sorted into one global
//! chronological order (timestamp, then symbol) so a prefix/suffix split is
//! a clean time split across all symbols. The frame is content-hashed;
//! the hash is stored in the split artifact and re-checked by any stage
//! that applies the split later.

use finsense_core::config::DataPaths;
use finsense_core::data::provider::DataError;
use finsense_core::dataset::{self, DatasetRow, FEATURE_COLS};

/// Number of model input features.
pub const NUM_FEATURES: usize = FEATURE_COLS.len();

#[derive(Debug, Clone)]
pub struct TrainingFrame {
    rows: Vec<DatasetRow>,
}

impl TrainingFrame {
    /// Load the training table and sort it chronologically.
    pub fn load(paths: &DataPaths) -> Result<Self, DataError> {
        Ok(Self::from_rows(dataset::load_dataset(paths)?))
    }

    pub fn from_rows(mut rows: Vec<DatasetRow>) -> Self {
        rows.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.symbol.cmp(&b.symbol)));
        Self { rows }
    }

    pub fn rows(&self) -> &[DatasetRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn features(&self) -> Vec<[f64; NUM_FEATURES]> {
        self.rows.iter().map(|r| r.feature_vector()).collect()
    }

    pub fn labels(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.next_1d_log_return).collect()
    }

    pub fn timestamps(&self) -> Vec<chrono::NaiveDate> {
        self.rows.iter().map(|r| r.timestamp).collect()
    }

    /// Blake3 hash over the frame's canonical byte encoding.
    ///
    /// Covers every key, feature, and label bit-exactly, so any change to
    /// the dataset changes the hash.
    pub fn content_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for row in &self.rows {
            hasher.update(row.symbol.as_bytes());
            hasher.update(&[0]);
            hasher.update(
                &i32::try_from(
                    row.timestamp
                        .signed_duration_since(chrono::NaiveDate::from_ymd_opt(1970, 1, 1).unwrap())
                        .num_days(),
                )
                .unwrap_or(i32::MAX)
                .to_le_bytes(),
            );
            for v in row.feature_vector() {
                hasher.update(&v.to_bits().to_le_bytes());
            }
            hasher.update(&row.next_1d_log_return.to_bits().to_le_bytes());
        }
        hasher.finalize().to_hex().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row(symbol: &str, day: u32, label: f64) -> DatasetRow {
        DatasetRow {
            symbol: symbol.into(),
            timestamp: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            ret_1d: 0.01,
            ret_3d: 0.02,
            ret_5d: 0.03,
            vol_20d: 0.005,
            vol_zscore: 0.5,
            next_1d_log_return: label,
        }
    }

    #[test]
    fn rows_are_sorted_by_timestamp_then_symbol() {
        let frame = TrainingFrame::from_rows(vec![
            row("MSFT", 3, 0.1),
            row("AAPL", 3, 0.2),
            row("AAPL", 2, 0.3),
        ]);
        let keys: Vec<_> = frame
            .rows()
            .iter()
            .map(|r| (r.timestamp, r.symbol.clone()))
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }

    #[test]
    fn hash_is_order_independent_after_sorting() {
        let a = TrainingFrame::from_rows(vec![row("AAPL", 2, 0.1), row("MSFT", 2, 0.2)]);
        let b = TrainingFrame::from_rows(vec![row("MSFT", 2, 0.2), row("AAPL", 2, 0.1)]);
        assert_eq!(a.content_hash(), b.content_hash());
    }

    #[test]
    fn hash_changes_with_any_value() {
        let a = TrainingFrame::from_rows(vec![row("AAPL", 2, 0.1)]);
        let b = TrainingFrame::from_rows(vec![row("AAPL", 2, 0.1000001)]);
        assert_ne!(a.content_hash(), b.content_hash());
    }
}
