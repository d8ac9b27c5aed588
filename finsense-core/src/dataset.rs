//! Supervised dataset assembly.
//!
//! Joins the feature table with a one-step-ahead label per symbol:
//! `next_1d_log_return = ln(close[t+1] / close[t])`, computed within each
//! symbol's chronologically ordered rows. Each symbol's last row has no next
//! close and drops out. Rows with any null feature (warm-up) drop out too,
//! so the training table is fully dense.

use crate::config::DataPaths;
use crate::data::provider::DataError;
use crate::data::table;
use crate::features::{self, FeatureRow};
use chrono::NaiveDate;
use log::{error, info};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Feature column names, in model input order.
pub const FEATURE_COLS: [&str; 5] = ["ret_1d", "ret_3d", "ret_5d", "vol_20d", "vol_zscore"];

/// One dense training row: every feature present, label present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetRow {
    pub symbol: String,
    pub timestamp: NaiveDate,
    pub ret_1d: f64,
    pub ret_3d: f64,
    pub ret_5d: f64,
    pub vol_20d: f64,
    pub vol_zscore: f64,
    pub next_1d_log_return: f64,
}

impl DatasetRow {
    /// Feature values in [`FEATURE_COLS`] order.
    pub fn feature_vector(&self) -> [f64; 5] {
        [
            self.ret_1d,
            self.ret_3d,
            self.ret_5d,
            self.vol_20d,
            self.vol_zscore,
        ]
    }
}

#[derive(Debug, Clone)]
pub struct DatasetSummary {
    pub feature_rows: usize,
    pub candidate_label_rows: usize,
    pub kept_rows: usize,
    pub written: bool,
}

/// Pair each feature row with its forward label where one exists.
///
/// Input must be grouped by symbol and ordered by timestamp within each
/// group, as the feature stage writes it.
pub fn label_rows(features: &[FeatureRow]) -> Vec<(FeatureRow, f64)> {
    let mut out = Vec::with_capacity(features.len());
    for pair in features.windows(2) {
        let (cur, next) = (&pair[0], &pair[1]);
        if cur.symbol == next.symbol {
            out.push((cur.clone(), (next.close / cur.close).ln()));
        }
    }
    out
}

/// Assemble the training table and write
/// `processed/train_market_only.parquet` plus a CSV twin.
pub fn assemble_dataset(paths: &DataPaths) -> Result<DatasetSummary, DataError> {
    let feature_rows = features::load_features(paths)?;
    let labeled = label_rows(&feature_rows);
    let candidate_label_rows = labeled.len();

    let kept: Vec<DatasetRow> = labeled
        .into_iter()
        .filter_map(|(row, label)| {
            Some(DatasetRow {
                symbol: row.symbol,
                timestamp: row.timestamp,
                ret_1d: row.ret_1d?,
                ret_3d: row.ret_3d?,
                ret_5d: row.ret_5d?,
                vol_20d: row.vol_20d?,
                vol_zscore: row.vol_zscore?,
                next_1d_log_return: label,
            })
        })
        .collect();

    if kept.is_empty() {
        error!("no dense training rows after label join; nothing written");
        return Ok(DatasetSummary {
            feature_rows: feature_rows.len(),
            candidate_label_rows,
            kept_rows: 0,
            written: false,
        });
    }

    write_dataset(paths, &kept)?;
    let summary = DatasetSummary {
        feature_rows: feature_rows.len(),
        candidate_label_rows,
        kept_rows: kept.len(),
        written: true,
    };
    info!(
        "dataset assembled: {} feature rows -> {} labeled -> {} kept -> {}",
        summary.feature_rows,
        summary.candidate_label_rows,
        summary.kept_rows,
        paths.training_parquet().display()
    );
    Ok(summary)
}

fn write_dataset(paths: &DataPaths, rows: &[DatasetRow]) -> Result<(), DataError> {
    if let Some(parent) = paths.training_parquet().parent() {
        std::fs::create_dir_all(parent)?;
    }

    let symbols: Vec<&str> = rows.iter().map(|r| r.symbol.as_str()).collect();
    let timestamps: Vec<_> = rows.iter().map(|r| r.timestamp).collect();

    let df = DataFrame::new(vec![
        Column::new("symbol".into(), symbols),
        table::date_column("timestamp", &timestamps)?,
        Column::new("ret_1d".into(), rows.iter().map(|r| r.ret_1d).collect::<Vec<_>>()),
        Column::new("ret_3d".into(), rows.iter().map(|r| r.ret_3d).collect::<Vec<_>>()),
        Column::new("ret_5d".into(), rows.iter().map(|r| r.ret_5d).collect::<Vec<_>>()),
        Column::new("vol_20d".into(), rows.iter().map(|r| r.vol_20d).collect::<Vec<_>>()),
        Column::new(
            "vol_zscore".into(),
            rows.iter().map(|r| r.vol_zscore).collect::<Vec<_>>(),
        ),
        Column::new(
            "next_1d_log_return".into(),
            rows.iter().map(|r| r.next_1d_log_return).collect::<Vec<_>>(),
        ),
    ])
    .map_err(|e| DataError::ParquetError(format!("build frame: {e}")))?;
    table::write_parquet_atomic(&df, &paths.training_parquet())?;

    let mut writer = csv::Writer::from_path(paths.training_csv())
        .map_err(|e| DataError::CsvError(e.to_string()))?;
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| DataError::CsvError(e.to_string()))?;
    }
    writer
        .flush()
        .map_err(|e| DataError::CsvError(e.to_string()))?;
    Ok(())
}

/// Read the training table back, ordered as written.
pub fn load_dataset(paths: &DataPaths) -> Result<Vec<DatasetRow>, DataError> {
    let df = table::read_parquet(&paths.training_parquet())?;

    let symbols = table::str_values(&df, "symbol")?;
    let timestamps = table::date_values(&df, "timestamp")?;
    let ret_1d = table::f64_values(&df, "ret_1d")?;
    let ret_3d = table::f64_values(&df, "ret_3d")?;
    let ret_5d = table::f64_values(&df, "ret_5d")?;
    let vol_20d = table::f64_values(&df, "vol_20d")?;
    let vol_zscore = table::f64_values(&df, "vol_zscore")?;
    let labels = table::f64_values(&df, "next_1d_log_return")?;

    let mut rows = Vec::with_capacity(symbols.len());
    for i in 0..symbols.len() {
        rows.push(DatasetRow {
            symbol: symbols[i].clone(),
            timestamp: timestamps[i],
            ret_1d: ret_1d[i],
            ret_3d: ret_3d[i],
            ret_5d: ret_5d[i],
            vol_20d: vol_20d[i],
            vol_zscore: vol_zscore[i],
            next_1d_log_return: labels[i],
        });
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::features_for_symbol;
    use crate::schema::sample_row;
    use crate::schema::MarketRow;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(day as i64)
    }

    fn symbol_bars(symbol: &str, n: usize, base: f64) -> Vec<MarketRow> {
        (0..n)
            .map(|i| {
                sample_row(
                    symbol,
                    date(i as u32),
                    base + (i as f64) + (i % 3) as f64 * 0.5,
                    1_000 + (i as u64 % 7) * 250,
                )
            })
            .collect()
    }

    #[test]
    fn label_is_forward_log_return() {
        let features = features_for_symbol(&symbol_bars("SPY", 3, 100.0));
        let labeled = label_rows(&features);
        assert_eq!(labeled.len(), 2);
        let expected = (features[1].close / features[0].close).ln();
        assert!((labeled[0].1 - expected).abs() < 1e-12);
    }

    #[test]
    fn label_never_crosses_symbols() {
        let mut features = features_for_symbol(&symbol_bars("AAPL", 3, 180.0));
        features.extend(features_for_symbol(&symbol_bars("MSFT", 3, 400.0)));
        let labeled = label_rows(&features);
        // Two per symbol; the AAPL->MSFT boundary pair is excluded.
        assert_eq!(labeled.len(), 4);
        assert!(labeled.iter().all(|(row, _)| row.timestamp != date(2)));
    }

    #[test]
    fn assemble_drops_warmup_and_final_rows() {
        let dir = tempfile::tempdir().unwrap();
        let paths = crate::config::DataPaths::new(dir.path());
        paths.ensure_dirs().unwrap();

        crate::data::consolidate::write_consolidated(&paths, &symbol_bars("SPY", 30, 100.0))
            .unwrap();
        features::derive_features(&paths).unwrap();

        let summary = assemble_dataset(&paths).unwrap();
        assert!(summary.written);
        assert_eq!(summary.feature_rows, 30);
        assert_eq!(summary.candidate_label_rows, 29);
        // Dense rows need vol_20d (from row 9) and a next close (through
        // row 28): indices 9..=28.
        assert_eq!(summary.kept_rows, 20);

        let rows = load_dataset(&paths).unwrap();
        assert_eq!(rows.len(), 20);
        assert_eq!(rows.first().unwrap().timestamp, date(9));
        assert_eq!(rows.last().unwrap().timestamp, date(28));
        assert!(paths.training_csv().exists());
    }

    #[test]
    fn short_history_keeps_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let paths = crate::config::DataPaths::new(dir.path());
        paths.ensure_dirs().unwrap();

        crate::data::consolidate::write_consolidated(&paths, &symbol_bars("SPY", 5, 100.0))
            .unwrap();
        features::derive_features(&paths).unwrap();

        let summary = assemble_dataset(&paths).unwrap();
        assert!(!summary.written);
        assert_eq!(summary.candidate_label_rows, 4);
        assert_eq!(summary.kept_rows, 0);
        assert!(!paths.training_parquet().exists());
    }
}
