//! Derived market features.
//!
//! Per symbol, over its chronologically ordered daily bars:
//! - `ret_1d` / `ret_3d` / `ret_5d`: trailing simple returns over k rows
//! - `vol_20d`: rolling sample std of `ret_1d` over the last 20 rows
//! - `vol_zscore`: volume standardized against its 20-row rolling mean/std
//!
//! Rolling windows count rows, not calendar days: a window is eligible once
//! at least 10 trailing rows (including the current one) exist, and its
//! statistics run over whichever values inside the window are non-null.
//! Warm-up rows stay null rather than being dropped, so the feature table
//! keeps one row per consolidated bar.

use crate::config::DataPaths;
use crate::data::provider::DataError;
use crate::data::{consolidate, table};
use crate::schema::MarketRow;
use chrono::NaiveDate;
use log::{error, info};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Rolling window length, in rows.
pub const WINDOW: usize = 20;

/// Minimum trailing rows (including the current one) before a rolling
/// statistic is produced.
pub const MIN_ROWS: usize = 10;

/// One feature row. Null features mean the warm-up window was not yet
/// eligible (or a zero-variance z-score denominator).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub symbol: String,
    pub timestamp: NaiveDate,
    pub close: f64,
    pub volume: u64,
    pub ret_1d: Option<f64>,
    pub ret_3d: Option<f64>,
    pub ret_5d: Option<f64>,
    pub vol_20d: Option<f64>,
    pub vol_zscore: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct FeaturesSummary {
    pub symbols: usize,
    pub rows: usize,
    pub written: bool,
}

/// Simple k-row trailing return: `value[i] / value[i-k] - 1`.
///
/// The first k entries are null. A zero base value yields null rather than
/// an infinity.
pub fn pct_change(values: &[f64], k: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    for i in k..values.len() {
        let base = values[i - k];
        if base != 0.0 {
            out[i] = Some(values[i] / base - 1.0);
        }
    }
    out
}

/// Rolling sample standard deviation over the trailing `window` rows.
///
/// Entry i is null until at least `min_rows` trailing rows exist; within an
/// eligible window the statistic runs over the non-null values, and needs at
/// least two of them.
pub fn rolling_std(values: &[Option<f64>], window: usize, min_rows: usize) -> Vec<Option<f64>> {
    rolling_stat(values, window, min_rows, |xs| sample_std(xs))
}

/// Rolling mean over the trailing `window` rows, with the same eligibility
/// rule as [`rolling_std`].
pub fn rolling_mean(values: &[Option<f64>], window: usize, min_rows: usize) -> Vec<Option<f64>> {
    rolling_stat(values, window, min_rows, |xs| {
        if xs.is_empty() {
            None
        } else {
            Some(xs.iter().sum::<f64>() / xs.len() as f64)
        }
    })
}

fn rolling_stat(
    values: &[Option<f64>],
    window: usize,
    min_rows: usize,
    stat: impl Fn(&[f64]) -> Option<f64>,
) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    let mut buf = Vec::with_capacity(window);
    for i in 0..values.len() {
        if i + 1 < min_rows {
            continue;
        }
        let lo = (i + 1).saturating_sub(window);
        buf.clear();
        buf.extend(values[lo..=i].iter().flatten());
        out[i] = stat(&buf);
    }
    out
}

fn sample_std(xs: &[f64]) -> Option<f64> {
    if xs.len() < 2 {
        return None;
    }
    let n = xs.len() as f64;
    let mean = xs.iter().sum::<f64>() / n;
    let var = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(var.sqrt())
}

/// Compute the feature rows for one symbol's chronologically ordered bars.
pub fn features_for_symbol(bars: &[MarketRow]) -> Vec<FeatureRow> {
    let closes: Vec<f64> = bars.iter().map(|r| r.close).collect();
    let volumes: Vec<Option<f64>> = bars.iter().map(|r| Some(r.volume as f64)).collect();

    let ret_1d = pct_change(&closes, 1);
    let ret_3d = pct_change(&closes, 3);
    let ret_5d = pct_change(&closes, 5);
    let vol_20d = rolling_std(&ret_1d, WINDOW, MIN_ROWS);

    let vol_mean = rolling_mean(&volumes, WINDOW, MIN_ROWS);
    let vol_std = rolling_std(&volumes, WINDOW, MIN_ROWS);

    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            let vol_zscore = match (vol_mean[i], vol_std[i]) {
                // A flat-volume window has no meaningful z-score.
                (Some(mean), Some(std)) if std > 0.0 => {
                    Some((bar.volume as f64 - mean) / std)
                }
                _ => None,
            };
            FeatureRow {
                symbol: bar.symbol.clone(),
                timestamp: bar.timestamp,
                close: bar.close,
                volume: bar.volume,
                ret_1d: ret_1d[i],
                ret_3d: ret_3d[i],
                ret_5d: ret_5d[i],
                vol_20d: vol_20d[i],
                vol_zscore,
            }
        })
        .collect()
}

/// Derive features from the consolidated daily table and write
/// `processed/features/market.parquet` plus a CSV twin.
pub fn derive_features(paths: &DataPaths) -> Result<FeaturesSummary, DataError> {
    let rows = consolidate::load_consolidated(paths)?;
    if rows.is_empty() {
        error!("consolidated table is empty; no features written");
        return Ok(FeaturesSummary {
            symbols: 0,
            rows: 0,
            written: false,
        });
    }

    // Consolidated rows arrive sorted by (symbol, timestamp), so each
    // symbol's bars form one contiguous, ordered run.
    let mut features: Vec<FeatureRow> = Vec::with_capacity(rows.len());
    let mut symbols = 0;
    let mut start = 0;
    for i in 0..=rows.len() {
        if i == rows.len() || rows[i].symbol != rows[start].symbol {
            features.extend(features_for_symbol(&rows[start..i]));
            symbols += 1;
            start = i;
        }
    }

    write_features(paths, &features)?;
    let summary = FeaturesSummary {
        symbols,
        rows: features.len(),
        written: true,
    };
    info!(
        "derived features for {} symbols ({} rows) -> {}",
        summary.symbols,
        summary.rows,
        paths.features_parquet().display()
    );
    Ok(summary)
}

fn write_features(paths: &DataPaths, rows: &[FeatureRow]) -> Result<(), DataError> {
    std::fs::create_dir_all(paths.features_dir())?;

    let symbols: Vec<&str> = rows.iter().map(|r| r.symbol.as_str()).collect();
    let timestamps: Vec<_> = rows.iter().map(|r| r.timestamp).collect();

    let df = DataFrame::new(vec![
        Column::new("symbol".into(), symbols),
        table::date_column("timestamp", &timestamps)?,
        Column::new("close".into(), rows.iter().map(|r| r.close).collect::<Vec<_>>()),
        Column::new("volume".into(), rows.iter().map(|r| r.volume).collect::<Vec<_>>()),
        Column::new("ret_1d".into(), rows.iter().map(|r| r.ret_1d).collect::<Vec<_>>()),
        Column::new("ret_3d".into(), rows.iter().map(|r| r.ret_3d).collect::<Vec<_>>()),
        Column::new("ret_5d".into(), rows.iter().map(|r| r.ret_5d).collect::<Vec<_>>()),
        Column::new("vol_20d".into(), rows.iter().map(|r| r.vol_20d).collect::<Vec<_>>()),
        Column::new(
            "vol_zscore".into(),
            rows.iter().map(|r| r.vol_zscore).collect::<Vec<_>>(),
        ),
    ])
    .map_err(|e| DataError::ParquetError(format!("build frame: {e}")))?;
    table::write_parquet_atomic(&df, &paths.features_parquet())?;

    let mut writer = csv::Writer::from_path(paths.features_csv())
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

/// Read the feature table back, ordered as written.
pub fn load_features(paths: &DataPaths) -> Result<Vec<FeatureRow>, DataError> {
    let df = table::read_parquet(&paths.features_parquet())?;

    let symbols = table::str_values(&df, "symbol")?;
    let timestamps = table::date_values(&df, "timestamp")?;
    let closes = table::f64_values(&df, "close")?;
    let volumes = table::u64_values(&df, "volume")?;
    let ret_1d = table::opt_f64_values(&df, "ret_1d")?;
    let ret_3d = table::opt_f64_values(&df, "ret_3d")?;
    let ret_5d = table::opt_f64_values(&df, "ret_5d")?;
    let vol_20d = table::opt_f64_values(&df, "vol_20d")?;
    let vol_zscore = table::opt_f64_values(&df, "vol_zscore")?;

    let mut rows = Vec::with_capacity(symbols.len());
    for i in 0..symbols.len() {
        rows.push(FeatureRow {
            symbol: symbols[i].clone(),
            timestamp: timestamps[i],
            close: closes[i],
            volume: volumes[i],
            ret_1d: ret_1d[i],
            ret_3d: ret_3d[i],
            ret_5d: ret_5d[i],
            vol_20d: vol_20d[i],
            vol_zscore: vol_zscore[i],
        });
    }
    Ok(rows)
}
