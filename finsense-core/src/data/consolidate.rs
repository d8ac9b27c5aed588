//! Consolidation of raw partitions into one deduplicated daily table.
//!
//! - enumerates every `raw/market/{SYMBOL}/*.csv` partition
//! - unreadable partitions and malformed rows are skipped with a warning
//! - duplicates on (symbol, timestamp) keep the last row under the sort key
//!   (symbol, timestamp, ingest_date, partition path), so a later re-ingest
//!   wins over the original and the outcome never depends on directory
//!   enumeration order
//! - writes `processed/market/daily_ohlcv.parquet` and a CSV twin

use super::provider::DataError;
use super::table;
use crate::config::DataPaths;
use crate::schema::MarketRow;
use log::{error, info, warn};
use polars::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};

/// Outcome of a consolidation run.
#[derive(Debug, Clone)]
pub struct ConsolidateSummary {
    pub partitions_read: usize,
    pub partitions_skipped: usize,
    pub rows_read: usize,
    pub rows_after_dedup: usize,
    pub duplicates_dropped: usize,
    pub written: bool,
}

/// Merge all raw partitions into the consolidated daily OHLCV table.
///
/// An empty raw store is not an error: the summary comes back with
/// `written == false` and nothing on disk changes.
pub fn consolidate(paths: &DataPaths) -> Result<ConsolidateSummary, DataError> {
    let (mut rows, partitions_read, partitions_skipped) = read_partitions(&paths.raw_market_dir())?;
    let rows_read = rows.len();

    if rows.is_empty() {
        error!("no raw partitions to consolidate under {}", paths.raw_market_dir().display());
        return Ok(ConsolidateSummary {
            partitions_read,
            partitions_skipped,
            rows_read: 0,
            rows_after_dedup: 0,
            duplicates_dropped: 0,
            written: false,
        });
    }

    // Deterministic total order, then keep-last on (symbol, timestamp).
    rows.sort_by(|(a, pa), (b, pb)| {
        a.symbol
            .cmp(&b.symbol)
            .then(a.timestamp.cmp(&b.timestamp))
            .then(a.ingest_date.cmp(&b.ingest_date))
            .then(pa.cmp(pb))
    });
    let deduped = keep_last(rows);
    let rows_after_dedup = deduped.len();

    write_consolidated(paths, &deduped)?;

    let summary = ConsolidateSummary {
        partitions_read,
        partitions_skipped,
        rows_read,
        rows_after_dedup,
        duplicates_dropped: rows_read - rows_after_dedup,
        written: true,
    };
    info!(
        "consolidated {} partitions: {} rows -> {} ({} duplicates dropped)",
        summary.partitions_read,
        summary.rows_read,
        summary.rows_after_dedup,
        summary.duplicates_dropped
    );
    Ok(summary)
}

fn read_partitions(
    market_dir: &Path,
) -> Result<(Vec<(MarketRow, PathBuf)>, usize, usize), DataError> {
    let mut rows = Vec::new();
    let mut partitions_read = 0;
    let mut partitions_skipped = 0;

    if !market_dir.exists() {
        return Ok((rows, 0, 0));
    }

    let mut partition_files = Vec::new();
    for symbol_entry in fs::read_dir(market_dir)? {
        let symbol_dir = symbol_entry?.path();
        if !symbol_dir.is_dir() {
            continue;
        }
        for file_entry in fs::read_dir(&symbol_dir)? {
            let file = file_entry?.path();
            if file.extension().is_some_and(|ext| ext == "csv") {
                partition_files.push(file);
            }
        }
    }
    partition_files.sort();

    for file in partition_files {
        let mut reader = match csv::Reader::from_path(&file) {
            Ok(reader) => reader,
            Err(e) => {
                warn!("skipping unreadable partition {}: {e}", file.display());
                partitions_skipped += 1;
                continue;
            }
        };
        partitions_read += 1;

        for record in reader.deserialize::<MarketRow>() {
            match record {
                Ok(row) => rows.push((row, file.clone())),
                Err(e) => warn!("skipping malformed row in {}: {e}", file.display()),
            }
        }
    }

    Ok((rows, partitions_read, partitions_skipped))
}

/// Keep the last row of each (symbol, timestamp) run. Input must already be
/// sorted so that equal keys are adjacent.
fn keep_last(sorted: Vec<(MarketRow, PathBuf)>) -> Vec<MarketRow> {
    let mut out: Vec<MarketRow> = Vec::with_capacity(sorted.len());
    for (row, _) in sorted {
        match out.last() {
            Some(prev) if prev.symbol == row.symbol && prev.timestamp == row.timestamp => {
                *out.last_mut().unwrap() = row;
            }
            _ => out.push(row),
        }
    }
    out
}

/// Write the consolidated table (parquet + CSV twin) for the given rows.
pub(crate) fn write_consolidated(paths: &DataPaths, rows: &[MarketRow]) -> Result<(), DataError> {
    fs::create_dir_all(paths.processed_market_dir())?;

    let df = rows_to_frame(rows)?;
    table::write_parquet_atomic(&df, &paths.daily_ohlcv_parquet())?;

    let mut writer = csv::Writer::from_path(paths.daily_ohlcv_csv())
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

fn rows_to_frame(rows: &[MarketRow]) -> Result<DataFrame, DataError> {
    let symbols: Vec<&str> = rows.iter().map(|r| r.symbol.as_str()).collect();
    let timestamps: Vec<_> = rows.iter().map(|r| r.timestamp).collect();
    let ingest_dates: Vec<_> = rows.iter().map(|r| r.ingest_date).collect();

    DataFrame::new(vec![
        Column::new("symbol".into(), symbols),
        table::date_column("timestamp", &timestamps)?,
        Column::new("open".into(), rows.iter().map(|r| r.open).collect::<Vec<_>>()),
        Column::new("high".into(), rows.iter().map(|r| r.high).collect::<Vec<_>>()),
        Column::new("low".into(), rows.iter().map(|r| r.low).collect::<Vec<_>>()),
        Column::new("close".into(), rows.iter().map(|r| r.close).collect::<Vec<_>>()),
        Column::new("volume".into(), rows.iter().map(|r| r.volume).collect::<Vec<_>>()),
        table::date_column("ingest_date", &ingest_dates)?,
    ])
    .map_err(|e| DataError::ParquetError(format!("build frame: {e}")))
}

/// Read the consolidated table back into rows, ordered as written.
pub fn load_consolidated(paths: &DataPaths) -> Result<Vec<MarketRow>, DataError> {
    let df = table::read_parquet(&paths.daily_ohlcv_parquet())?;

    let symbols = table::str_values(&df, "symbol")?;
    let timestamps = table::date_values(&df, "timestamp")?;
    let opens = table::f64_values(&df, "open")?;
    let highs = table::f64_values(&df, "high")?;
    let lows = table::f64_values(&df, "low")?;
    let closes = table::f64_values(&df, "close")?;
    let volumes = table::u64_values(&df, "volume")?;
    let ingest_dates = table::date_values(&df, "ingest_date")?;

    let mut rows = Vec::with_capacity(symbols.len());
    for i in 0..symbols.len() {
        rows.push(MarketRow {
            symbol: symbols[i].clone(),
            timestamp: timestamps[i],
            open: opens[i],
            high: highs[i],
            low: lows[i],
            close: closes[i],
            volume: volumes[i],
            ingest_date: ingest_dates[i],
        });
    }
    Ok(rows)
}
