//! Raw ingestion — per-symbol OHLCV partitions and company metadata.
//!
//! Each ingestion run appends one CSV partition per symbol under
//! `raw/market/{SYMBOL}/{YYYYMMDD}.csv`, named by the ingest date. Rows that
//! fail schema validation are dropped with a warning; a symbol with zero
//! valid rows writes nothing and logs an error.

use super::provider::{DataError, DataProvider};
use crate::config::DataPaths;
use crate::schema::{CompanyMetadata, MarketRow};
use chrono::NaiveDate;
use log::{error, info, warn};
use std::fs;
use std::path::PathBuf;

/// Outcome of ingesting one symbol.
#[derive(Debug, Clone)]
pub struct IngestSummary {
    pub symbol: String,
    pub rows_fetched: usize,
    pub rows_valid: usize,
    pub rows_skipped: usize,
    pub path: PathBuf,
}

/// Fetch, validate, and persist one symbol's daily bars.
///
/// Returns `Ok(None)` when the fetch succeeded but no row survived
/// validation — the empty-result case writes nothing.
pub fn ingest_symbol(
    provider: &dyn DataProvider,
    paths: &DataPaths,
    symbol: &str,
    start: NaiveDate,
    end: NaiveDate,
    ingest_date: NaiveDate,
) -> Result<Option<IngestSummary>, DataError> {
    info!("fetching {symbol} from {start} via {}", provider.name());
    let fetched = provider.fetch(symbol, start, end)?;

    let rows_fetched = fetched.bars.len();
    let mut rows = Vec::with_capacity(rows_fetched);

    for bar in fetched.bars {
        let row = MarketRow {
            symbol: symbol.to_string(),
            timestamp: bar.date,
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
            ingest_date,
        };
        match row.validate() {
            Ok(()) => rows.push(row),
            Err(e) => warn!("skipping invalid row for {symbol} @ {}: {e}", bar.date),
        }
    }

    if rows.is_empty() {
        error!("no valid rows for {symbol}; nothing written");
        return Ok(None);
    }

    let dir = paths.raw_symbol_dir(symbol);
    fs::create_dir_all(&dir)?;
    let path = dir.join(format!("{}.csv", ingest_date.format("%Y%m%d")));
    write_rows_csv(&path, &rows)?;

    let summary = IngestSummary {
        symbol: symbol.to_string(),
        rows_fetched,
        rows_valid: rows.len(),
        rows_skipped: rows_fetched - rows.len(),
        path,
    };
    info!(
        "saved {} rows for {symbol} to {} ({} skipped)",
        summary.rows_valid,
        summary.path.display(),
        summary.rows_skipped
    );
    Ok(Some(summary))
}

fn write_rows_csv(path: &std::path::Path, rows: &[MarketRow]) -> Result<(), DataError> {
    let mut writer =
        csv::Writer::from_path(path).map_err(|e| DataError::CsvError(e.to_string()))?;
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

/// Validate and persist the built-in company metadata table.
///
/// Returns the number of companies written.
pub fn ingest_metadata(paths: &DataPaths) -> Result<usize, DataError> {
    let mut valid = Vec::new();
    for company in builtin_company_metadata() {
        match company.validate() {
            Ok(()) => valid.push(company),
            Err(e) => warn!("metadata validation failed for {}: {e}", company.symbol),
        }
    }

    if valid.is_empty() {
        error!("no valid company metadata; nothing written");
        return Ok(0);
    }

    let path = paths.raw_metadata_file();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut writer =
        csv::Writer::from_path(&path).map_err(|e| DataError::CsvError(e.to_string()))?;
    for company in &valid {
        writer
            .serialize(company)
            .map_err(|e| DataError::CsvError(e.to_string()))?;
    }
    writer
        .flush()
        .map_err(|e| DataError::CsvError(e.to_string()))?;

    info!("metadata saved: {} companies to {}", valid.len(), path.display());
    Ok(valid.len())
}

/// Static company metadata shipped with the pipeline.
///
/// Descriptive fields for the default universe; valuation figures are
/// point-in-time snapshots and carry a data_as_of date.
pub fn builtin_company_metadata() -> Vec<CompanyMetadata> {
    let as_of = NaiveDate::from_ymd_opt(2026, 1, 15);

    let company = |symbol: &str,
                   sector: &str,
                   industry_group: &str,
                   industry: &str,
                   market_cap: f64,
                   pe_ratio: f64,
                   beta: f64,
                   hq_country: &str,
                   employees: u32,
                   founded_year: i32,
                   dividend_yield_pct: f64,
                   gics_code: &str,
                   debt_to_equity: f64| CompanyMetadata {
        symbol: symbol.into(),
        sector: sector.into(),
        industry: industry.into(),
        industry_group: Some(industry_group.into()),
        sub_industry: Some(industry.into()),
        market_cap: Some(market_cap),
        pe_ratio: Some(pe_ratio),
        debt_to_equity: Some(debt_to_equity),
        beta: Some(beta),
        dividend_yield_pct: Some(dividend_yield_pct),
        employees: Some(employees),
        hq_country: Some(hq_country.into()),
        founded_year: Some(founded_year),
        gics_code: Some(gics_code.into()),
        data_as_of: as_of,
    };

    vec![
        company(
            "AAPL", "Technology", "Technology Hardware", "Consumer Electronics",
            3.67e12, 35.2, 1.25, "USA", 164_000, 1976, 0.45, "252010", 1.85,
        ),
        company(
            "MSFT", "Technology", "Software & Services", "Software",
            3.42e12, 38.1, 0.92, "USA", 228_000, 1975, 0.68, "451020", 0.42,
        ),
        company(
            "NVDA", "Technology", "Semiconductors", "Semiconductors",
            4.53e12, 85.4, 1.68, "USA", 29_300, 1993, 0.02, "453010", 0.28,
        ),
        company(
            "BLK", "Financial Services", "Financial Services", "Asset Management",
            1.6882e11, 24.6, 1.32, "USA", 19_700, 1988, 2.05, "403010", 0.15,
        ),
        company(
            "JPM", "Financial Services", "Banks", "Banks",
            8.0978e11, 13.8, 1.12, "USA", 310_000, 1799, 2.12, "401010", 1.45,
        ),
        company(
            "HSBC", "Financial Services", "Banks", "Banks",
            2.278e12, 8.9, 0.65, "UK", 220_000, 1865, 6.85, "401010", 1.92,
        ),
        company(
            "LNG", "Energy", "Oil, Gas & Consumable Fuels", "Oil & Gas Midstream",
            4.463e10, 12.4, 0.98, "USA", 1_500, 1996, 0.89, "551060", 3.25,
        ),
        company(
            "SHEL", "Energy", "Oil, Gas & Consumable Fuels", "Integrated Oil & Gas",
            1.99e11, 11.2, 0.55, "UK", 103_000, 1907, 3.98, "101020", 0.38,
        ),
        company(
            "BP", "Energy", "Oil, Gas & Consumable Fuels", "Integrated Oil & Gas",
            6.499e10, 9.8, 0.72, "UK", 67_800, 1909, 5.42, "101020", 0.65,
        ),
        company(
            "AZN", "Health Care", "Pharmaceuticals", "Pharmaceuticals",
            2.79427e11, 28.5, 0.41, "UK", 89_400, 1999, 1.89, "352010", 0.92,
        ),
    ]
}
