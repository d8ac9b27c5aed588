//! Record schemas and per-row validation.
//!
//! Validation failures during ingestion are recoverable: the offending row is
//! dropped with a warning and the rest of the batch proceeds.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One validated daily OHLCV bar.
///
/// Invariants (enforced by [`MarketRow::validate`]):
/// - symbol is 1..=10 characters
/// - all prices are finite and positive
/// - high >= low, and open/close lie within [low, high]
/// - volume is non-negative (by type)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketRow {
    pub symbol: String,
    pub timestamp: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
    pub ingest_date: NaiveDate,
}

impl MarketRow {
    pub fn validate(&self) -> Result<(), SchemaError> {
        validate_symbol(&self.symbol)?;

        for (name, value) in [
            ("open", self.open),
            ("high", self.high),
            ("low", self.low),
            ("close", self.close),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(SchemaError::NonPositivePrice {
                    column: name,
                    value,
                });
            }
        }

        if self.high < self.low {
            return Err(SchemaError::InvertedBar {
                high: self.high,
                low: self.low,
            });
        }
        if self.open < self.low || self.open > self.high {
            return Err(SchemaError::PriceOutsideRange {
                column: "open",
                value: self.open,
            });
        }
        if self.close < self.low || self.close > self.high {
            return Err(SchemaError::PriceOutsideRange {
                column: "close",
                value: self.close,
            });
        }

        Ok(())
    }
}

/// Static per-symbol descriptive and valuation attributes.
///
/// Only symbol, sector, and industry are required; everything else is
/// provider-dependent and may be absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyMetadata {
    pub symbol: String,
    pub sector: String,
    pub industry: String,
    pub industry_group: Option<String>,
    pub sub_industry: Option<String>,
    pub market_cap: Option<f64>,
    pub pe_ratio: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub beta: Option<f64>,
    pub dividend_yield_pct: Option<f64>,
    pub employees: Option<u32>,
    pub hq_country: Option<String>,
    pub founded_year: Option<i32>,
    pub gics_code: Option<String>,
    pub data_as_of: Option<NaiveDate>,
}

impl CompanyMetadata {
    pub fn validate(&self) -> Result<(), SchemaError> {
        validate_symbol(&self.symbol)?;
        if self.sector.trim().is_empty() {
            return Err(SchemaError::MissingField("sector"));
        }
        if self.industry.trim().is_empty() {
            return Err(SchemaError::MissingField("industry"));
        }
        Ok(())
    }
}

fn validate_symbol(symbol: &str) -> Result<(), SchemaError> {
    if symbol.is_empty() || symbol.len() > 10 {
        return Err(SchemaError::BadSymbol(symbol.to_string()));
    }
    Ok(())
}

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("symbol must be 1..=10 characters, got '{0}'")]
    BadSymbol(String),

    #[error("{column} must be a positive finite price, got {value}")]
    NonPositivePrice { column: &'static str, value: f64 },

    #[error("inverted bar: high {high} < low {low}")]
    InvertedBar { high: f64, low: f64 },

    #[error("{column} {value} lies outside [low, high]")]
    PriceOutsideRange { column: &'static str, value: f64 },

    #[error("required field '{0}' is empty")]
    MissingField(&'static str),
}

#[cfg(test)]
pub fn sample_row(symbol: &str, timestamp: NaiveDate, close: f64, volume: u64) -> MarketRow {
    MarketRow {
        symbol: symbol.to_string(),
        timestamp,
        open: close,
        high: close + 1.0,
        low: close - 1.0,
        close,
        volume,
        ingest_date: timestamp,
    }
}
