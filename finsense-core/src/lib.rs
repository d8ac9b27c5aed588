//! FinSense Core — the market-data pipeline.
//!
//! This crate contains every batch stage up to (but not including) model
//! training:
//! - Schemas for OHLCV bars and company metadata, with per-row validation
//! - Pipeline configuration and explicit path layout
//! - Raw ingestion (provider trait + Yahoo Finance implementation)
//! - Consolidation of raw partitions into one canonical daily table
//! - Trailing return / volatility / volume feature derivation
//! - Supervised dataset assembly with forward log-return labels
//! - The persisted chronological train/validation split specification
//!
//! Every stage is a synchronous full-overwrite of its output paths: safe to
//! rerun, never run concurrently against the same output file.

pub mod config;
pub mod data;
pub mod dataset;
pub mod features;
pub mod schema;
pub mod split;

pub use config::{DataPaths, PipelineConfig};
pub use data::provider::{DataError, DataProvider, ProviderBar};
pub use schema::{CompanyMetadata, MarketRow, SchemaError};
pub use split::ChronoSplit;
