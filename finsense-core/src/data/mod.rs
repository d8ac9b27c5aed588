//! Raw ingestion and consolidation.

pub mod consolidate;
pub mod ingest;
pub mod provider;
pub mod table;
pub mod yahoo;

pub use consolidate::{consolidate, load_consolidated, ConsolidateSummary};
pub use ingest::{ingest_metadata, ingest_symbol, IngestSummary};
pub use provider::{DataError, DataProvider, FetchResult, ProviderBar};
pub use yahoo::YahooProvider;
