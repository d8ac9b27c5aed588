//! End-to-end batch pipeline: ingest -> consolidate -> features -> dataset,
//! against a canned provider, verifying row counts at every stage.

use chrono::NaiveDate;
use finsense_core::config::DataPaths;
use finsense_core::data::provider::{DataError, DataProvider, FetchResult, ProviderBar};
use finsense_core::data::{consolidate, ingest_metadata, ingest_symbol};
use finsense_core::dataset::assemble_dataset;
use finsense_core::features::{derive_features, load_features};

const SYMBOLS: [&str; 3] = ["AAPL", "MSFT", "SPY"];
const BARS_PER_SYMBOL: usize = 30;

struct CannedProvider;

impl DataProvider for CannedProvider {
    fn name(&self) -> &str {
        "canned"
    }

    fn fetch(
        &self,
        symbol: &str,
        start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<FetchResult, DataError> {
        // Deterministic but non-flat closes and volumes per symbol.
        let seed = symbol.bytes().map(u64::from).sum::<u64>();
        let bars = (0..BARS_PER_SYMBOL)
            .map(|i| {
                let close = 100.0 + seed as f64 % 50.0 + i as f64 + (i % 4) as f64 * 0.75;
                ProviderBar {
                    date: start + chrono::Duration::days(i as i64),
                    open: close - 0.5,
                    high: close + 1.0,
                    low: close - 1.0,
                    close,
                    volume: 10_000 + (seed + i as u64) % 13 * 500,
                }
            })
            .collect();
        Ok(FetchResult {
            symbol: symbol.to_string(),
            bars,
        })
    }
}

fn start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
}

fn run_ingest(paths: &DataPaths, ingest_date: NaiveDate) {
    let provider = CannedProvider;
    let end = start_date() + chrono::Duration::days(BARS_PER_SYMBOL as i64);
    for symbol in SYMBOLS {
        let summary = ingest_symbol(&provider, paths, symbol, start_date(), end, ingest_date)
            .unwrap()
            .unwrap();
        assert_eq!(summary.rows_valid, BARS_PER_SYMBOL);
    }
}

#[test]
fn full_pipeline_row_counts() {
    let dir = tempfile::tempdir().unwrap();
    let paths = DataPaths::new(dir.path().join("data"));
    paths.ensure_dirs().unwrap();

    run_ingest(&paths, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
    assert_eq!(ingest_metadata(&paths).unwrap(), 10);

    let consolidated = consolidate(&paths).unwrap();
    assert!(consolidated.written);
    assert_eq!(consolidated.rows_after_dedup, 3 * BARS_PER_SYMBOL);
    assert_eq!(consolidated.duplicates_dropped, 0);

    let features = derive_features(&paths).unwrap();
    assert_eq!(features.symbols, 3);
    assert_eq!(features.rows, 90);

    // Rolling features need 10 trailing rows: 21 eligible rows per symbol.
    let feature_rows = load_features(&paths).unwrap();
    let dense_vol = feature_rows.iter().filter(|r| r.vol_20d.is_some()).count();
    assert_eq!(dense_vol, 63);

    let dataset = assemble_dataset(&paths).unwrap();
    assert!(dataset.written);
    // Every row but each symbol's last gets a label.
    assert_eq!(dataset.candidate_label_rows, 87);
    // Dense rows per symbol are indices 9..=28.
    assert_eq!(dataset.kept_rows, 60);
}

#[test]
fn reingest_overwrites_older_partitions() {
    let dir = tempfile::tempdir().unwrap();
    let paths = DataPaths::new(dir.path().join("data"));
    paths.ensure_dirs().unwrap();

    run_ingest(&paths, NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
    run_ingest(&paths, NaiveDate::from_ymd_opt(2024, 2, 8).unwrap());

    let consolidated = consolidate(&paths).unwrap();
    assert_eq!(consolidated.partitions_read, 6);
    assert_eq!(consolidated.rows_read, 2 * 3 * BARS_PER_SYMBOL);
    assert_eq!(consolidated.rows_after_dedup, 3 * BARS_PER_SYMBOL);
    assert_eq!(consolidated.duplicates_dropped, 3 * BARS_PER_SYMBOL);

    let rows = consolidate::load_consolidated(&paths).unwrap();
    let later = NaiveDate::from_ymd_opt(2024, 2, 8).unwrap();
    assert!(rows.iter().all(|r| r.ingest_date == later));
}

#[test]
fn stages_fail_cleanly_without_upstream_outputs() {
    let dir = tempfile::tempdir().unwrap();
    let paths = DataPaths::new(dir.path().join("data"));
    paths.ensure_dirs().unwrap();

    assert!(matches!(
        derive_features(&paths).unwrap_err(),
        DataError::MissingInput(_)
    ));
    assert!(matches!(
        assemble_dataset(&paths).unwrap_err(),
        DataError::MissingInput(_)
    ));
}
