//! Pipeline configuration and data path layout.
//!
//! `PipelineConfig` is the serializable run configuration (symbols, start
//! date, data root). `DataPaths` derives every input/output location from a
//! single data root. Directory creation is an explicit `ensure_dirs()` call
//! made by the caller before running stages — loading a config never touches
//! the filesystem.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Serializable pipeline configuration, loaded from TOML.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineConfig {
    /// Symbols to ingest (e.g. AAPL, MSFT).
    pub symbols: Vec<String>,

    /// First date of history to request from the provider.
    pub start_date: NaiveDate,

    /// Root directory for all raw/processed/artifact files.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}

impl PipelineConfig {
    pub fn from_toml(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        if config.symbols.is_empty() {
            return Err(ConfigError::NoSymbols);
        }
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&content)
    }

    pub fn paths(&self) -> DataPaths {
        DataPaths::new(&self.data_dir)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("config lists no symbols")]
    NoSymbols,
}

/// Every fixed relative path used by the pipeline, rooted at one directory.
///
/// Layout:
/// ```text
/// {root}/raw/market/{SYMBOL}/{YYYYMMDD}.csv   raw OHLCV partitions
/// {root}/raw/metadata/companies.csv           company metadata
/// {root}/processed/market/daily_ohlcv.*       canonical daily table
/// {root}/processed/features/market.*          derived features
/// {root}/processed/features/attributions.*    per-row attributions
/// {root}/processed/train_market_only.*        supervised training table
/// {root}/artifacts/                           model, split spec, OOF, importance
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPaths {
    root: PathBuf,
}

impl DataPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn raw_market_dir(&self) -> PathBuf {
        self.root.join("raw").join("market")
    }

    pub fn raw_symbol_dir(&self, symbol: &str) -> PathBuf {
        self.raw_market_dir().join(symbol)
    }

    pub fn raw_metadata_file(&self) -> PathBuf {
        self.root.join("raw").join("metadata").join("companies.csv")
    }

    pub fn processed_market_dir(&self) -> PathBuf {
        self.root.join("processed").join("market")
    }

    pub fn daily_ohlcv_parquet(&self) -> PathBuf {
        self.processed_market_dir().join("daily_ohlcv.parquet")
    }

    pub fn daily_ohlcv_csv(&self) -> PathBuf {
        self.processed_market_dir().join("daily_ohlcv.csv")
    }

    pub fn features_dir(&self) -> PathBuf {
        self.root.join("processed").join("features")
    }

    pub fn features_parquet(&self) -> PathBuf {
        self.features_dir().join("market.parquet")
    }

    pub fn features_csv(&self) -> PathBuf {
        self.features_dir().join("market.csv")
    }

    pub fn attributions_parquet(&self) -> PathBuf {
        self.features_dir().join("attributions.parquet")
    }

    pub fn attributions_csv(&self) -> PathBuf {
        self.features_dir().join("attributions.csv")
    }

    pub fn training_parquet(&self) -> PathBuf {
        self.root.join("processed").join("train_market_only.parquet")
    }

    pub fn training_csv(&self) -> PathBuf {
        self.root.join("processed").join("train_market_only.csv")
    }

    pub fn artifacts_dir(&self) -> PathBuf {
        self.root.join("artifacts")
    }

    pub fn model_file(&self) -> PathBuf {
        self.artifacts_dir().join("model.json")
    }

    pub fn split_file(&self) -> PathBuf {
        self.artifacts_dir().join("split.json")
    }

    pub fn oof_predictions_file(&self) -> PathBuf {
        self.artifacts_dir().join("oof_predictions.csv")
    }

    pub fn feature_importance_file(&self) -> PathBuf {
        self.artifacts_dir().join("feature_importance.csv")
    }

    pub fn attribution_summary_file(&self) -> PathBuf {
        self.artifacts_dir().join("attribution_summary.csv")
    }

    /// Create every directory the pipeline writes into.
    ///
    /// Explicit setup step — stages assume their output directories exist.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.raw_market_dir())?;
        std::fs::create_dir_all(self.raw_metadata_file().parent().unwrap_or(&self.root))?;
        std::fs::create_dir_all(self.processed_market_dir())?;
        std::fs::create_dir_all(self.features_dir())?;
        std::fs::create_dir_all(self.artifacts_dir())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_minimal_config() {
        let toml_str = r#"
symbols = ["AAPL", "MSFT"]
start_date = "2020-01-02"
"#;
        let config = PipelineConfig::from_toml(toml_str).unwrap();
        assert_eq!(config.symbols, vec!["AAPL", "MSFT"]);
        assert_eq!(
            config.start_date,
            NaiveDate::from_ymd_opt(2020, 1, 2).unwrap()
        );
        assert_eq!(config.data_dir, PathBuf::from("data"));
    }

    #[test]
    fn parse_rejects_empty_symbols() {
        let toml_str = r#"
symbols = []
start_date = "2020-01-02"
"#;
        let result = PipelineConfig::from_toml(toml_str);
        assert!(matches!(result, Err(ConfigError::NoSymbols)));
    }

    #[test]
    fn paths_are_rooted() {
        let paths = DataPaths::new("/tmp/finsense");
        assert_eq!(
            paths.daily_ohlcv_parquet(),
            PathBuf::from("/tmp/finsense/processed/market/daily_ohlcv.parquet")
        );
        assert_eq!(
            paths.raw_symbol_dir("AAPL"),
            PathBuf::from("/tmp/finsense/raw/market/AAPL")
        );
        assert_eq!(
            paths.split_file(),
            PathBuf::from("/tmp/finsense/artifacts/split.json")
        );
    }

    #[test]
    fn ensure_dirs_creates_layout() {
        let dir = tempfile::tempdir().unwrap();
        let paths = DataPaths::new(dir.path().join("data"));
        paths.ensure_dirs().unwrap();

        assert!(paths.raw_market_dir().is_dir());
        assert!(paths.processed_market_dir().is_dir());
        assert!(paths.features_dir().is_dir());
        assert!(paths.artifacts_dir().is_dir());
    }

    #[test]
    fn config_roundtrip() {
        let config = PipelineConfig {
            symbols: vec!["SPY".into()],
            start_date: NaiveDate::from_ymd_opt(2019, 6, 3).unwrap(),
            data_dir: PathBuf::from("custom"),
        };
        let encoded = toml::to_string(&config).unwrap();
        let decoded = PipelineConfig::from_toml(&encoded).unwrap();
        assert_eq!(config, decoded);
    }
}
