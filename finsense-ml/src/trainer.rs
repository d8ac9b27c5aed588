//! The training stage: split, fit, evaluate, persist artifacts.
//!
//! Artifacts written under `artifacts/`:
//! - `split.json`: the chronological split, hashed against the dataset
//! - `model.json`: the boosted ensemble
//! - `oof_predictions.csv`: actual vs predicted over the validation rows
//! - `feature_importance.csv`: total split gain per feature
//!
//! The split is saved before training starts, so attribution can reuse it
//! even if a later training run is interrupted midway.

use crate::frame::TrainingFrame;
use crate::gbm::{GbmModel, GbmParams, ModelError};
use crate::metrics;
use chrono::NaiveDate;
use finsense_core::config::DataPaths;
use finsense_core::data::provider::DataError;
use finsense_core::dataset::FEATURE_COLS;
use finsense_core::split::{ChronoSplit, SplitError};
use log::info;
use serde::Serialize;
use thiserror::Error;

/// Fixed fraction of rows used for training.
pub const TRAIN_FRACTION: f64 = 0.8;

#[derive(Debug, Error)]
pub enum MlError {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Split(#[from] SplitError),

    #[error(transparent)]
    Model(#[from] ModelError),

    #[error("training table is empty")]
    EmptyDataset,

    #[error("csv artifact error: {0}")]
    Csv(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Validation metrics and shape of a completed training run.
#[derive(Debug, Clone, Serialize)]
pub struct TrainReport {
    pub n_rows: usize,
    pub train_rows: usize,
    pub validation_rows: usize,
    pub rounds_trained: usize,
    pub best_rounds: usize,
    pub rmse: f64,
    pub mae: f64,
    pub directional_accuracy: f64,
}

#[derive(Serialize)]
struct OofRecord<'a> {
    symbol: &'a str,
    timestamp: NaiveDate,
    actual: f64,
    predicted: f64,
}

#[derive(Serialize)]
struct ImportanceRecord<'a> {
    feature: &'a str,
    gain: f64,
}

/// Train the baseline model over the assembled training table.
pub fn train(paths: &DataPaths, params: GbmParams) -> Result<TrainReport, MlError> {
    let frame = TrainingFrame::load(paths)?;
    if frame.is_empty() {
        return Err(MlError::EmptyDataset);
    }

    let hash = frame.content_hash();
    let split = ChronoSplit::compute(&frame.timestamps(), TRAIN_FRACTION, hash)?;
    std::fs::create_dir_all(paths.artifacts_dir())?;
    split.save(&paths.split_file())?;
    info!(
        "split: {} train / {} validation rows, boundary {}",
        split.train_len(),
        split.validation_len(),
        split.boundary
    );

    let xs = frame.features();
    let ys = frame.labels();
    let (train_x, val_x) = xs.split_at(split.split_idx);
    let (train_y, val_y) = ys.split_at(split.split_idx);

    let feature_names = FEATURE_COLS.iter().map(|s| s.to_string()).collect();
    let model = GbmModel::fit(train_x, train_y, val_x, val_y, feature_names, params)?;
    model.save(&paths.model_file())?;

    let predicted = model.predict_batch(val_x);
    write_oof(paths, &frame, split.split_idx, val_y, &predicted)?;
    write_importance(paths, &model)?;

    let report = TrainReport {
        n_rows: frame.len(),
        train_rows: split.train_len(),
        validation_rows: split.validation_len(),
        rounds_trained: model.rounds_trained,
        best_rounds: model.trees.len(),
        rmse: metrics::rmse(val_y, &predicted),
        mae: metrics::mae(val_y, &predicted),
        directional_accuracy: metrics::directional_accuracy(val_y, &predicted),
    };
    info!(
        "trained {} rounds (best {}): rmse {:.6}, mae {:.6}, direction {:.3}",
        report.rounds_trained,
        report.best_rounds,
        report.rmse,
        report.mae,
        report.directional_accuracy
    );
    Ok(report)
}

fn write_oof(
    paths: &DataPaths,
    frame: &TrainingFrame,
    split_idx: usize,
    actual: &[f64],
    predicted: &[f64],
) -> Result<(), MlError> {
    let mut writer = csv::Writer::from_path(paths.oof_predictions_file())
        .map_err(|e| MlError::Csv(e.to_string()))?;
    for (i, row) in frame.rows()[split_idx..].iter().enumerate() {
        writer
            .serialize(OofRecord {
                symbol: &row.symbol,
                timestamp: row.timestamp,
                actual: actual[i],
                predicted: predicted[i],
            })
            .map_err(|e| MlError::Csv(e.to_string()))?;
    }
    writer.flush().map_err(|e| MlError::Csv(e.to_string()))?;
    Ok(())
}

fn write_importance(paths: &DataPaths, model: &GbmModel) -> Result<(), MlError> {
    let mut importance = model.feature_importance();
    importance.sort_by(|a, b| b.1.total_cmp(&a.1));

    let mut writer = csv::Writer::from_path(paths.feature_importance_file())
        .map_err(|e| MlError::Csv(e.to_string()))?;
    for (feature, gain) in &importance {
        writer
            .serialize(ImportanceRecord { feature, gain: *gain })
            .map_err(|e| MlError::Csv(e.to_string()))?;
    }
    writer.flush().map_err(|e| MlError::Csv(e.to_string()))?;
    Ok(())
}
