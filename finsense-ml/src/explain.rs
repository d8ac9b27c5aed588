//! Additive per-row feature attributions over the validation slice.
//!
//! Uses the trained ensemble's path contributions: for every validation row,
//! `prediction = base_value + sum(contributions)` holds exactly. The split
//! is loaded from `artifacts/split.json` and verified against the current
//! dataset before any attribution is computed, so a silently re-assembled
//! dataset fails loudly instead of misattributing rows.

use crate::frame::{TrainingFrame, NUM_FEATURES};
use crate::gbm::GbmModel;
use crate::trainer::MlError;
use finsense_core::config::DataPaths;
use finsense_core::data::provider::DataError;
use finsense_core::data::table;
use finsense_core::split::ChronoSplit;
use log::info;
use polars::prelude::*;

#[derive(Debug, Clone)]
pub struct ExplainSummary {
    pub rows: usize,
    pub top_feature: String,
}

/// Compute and persist validation-row attributions.
///
/// Writes `processed/features/attributions.parquet` (and a CSV twin) plus
/// `artifacts/attribution_summary.csv` ranking features by mean absolute
/// contribution.
pub fn explain(paths: &DataPaths) -> Result<ExplainSummary, MlError> {
    let frame = TrainingFrame::load(paths)?;
    let model = GbmModel::load(&paths.model_file())?;
    let split = ChronoSplit::load(&paths.split_file())?;
    split.verify(frame.len(), &frame.content_hash())?;

    let bias = model.bias();
    let val_rows = &frame.rows()[split.split_idx..];
    let mut predictions = Vec::with_capacity(val_rows.len());
    let mut contributions: Vec<[f64; NUM_FEATURES]> = Vec::with_capacity(val_rows.len());

    for row in val_rows {
        let (prediction, contribs) = model.predict_with_contributions(&row.feature_vector());
        predictions.push(prediction);
        contributions.push(contribs);
    }

    write_attributions(paths, &model, val_rows, bias, &predictions, &contributions)?;
    let summary_rows = write_summary(paths, &model, &contributions)?;

    info!(
        "attributed {} validation rows; strongest mean driver: {}",
        val_rows.len(),
        summary_rows
    );
    Ok(ExplainSummary {
        rows: val_rows.len(),
        top_feature: summary_rows,
    })
}

fn write_attributions(
    paths: &DataPaths,
    model: &GbmModel,
    val_rows: &[finsense_core::dataset::DatasetRow],
    bias: f64,
    predictions: &[f64],
    contributions: &[[f64; NUM_FEATURES]],
) -> Result<(), MlError> {
    let symbols: Vec<&str> = val_rows.iter().map(|r| r.symbol.as_str()).collect();
    let timestamps: Vec<_> = val_rows.iter().map(|r| r.timestamp).collect();

    let mut columns = vec![
        Column::new("symbol".into(), symbols),
        table::date_column("timestamp", &timestamps).map_err(MlError::Data)?,
        Column::new("base_value".into(), vec![bias; val_rows.len()]),
    ];
    for (f, name) in model.feature_names.iter().enumerate() {
        let values: Vec<f64> = contributions.iter().map(|c| c[f]).collect();
        columns.push(Column::new(format!("contrib_{name}").into(), values));
    }
    columns.push(Column::new("prediction".into(), predictions.to_vec()));

    let df = DataFrame::new(columns)
        .map_err(|e| MlError::Data(DataError::ParquetError(format!("build frame: {e}"))))?;
    table::write_parquet_atomic(&df, &paths.attributions_parquet()).map_err(MlError::Data)?;

    let mut writer = csv::Writer::from_path(paths.attributions_csv())
        .map_err(|e| MlError::Csv(e.to_string()))?;
    let mut header = vec!["symbol".to_string(), "timestamp".to_string(), "base_value".to_string()];
    header.extend(model.feature_names.iter().map(|n| format!("contrib_{n}")));
    header.push("prediction".to_string());
    writer
        .write_record(&header)
        .map_err(|e| MlError::Csv(e.to_string()))?;

    for (i, row) in val_rows.iter().enumerate() {
        let mut record = vec![
            row.symbol.clone(),
            row.timestamp.to_string(),
            bias.to_string(),
        ];
        record.extend(contributions[i].iter().map(|v| v.to_string()));
        record.push(predictions[i].to_string());
        writer
            .write_record(&record)
            .map_err(|e| MlError::Csv(e.to_string()))?;
    }
    writer.flush().map_err(|e| MlError::Csv(e.to_string()))?;
    Ok(())
}

/// Write the per-feature summary; returns the strongest feature's name.
fn write_summary(
    paths: &DataPaths,
    model: &GbmModel,
    contributions: &[[f64; NUM_FEATURES]],
) -> Result<String, MlError> {
    let n = contributions.len().max(1) as f64;
    let mut ranked: Vec<(String, f64)> = model
        .feature_names
        .iter()
        .enumerate()
        .map(|(f, name)| {
            let mean_abs = contributions.iter().map(|c| c[f].abs()).sum::<f64>() / n;
            (name.clone(), mean_abs)
        })
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

    let mut writer = csv::Writer::from_path(paths.attribution_summary_file())
        .map_err(|e| MlError::Csv(e.to_string()))?;
    writer
        .write_record(["feature", "mean_abs_contribution"])
        .map_err(|e| MlError::Csv(e.to_string()))?;
    for (name, mean_abs) in &ranked {
        writer
            .write_record([name.as_str(), &mean_abs.to_string()])
            .map_err(|e| MlError::Csv(e.to_string()))?;
    }
    writer.flush().map_err(|e| MlError::Csv(e.to_string()))?;

    Ok(ranked
        .first()
        .map(|(name, _)| name.clone())
        .unwrap_or_default())
}
