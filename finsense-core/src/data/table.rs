//! Parquet I/O helpers shared by the pipeline stages.
//!
//! Writes are atomic: write to a `.tmp` sibling, then rename into place.
//! Readers convert columns back into plain Rust vectors; stages never hold
//! DataFrames past their own boundary.

use super::provider::DataError;
use chrono::NaiveDate;
use polars::prelude::*;
use std::fs;
use std::path::Path;

/// Write a DataFrame to a Parquet file atomically.
pub fn write_parquet_atomic(df: &DataFrame, path: &Path) -> Result<(), DataError> {
    let tmp_path = path.with_extension("parquet.tmp");

    let file = fs::File::create(&tmp_path)
        .map_err(|e| DataError::ParquetError(format!("create {}: {e}", tmp_path.display())))?;
    ParquetWriter::new(file)
        .finish(&mut df.clone())
        .map_err(|e| DataError::ParquetError(format!("write parquet: {e}")))?;

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        DataError::ParquetError(format!("atomic rename failed: {e}"))
    })?;
    Ok(())
}

/// Read a Parquet file into a DataFrame.
///
/// A missing file is a fatal `MissingInput`; any other failure is a parquet
/// error.
pub fn read_parquet(path: &Path) -> Result<DataFrame, DataError> {
    if !path.exists() {
        return Err(DataError::MissingInput(path.to_path_buf()));
    }
    let file = fs::File::open(path)
        .map_err(|e| DataError::ParquetError(format!("open {}: {e}", path.display())))?;
    ParquetReader::new(file)
        .finish()
        .map_err(|e| DataError::ParquetError(format!("read {}: {e}", path.display())))
}

/// Build a Date column from `NaiveDate` values.
pub fn date_column(name: &str, dates: &[NaiveDate]) -> Result<Column, DataError> {
    let days: Vec<i32> = dates.iter().map(|d| date_to_days(*d)).collect();
    Column::new(name.into(), days)
        .cast(&DataType::Date)
        .map_err(|e| DataError::ParquetError(format!("{name} cast: {e}")))
}

/// Extract a Date column as `NaiveDate` values. Null entries are an error.
pub fn date_values(df: &DataFrame, name: &str) -> Result<Vec<NaiveDate>, DataError> {
    let ca = df
        .column(name)
        .map_err(|e| DataError::ParquetError(format!("column {name}: {e}")))?
        .date()
        .map_err(|e| DataError::ParquetError(format!("column {name} type: {e}")))?;

    let mut out = Vec::with_capacity(ca.len());
    for (i, v) in ca.iter().enumerate() {
        let days =
            v.ok_or_else(|| DataError::ParquetError(format!("null {name} at row {i}")))?;
        out.push(days_to_date(days));
    }
    Ok(out)
}

/// Extract a String column. Null entries are an error.
pub fn str_values(df: &DataFrame, name: &str) -> Result<Vec<String>, DataError> {
    let ca = df
        .column(name)
        .map_err(|e| DataError::ParquetError(format!("column {name}: {e}")))?
        .str()
        .map_err(|e| DataError::ParquetError(format!("column {name} type: {e}")))?;

    let mut out = Vec::with_capacity(ca.len());
    for (i, v) in ca.iter().enumerate() {
        let s = v.ok_or_else(|| DataError::ParquetError(format!("null {name} at row {i}")))?;
        out.push(s.to_string());
    }
    Ok(out)
}

/// Extract a Float64 column as required values. Null entries are an error.
pub fn f64_values(df: &DataFrame, name: &str) -> Result<Vec<f64>, DataError> {
    let ca = df
        .column(name)
        .map_err(|e| DataError::ParquetError(format!("column {name}: {e}")))?
        .f64()
        .map_err(|e| DataError::ParquetError(format!("column {name} type: {e}")))?;

    let mut out = Vec::with_capacity(ca.len());
    for (i, v) in ca.iter().enumerate() {
        let x = v.ok_or_else(|| DataError::ParquetError(format!("null {name} at row {i}")))?;
        out.push(x);
    }
    Ok(out)
}

/// Extract a nullable Float64 column.
pub fn opt_f64_values(df: &DataFrame, name: &str) -> Result<Vec<Option<f64>>, DataError> {
    let ca = df
        .column(name)
        .map_err(|e| DataError::ParquetError(format!("column {name}: {e}")))?
        .f64()
        .map_err(|e| DataError::ParquetError(format!("column {name} type: {e}")))?;
    Ok(ca.iter().collect())
}

/// Extract a UInt64 column. Null entries are an error.
pub fn u64_values(df: &DataFrame, name: &str) -> Result<Vec<u64>, DataError> {
    let ca = df
        .column(name)
        .map_err(|e| DataError::ParquetError(format!("column {name}: {e}")))?
        .u64()
        .map_err(|e| DataError::ParquetError(format!("column {name} type: {e}")))?;

    let mut out = Vec::with_capacity(ca.len());
    for (i, v) in ca.iter().enumerate() {
        let x = v.ok_or_else(|| DataError::ParquetError(format!("null {name} at row {i}")))?;
        out.push(x);
    }
    Ok(out)
}

pub fn date_to_days(date: NaiveDate) -> i32 {
    (date - epoch()).num_days() as i32
}

pub fn days_to_date(days: i32) -> NaiveDate {
    epoch() + chrono::Duration::days(days as i64)
}

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_conversion_roundtrip() {
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(days_to_date(date_to_days(date)), date);
        assert_eq!(date_to_days(epoch()), 0);
    }

    #[test]
    fn parquet_roundtrip_with_nulls() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.parquet");

        let dates = vec![
            NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
        ];
        let df = DataFrame::new(vec![
            date_column("timestamp", &dates).unwrap(),
            Column::new("symbol".into(), vec!["SPY", "SPY"]),
            Column::new("ret_1d".into(), vec![None, Some(0.01_f64)]),
        ])
        .unwrap();

        write_parquet_atomic(&df, &path).unwrap();
        let back = read_parquet(&path).unwrap();

        assert_eq!(date_values(&back, "timestamp").unwrap(), dates);
        assert_eq!(str_values(&back, "symbol").unwrap(), vec!["SPY", "SPY"]);
        assert_eq!(
            opt_f64_values(&back, "ret_1d").unwrap(),
            vec![None, Some(0.01)]
        );
    }

    #[test]
    fn read_missing_file_is_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_parquet(&dir.path().join("absent.parquet")).unwrap_err();
        assert!(matches!(err, DataError::MissingInput(_)));
    }
}
