//! Request/response shapes for the gateway.
//!
//! These are the fixed contracts the future model integration must fill in;
//! today the service behind them returns canned values.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Forecast horizon. Only daily horizons are defined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Horizon {
    #[serde(rename = "1d")]
    OneDay,
    #[serde(rename = "5d")]
    FiveDays,
}

impl Default for Horizon {
    fn default() -> Self {
        Self::OneDay
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ForecastRequest {
    pub symbol: String,
    pub as_of: DateTime<Utc>,
    #[serde(default)]
    pub horizon: Horizon,
}

#[derive(Debug, Clone, Serialize)]
pub struct PredictionPayload {
    pub horizon: Horizon,
    pub predicted_return: f64,
    pub predicted_volatility: f64,
    pub predicted_direction: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RiskPayload {
    pub var_95: f64,
    pub var_99: f64,
    pub expected_shortfall_95: f64,
    pub model_confidence: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelMetadata {
    pub model_name: String,
    pub model_version: String,
    pub trained_until: DateTime<Utc>,
    pub backtest_start: DateTime<Utc>,
    pub backtest_end: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ForecastResponse {
    pub symbol: String,
    pub as_of: DateTime<Utc>,
    pub prediction: PredictionPayload,
    pub risk: RiskPayload,
    pub model: ModelMetadata,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExplainRequest {
    pub symbol: String,
    pub as_of: DateTime<Utc>,
    #[serde(default)]
    pub horizon: Horizon,
}

#[derive(Debug, Clone, Serialize)]
pub struct DriverPayload {
    pub feature: String,
    pub contribution: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExplainResponse {
    pub symbol: String,
    pub as_of: DateTime<Utc>,
    pub summary: String,
    pub top_drivers: Vec<DriverPayload>,
    pub evidence: Vec<String>,
    pub model: ModelMetadata,
}
