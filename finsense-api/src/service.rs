//! Stub model service.
//!
//! Returns canned forecast and explanation payloads with the contract's
//! shape. The real integration will load the trained ensemble and the
//! persisted attributions; until then every number here is a placeholder.

use crate::schemas::{
    DriverPayload, ExplainRequest, ExplainResponse, ForecastRequest, ForecastResponse,
    ModelMetadata, PredictionPayload, RiskPayload,
};
use chrono::{DateTime, Duration, TimeZone, Utc};

pub struct ModelService {
    model_name: String,
    model_version: String,
    trained_until: DateTime<Utc>,
}

impl ModelService {
    pub fn new() -> Self {
        Self {
            model_name: "dummy_model".to_string(),
            model_version: "v0.1.0".to_string(),
            trained_until: Utc.with_ymd_and_hms(2024, 12, 31, 0, 0, 0).unwrap(),
        }
    }

    fn metadata(&self) -> ModelMetadata {
        let now = Utc::now();
        ModelMetadata {
            model_name: self.model_name.clone(),
            model_version: self.model_version.clone(),
            trained_until: self.trained_until,
            backtest_start: now - Duration::days(365),
            backtest_end: now - Duration::days(1),
        }
    }

    pub fn predict(&self, req: &ForecastRequest) -> ForecastResponse {
        ForecastResponse {
            symbol: req.symbol.clone(),
            as_of: req.as_of,
            prediction: PredictionPayload {
                horizon: req.horizon,
                predicted_return: 0.012,
                predicted_volatility: 0.035,
                predicted_direction: "up".to_string(),
            },
            risk: RiskPayload {
                var_95: -0.04,
                var_99: -0.07,
                expected_shortfall_95: -0.05,
                model_confidence: 0.82,
            },
            model: self.metadata(),
        }
    }

    pub fn explain(&self, req: &ExplainRequest) -> ExplainResponse {
        ExplainResponse {
            symbol: req.symbol.clone(),
            as_of: req.as_of,
            summary: format!(
                "Placeholder explanation for {}: momentum and volume pressure dominate.",
                req.symbol
            ),
            top_drivers: vec![
                DriverPayload {
                    feature: "ret_5d".to_string(),
                    contribution: 0.006,
                },
                DriverPayload {
                    feature: "vol_zscore".to_string(),
                    contribution: 0.004,
                },
                DriverPayload {
                    feature: "vol_20d".to_string(),
                    contribution: -0.002,
                },
            ],
            evidence: vec!["attribution table: processed/features/attributions.parquet".to_string()],
            model: self.metadata(),
        }
    }
}

impl Default for ModelService {
    fn default() -> Self {
        Self::new()
    }
}
