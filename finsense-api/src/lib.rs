//! FinSense API gateway — placeholder HTTP surface.
//!
//! Routes:
//! - `GET  /`                  service banner
//! - `GET  /monitoring/health` liveness check
//! - `GET  /forecast/ping`     forecast router liveness
//! - `POST /forecast`          stubbed forecast payload
//! - `GET  /explain/ping`      explain router liveness
//! - `POST /explain`           stubbed explanation payload
//!
//! Every POST response is hard-coded by [`service::ModelService`]; wiring
//! the trained model in is the known integration gap.

pub mod schemas;
pub mod service;

use axum::extract::{Request, State};
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use schemas::{ExplainRequest, ExplainResponse, ForecastRequest, ForecastResponse};
use serde_json::{json, Value};
use service::ModelService;
use std::sync::Arc;

pub fn router() -> Router {
    let service = Arc::new(ModelService::new());
    Router::new()
        .route("/", get(root))
        .route("/monitoring/health", get(health))
        .route("/forecast/ping", get(forecast_ping))
        .route("/forecast", post(create_forecast))
        .route("/explain/ping", get(explain_ping))
        .route("/explain", post(create_explanation))
        .layer(middleware::from_fn(log_requests))
        .with_state(service)
}

async fn log_requests(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let start = std::time::Instant::now();
    let response = next.run(req).await;
    log::info!(
        "{method} {path} -> {} in {:.1}ms",
        response.status(),
        start.elapsed().as_secs_f64() * 1000.0
    );
    response
}

async fn root() -> Json<Value> {
    Json(json!({"service": "finsense-api-gateway", "status": "ok"}))
}

async fn health() -> Json<Value> {
    Json(json!({"status": "healthy"}))
}

async fn forecast_ping() -> Json<Value> {
    Json(json!({"service": "forecast", "status": "ok"}))
}

async fn explain_ping() -> Json<Value> {
    Json(json!({"service": "explain", "status": "ok"}))
}

async fn create_forecast(
    State(service): State<Arc<ModelService>>,
    Json(request): Json<ForecastRequest>,
) -> Json<ForecastResponse> {
    log::info!("forecast request for {} ({:?})", request.symbol, request.horizon);
    Json(service.predict(&request))
}

async fn create_explanation(
    State(service): State<Arc<ModelService>>,
    Json(request): Json<ExplainRequest>,
) -> Json<ExplainResponse> {
    log::info!("explain request for {} ({:?})", request.symbol, request.horizon);
    Json(service.explain(&request))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use schemas::Horizon;

    #[test]
    fn router_builds() {
        let _ = router();
    }

    #[tokio::test]
    async fn forecast_handler_returns_stub_payload() {
        let service = Arc::new(ModelService::new());
        let request = ForecastRequest {
            symbol: "SPY".to_string(),
            as_of: Utc.with_ymd_and_hms(2026, 1, 15, 0, 0, 0).unwrap(),
            horizon: Horizon::OneDay,
        };
        let Json(resp) = create_forecast(State(service), Json(request)).await;
        assert_eq!(resp.symbol, "SPY");
        assert_eq!(resp.prediction.predicted_direction, "up");
        assert!(resp.risk.var_99 < resp.risk.var_95);
    }

    #[tokio::test]
    async fn explain_handler_echoes_symbol() {
        let service = Arc::new(ModelService::new());
        let request = ExplainRequest {
            symbol: "AAPL".to_string(),
            as_of: Utc::now(),
            horizon: Horizon::FiveDays,
        };
        let Json(resp) = create_explanation(State(service), Json(request)).await;
        assert_eq!(resp.symbol, "AAPL");
        assert!(resp.summary.contains("AAPL"));
    }
}
