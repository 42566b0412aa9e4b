//! VitalRisk serving facade
//!
//! An axum router over a shared [`Scorer`]: `GET /health` and
//! `POST /predict`. The scorer is loaded once at startup and shared by every
//! request without locking.

pub mod inference;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};
use vitalrisk_core::errors::ErrorKind;
use vitalrisk_core::features::{BP_DIASTOLIC, BP_SYSTOLIC, PULSE_PRESSURE};
use vitalrisk_core::{payload_from_value, AgeGroup, Decision, Payload, RiskError, Scorer};

pub use inference::{exit_code, render_outcome, run_prediction, PredictOutcome, PredictRequest};

#[derive(Clone)]
pub struct AppState {
    scorer: Arc<Scorer>,
}

impl AppState {
    pub fn new(scorer: Arc<Scorer>) -> Self {
        Self { scorer }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct HealthResponse {
    pub ok: bool,
}

/// Body of a successful `/predict`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PredictResponse {
    pub p_flag: f64,
    pub pred_flag: u8,
    pub threshold: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age_group: Option<AgeGroup>,
    pub reasons: Vec<String>,
    pub model_version: String,
}

impl From<Decision> for PredictResponse {
    fn from(decision: Decision) -> Self {
        Self {
            p_flag: decision.risk_probability,
            pred_flag: decision.pred,
            threshold: decision.threshold,
            age_group: decision.age_group,
            reasons: decision.reasons,
            model_version: decision.model_version,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new<S: Into<String>>(status: StatusCode, message: S) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl From<RiskError> for ApiError {
    fn from(err: RiskError) -> Self {
        let status = match err.kind() {
            ErrorKind::InputValidation => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorKind::Configuration | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self::new(status, err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let payload = Json(ErrorResponse {
            error: self.message,
        });
        (self.status, payload).into_response()
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handle_health))
        .route("/predict", post(handle_predict))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse { ok: true })
}

async fn handle_predict(
    State(state): State<AppState>,
    body: std::result::Result<Json<Value>, JsonRejection>,
) -> std::result::Result<Json<PredictResponse>, ApiError> {
    let Json(value) = body?;
    let payload = payload_from_value(value)?;
    match state.scorer.score(&payload) {
        Ok(decision) => {
            debug!(p = decision.risk_probability, pred = decision.pred, "predict");
            Ok(Json(decision.into()))
        }
        Err(err) => {
            warn!("predict rejected: {err}");
            Err(err.into())
        }
    }
}

/// Representative payload for `feature_names`, written with the serving
/// spellings (`systolic_bp`, `spo2_pct`, ...) so it exercises reconciliation.
pub fn example_payload(feature_names: &[String]) -> Payload {
    let has = |name: &str| feature_names.iter().any(|f| f == name);
    let mut payload = Map::new();
    for name in feature_names {
        let (key, value): (&str, Value) = match name.as_str() {
            "age_years" => ("age_years", 72.into()),
            "bp_systolic" => ("systolic_bp", 150.into()),
            "bp_diastolic" => ("diastolic_bp", 92.into()),
            PULSE_PRESSURE if has(BP_SYSTOLIC) && has(BP_DIASTOLIC) => continue,
            PULSE_PRESSURE => (PULSE_PRESSURE, 58.into()),
            "heart_rate" => ("heart_rate", 104.into()),
            "respiratory_rate" => ("resp_rate", 22.into()),
            "temperature" => ("temp_f", 100.2.into()),
            "oxygen_saturation" => ("spo2_pct", 93.into()),
            "pain_level" => ("pain_0_10", 4.into()),
            "commits_7d" => ("commits_7d", 4.into()),
            "prs_7d" => ("prs_7d", 1.into()),
            "issues_7d" => ("issues_7d", 6.into()),
            "reviews_7d" => ("reviews_7d", 2.into()),
            "active_days_14d" => ("active_days_14d", 3.into()),
            "repo_age_days" => ("repo_age_days", 420.into()),
            other => (other, 0.into()),
        };
        payload.insert(key.to_string(), value);
    }
    payload
}

/// Serve `state` on `addr` until Ctrl-C.
pub async fn serve(state: AppState, addr: &str) -> Result<()> {
    let app = build_router(state);
    let listener = bind_listener(addr).await?;
    info!("VitalRisk service listening on {}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server terminated unexpectedly")
}

async fn bind_listener(addr: &str) -> Result<tokio::net::TcpListener> {
    if let Ok(socket_addr) = addr.parse::<SocketAddr>() {
        tokio::net::TcpListener::bind(socket_addr)
            .await
            .with_context(|| format!("failed to bind listener on {socket_addr}"))
    } else {
        tokio::net::TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind listener on {addr}"))
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to listen for shutdown signal: {err}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
