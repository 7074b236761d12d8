//! HTTP-API – Status, Health, Metriken und Audit-Log
//!
//! Reiner Lesezugriff auf den Matchmaking-Zustand, mit Ausnahme von
//! `POST /api/logs/clear`. Alle Antworten sind JSON, ausser `/metrics`
//! (Prometheus-Textformat).

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::{header, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use vocaline_signaling::SignalingState;

/// Gemeinsamer State aller Routen
pub type ApiState = Arc<SignalingState>;

/// Query-Parameter fuer `GET /api/logs`
#[derive(Debug, Default, Deserialize)]
pub struct LogsQuery {
    pub limit: Option<usize>,
}

/// Baut den Router inklusive Trace- und CORS-Layer
pub fn router(state: ApiState, cors_origins: &[String]) -> Router {
    // CORS konfigurieren: entweder spezifische Origins oder Any
    let cors = if cors_origins.is_empty() {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
            .allow_headers(tower_http::cors::Any)
    };

    Router::new()
        .route("/status", get(status))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/api/logs", get(logs_auflisten))
        .route("/api/logs/clear", post(logs_leeren))
        .route("/api/logs/stats", get(logs_statistik))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

/// GET /status – Anzahl verbundener, wartender Nutzer und aktiver Raeume
async fn status(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.status())
}

/// GET /health – Health-Check-Endpunkt
async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
            "uptime_seconds": state.uptime_sek(),
        })),
    )
}

/// GET /metrics – Prometheus-Textformat
async fn metrics(State(state): State<ApiState>) -> Response {
    match state.metriken().exportieren() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(fehler = %e, "Metriken konnten nicht exportiert werden");
            fehler_antwort(StatusCode::INTERNAL_SERVER_ERROR, "Metriken nicht verfuegbar")
        }
    }
}

/// GET /api/logs?limit=N – neueste Audit-Eintraege
async fn logs_auflisten(
    State(state): State<ApiState>,
    Query(query): Query<LogsQuery>,
) -> impl IntoResponse {
    let logs = state.audit_log().auflisten(query.limit);
    let total = state.audit_log().anzahl();
    Json(serde_json::json!({ "logs": logs, "total": total }))
}

/// POST /api/logs/clear
async fn logs_leeren(State(state): State<ApiState>) -> impl IntoResponse {
    state.audit_log().leeren();
    tracing::info!("Audit-Log per API geleert");
    Json(serde_json::json!({ "success": true }))
}

/// GET /api/logs/stats
async fn logs_statistik(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.audit_log().statistik())
}

fn fehler_antwort(code: StatusCode, nachricht: &str) -> Response {
    (
        code,
        Json(serde_json::json!({
            "error": {
                "code": code.as_u16(),
                "message": nachricht,
            }
        })),
    )
        .into_response()
}
