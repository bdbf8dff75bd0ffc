use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::Redirect,
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use slack2doc_core::AppConfig;
use slack2doc_docs::document_url;

#[derive(Clone)]
pub struct HealthState {
    config: Arc<AppConfig>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub document: HealthCheck,
    pub monitored_channels: Vec<String>,
    pub checked_at: String,
}

pub fn router(config: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", get(redirect_to_document))
        .route("/health", get(health))
        .with_state(HealthState { config })
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let document = &state.config.document;

    let payload = HealthResponse {
        status: "ready",
        service: HealthCheck {
            status: "ready",
            detail: format!("listening for slack events on {}", state.config.slack.endpoint),
        },
        document: HealthCheck {
            status: "configured",
            detail: document_url(document.kind, &document.doc_id),
        },
        monitored_channels: state.config.slack.channels.iter().cloned().collect(),
        checked_at: Utc::now().to_rfc3339(),
    };

    (StatusCode::OK, Json(payload))
}

pub async fn redirect_to_document(State(state): State<HealthState>) -> Redirect {
    let document = &state.config.document;
    Redirect::temporary(&document_url(document.kind, &document.doc_id))
}
