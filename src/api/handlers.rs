use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use std::collections::HashMap;

use crate::core::metrics;
use crate::core::state::AppState;
use crate::repositories;
use crate::schemas::{HealthResponse, RootResponse};

pub(crate) async fn root(State(state): State<AppState>) -> Json<RootResponse> {
    let api = state.settings().api();
    let response = RootResponse {
        message: api.project_name.clone(),
        version: api.version.clone(),
        api_prefix: api.api_v1_str.clone(),
    };

    Json(response)
}

/// `degraded` means Postgres answers but migrations have not run.
pub(crate) async fn healthz(State(state): State<AppState>) -> Json<HealthResponse> {
    let (status, database) = match repositories::health::schema_ready(state.db()).await {
        Ok(true) => ("healthy", "healthy".to_string()),
        Ok(false) => ("degraded", "schema missing".to_string()),
        Err(err) => {
            tracing::warn!(error = %err, "Health probe could not reach the database");
            ("unhealthy", format!("unhealthy: {err}"))
        }
    };

    Json(HealthResponse {
        service: "exam-gate".to_string(),
        status: status.to_string(),
        components: HashMap::from([("database".to_string(), database)]),
    })
}

pub(crate) async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    if !state.settings().telemetry().prometheus_enabled {
        return StatusCode::NOT_FOUND.into_response();
    }

    match metrics::render() {
        Some(body) => ([(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")], body)
            .into_response(),
        None => StatusCode::SERVICE_UNAVAILABLE.into_response(),
    }
}
