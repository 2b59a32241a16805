// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::state::AppState;

/// Health check response with individual component status.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReadyResponse {
    /// Overall health status ("ok" or "degraded").
    pub status: String,
    /// Individual health checks and their results.
    pub checks: HealthChecks,
}

/// Individual health check results.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthChecks {
    /// Whether the service process is running.
    pub service: String,
    /// Upload directory writable.
    pub upload_dir: String,
    /// Metadata database readable.
    pub database: String,
    /// Google signing keys status.
    /// Only present when ID tokens are verified against JWKS.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwks: Option<String>,
}

/// Simple health check response for liveness probes.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

fn status_label(ok: bool) -> String {
    if ok { "ok" } else { "unavailable" }.to_string()
}

async fn check_upload_dir(state: &AppState) -> String {
    let files = state.files.clone();
    let ok = tokio::task::spawn_blocking(move || files.health_check())
        .await
        .map(|r| r.is_ok())
        .unwrap_or(false);
    status_label(ok)
}

async fn check_database(state: &AppState) -> String {
    let db = state.db.clone();
    let ok = tokio::task::spawn_blocking(move || db.health_check())
        .await
        .map(|r| r.is_ok())
        .unwrap_or(false);
    status_label(ok)
}

/// Check if Google's signing keys are reachable (production auth mode).
async fn check_jwks(state: &AppState) -> Option<String> {
    let jwks = state.auth_config.verifier.jwks()?;
    if jwks.is_cached().await {
        return Some("ok".to_string());
    }
    Some(status_label(jwks.refresh().await.is_ok()))
}

/// Health check endpoint handler.
///
/// Returns 200 if all checks pass, 503 if any check fails.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = ReadyResponse),
        (status = 503, description = "Service is unhealthy", body = ReadyResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let upload_dir = check_upload_dir(&state).await;
    let database = check_database(&state).await;
    let jwks = check_jwks(&state).await;

    let all_ok = upload_dir == "ok"
        && database == "ok"
        && jwks.as_deref().map(|s| s == "ok").unwrap_or(true);

    let response = ReadyResponse {
        status: if all_ok { "ok" } else { "degraded" }.to_string(),
        checks: HealthChecks {
            service: "ok".to_string(),
            upload_dir,
            database,
            jwks,
        },
    };

    let status = if all_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response))
}

/// Liveness probe handler.
///
/// Always returns 200 if the process is running.
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "Health",
    responses(
        (status = 200, description = "Service is alive", body = HealthResponse)
    )
)]
pub async fn liveness() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Readiness probe handler.
///
/// Returns 200 only if storage and database are usable.
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "Health",
    responses(
        (status = 200, description = "Service is ready", body = ReadyResponse),
        (status = 503, description = "Service is not ready", body = ReadyResponse)
    )
)]
pub async fn readiness(state: State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    health(state).await
}
