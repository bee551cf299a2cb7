//! Service status, probes and cache metrics.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use chrono::Utc;
use copyr_core::copyright::supported_countries;
use serde_json::{Value, json};

use crate::AppState;
use crate::error::ApiResult;

pub async fn root() -> Json<Value> {
    Json(json!({"message": "Welcome to copyr.ai API", "version": env!("CARGO_PKG_VERSION")}))
}

pub async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "copyr.ai API",
        "environment": state.config.environment,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

/// GET /api/status
pub async fn api_status(State(state): State<AppState>) -> Json<Value> {
    let codes: Vec<&str> = supported_countries().iter().map(|c| c.code).collect();
    let sources = state.analyzer.supported_sources(None).unwrap_or_default();
    let mut services = serde_json::Map::new();
    services.insert("copyright_analyzer".into(), json!("ready"));
    for source in sources {
        services.insert(source.into(), json!("ready"));
    }
    Json(json!({
        "api": "operational",
        "services": services,
        "supported_countries": codes,
        "supported_work_types": ["literary", "musical"],
        "scheduler_enabled": state.config.scheduler_enabled,
        "timestamp": Utc::now().to_rfc3339(),
    }))
}

pub async fn liveness() -> Json<Value> {
    Json(json!({"status": "alive", "timestamp": Utc::now().to_rfc3339()}))
}

/// GET /api/health/readiness; 503 while the cache database is unreachable.
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match state.db.ping().await {
        Ok(()) => (StatusCode::OK, Json(json!({"status": "ready"}))),
        Err(e) => {
            tracing::warn!(error = %e, "readiness check failed");
            (StatusCode::SERVICE_UNAVAILABLE, Json(json!({"status": "not_ready", "reason": "database_unhealthy"})))
        }
    }
}

/// GET /api/metrics
pub async fn metrics(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let database = state.db.statistics().await?;
    Ok(Json(json!({
        "timestamp": Utc::now().to_rfc3339(),
        "database": database,
    })))
}
