/// Health check endpoint
///
/// Reports database connectivity and, when a cache is configured, whether
/// Redis answers a PING.
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
///
/// # Response
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "database": "connected",
///   "cache": "disabled"
/// }
/// ```

use crate::app::AppState;
use axum::{extract::State, Json};
use keystone_shared::db::pool::health_check as database_health;
use serde::{Deserialize, Serialize};

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `healthy` or `degraded`
    pub status: String,

    /// Application version
    pub version: String,

    /// `connected` or `disconnected`
    pub database: String,

    /// `connected`, `disconnected` or `disabled`
    pub cache: String,
}

/// Health check handler
///
/// Always answers 200; a dead database only degrades the status. The cache
/// is optional and never degrades it.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match database_health(&state.db).await {
        Ok(()) => "connected",
        Err(e) => {
            tracing::warn!(error = %e, "Health check could not reach the database");
            "disconnected"
        }
    };

    let cache = match &state.cache {
        None => "disabled",
        Some(cache) if cache.ping().await => "connected",
        Some(_) => "disconnected",
    };

    Json(HealthResponse {
        status: if database == "connected" { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: database.to_string(),
        cache: cache.to_string(),
    })
}
