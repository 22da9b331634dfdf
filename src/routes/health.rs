//! Health check endpoints
//!
//! Kubernetes-style probes:
//! - /health, /healthz - Liveness (is the service running?)
//! - /ready, /readyz - Readiness (can the cache be reached?)
//!
//! Liveness always returns 200 while the process is up. Readiness round-trips
//! the cache, because a gateway that cannot reach its cache can neither
//! resolve credentials nor answer presence lookups — it degrades every client
//! to anonymous and should be taken out of rotation.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;

use crate::server::AppState;

/// Liveness/readiness response body
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall health status (true if service is running)
    pub healthy: bool,
    /// Service version
    pub version: &'static str,
    /// Operating mode
    pub mode: String,
    /// Node identifier
    pub node_id: String,
    /// Whether the credential/presence cache answered the probe
    pub cache_reachable: bool,
    /// Current timestamp
    pub timestamp: String,
}

fn build_health_response(state: &AppState, cache_reachable: bool) -> HealthResponse {
    HealthResponse {
        healthy: true,
        version: env!("CARGO_PKG_VERSION"),
        mode: if state.args.dev_mode {
            "development".to_string()
        } else {
            "production".to_string()
        },
        node_id: state.args.node_id.to_string(),
        cache_reachable,
        timestamp: chrono::Utc::now().to_rfc3339(),
    }
}

fn json_response<T: Serialize>(status: StatusCode, body: &T) -> Response<Full<Bytes>> {
    let body = serde_json::to_string(body)
        .unwrap_or_else(|_| r#"{"error":"Serialization failed"}"#.to_string());

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body)))
        .unwrap()
}

/// Handle liveness probe (/health, /healthz)
///
/// Always 200 while the process is running; the cache flag here is not
/// probed (liveness must stay cheap) and reports true optimistically.
pub fn health_check(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let response = build_health_response(&state, true);
    json_response(StatusCode::OK, &response)
}

/// Handle readiness probe (/ready, /readyz)
///
/// 200 only when the cache answers a round trip.
pub async fn readiness_check(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let cache_reachable = state.store.get("readiness:probe").await.is_ok();
    let response = build_health_response(&state, cache_reachable);

    let status = if cache_reachable {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    json_response(status, &response)
}

/// Version information for deployment verification
#[derive(Serialize)]
pub struct VersionResponse {
    /// Cargo package version
    pub version: &'static str,
    /// Git commit hash (short)
    pub commit: &'static str,
    /// Git commit hash (full)
    pub commit_full: &'static str,
    /// Build timestamp
    pub build_time: &'static str,
    /// Service name
    pub service: &'static str,
}

/// Handle version endpoint (/version)
pub fn version_info() -> Response<Full<Bytes>> {
    let response = VersionResponse {
        version: env!("CARGO_PKG_VERSION"),
        commit: option_env!("GIT_COMMIT_SHORT").unwrap_or("unknown"),
        commit_full: option_env!("GIT_COMMIT_FULL").unwrap_or("unknown"),
        build_time: option_env!("BUILD_TIMESTAMP").unwrap_or("unknown"),
        service: "switchboard",
    };

    json_response(StatusCode::OK, &response)
}

/// Runtime statistics for /status
#[derive(Serialize)]
pub struct StatusResponse {
    /// Live real-time connections on this node
    pub connections: usize,
    /// Configured connection capacity
    pub max_connections: usize,
    /// Whether the registry is refusing new upgrades
    pub at_capacity: bool,
}

/// Handle status endpoint (/status)
pub fn status_check(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let registry = state.gateway.registry();
    let response = StatusResponse {
        connections: registry.connection_count(),
        max_connections: state.args.max_connections,
        at_capacity: registry.is_at_capacity(),
    };

    json_response(StatusCode::OK, &response)
}
