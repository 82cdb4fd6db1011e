//! HTTP surface for the master operations
//!
//! A thin JSON router: one route per coordinator operation plus health and
//! status endpoints. All semantics live in [`MasterService`]; handlers only
//! translate requests and map errors to status codes.

use crate::common::Error;
use crate::master::segment::SegmentDescriptor;
use crate::master::service::MasterService;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub struct PutStartRequest {
    pub size: u64,
    #[serde(default = "default_replica_count")]
    pub replica_count: u32,
}

fn default_replica_count() -> u32 {
    1
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MountSegmentRequest {
    #[serde(default)]
    pub id: Option<String>,
    pub node_addr: String,
    pub capacity: u64,
}

fn error_response(err: Error) -> (StatusCode, Json<serde_json::Value>) {
    (
        err.to_http_status(),
        Json(json!({ "error": err.to_string() })),
    )
}

async fn get_replica_list(
    State(svc): State<Arc<MasterService>>,
    Path(key): Path<String>,
) -> impl IntoResponse {
    match svc.get_replica_list(&key) {
        Ok(replicas) => {
            let (size, target_replicas) = svc
                .describe_object(&key)
                .map(|(size, target, _)| (size, target))
                .unwrap_or((0, 0));
            (
                StatusCode::OK,
                Json(json!({
                    "replicas": replicas,
                    "size": size,
                    "target_replicas": target_replicas,
                })),
            )
        }
        Err(e) => error_response(e),
    }
}

async fn put_start(
    State(svc): State<Arc<MasterService>>,
    Path(key): Path<String>,
    Json(req): Json<PutStartRequest>,
) -> impl IntoResponse {
    match svc.put_start(&key, req.size, req.replica_count) {
        Ok(placements) => (StatusCode::OK, Json(json!({ "placements": placements }))),
        Err(e) => error_response(e),
    }
}

async fn put_end(
    State(svc): State<Arc<MasterService>>,
    Path(key): Path<String>,
) -> impl IntoResponse {
    match svc.put_end(&key) {
        Ok(()) => (StatusCode::OK, Json(json!({ "ok": true }))),
        Err(e) => error_response(e),
    }
}

async fn put_revoke(
    State(svc): State<Arc<MasterService>>,
    Path(key): Path<String>,
) -> impl IntoResponse {
    match svc.put_revoke(&key) {
        Ok(()) => (StatusCode::OK, Json(json!({ "ok": true }))),
        Err(e) => error_response(e),
    }
}

async fn remove(
    State(svc): State<Arc<MasterService>>,
    Path(key): Path<String>,
) -> impl IntoResponse {
    match svc.remove(&key) {
        Ok(()) => (StatusCode::OK, Json(json!({ "ok": true }))),
        Err(e) => error_response(e),
    }
}

async fn mount_segment(
    State(svc): State<Arc<MasterService>>,
    Json(req): Json<MountSegmentRequest>,
) -> impl IntoResponse {
    let desc = SegmentDescriptor {
        id: req.id,
        node_addr: req.node_addr,
        capacity: req.capacity,
    };
    match svc.mount_segment(desc) {
        Ok(id) => (StatusCode::OK, Json(json!({ "id": id }))),
        Err(e) => error_response(e),
    }
}

async fn unmount_segment(
    State(svc): State<Arc<MasterService>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match svc.unmount_segment(&id) {
        Ok(()) => (StatusCode::OK, Json(json!({ "ok": true }))),
        Err(e) => error_response(e),
    }
}

async fn list_segments(State(svc): State<Arc<MasterService>>) -> impl IntoResponse {
    Json(json!({
        "segments": svc.segments(),
        "stats": svc.registry_stats(),
    }))
}

async fn health(State(svc): State<Arc<MasterService>>) -> impl IntoResponse {
    let stats = svc.registry_stats();
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "segments": stats.segments,
        "objects": svc.object_count(),
        "gc_enabled": svc.config().enable_gc,
    }))
}

/// Build the router over a shared [`MasterService`].
pub fn create_router(svc: Arc<MasterService>) -> Router {
    Router::new()
        .route("/health", axum::routing::get(health))
        // Object operations
        .route("/objects/:key", axum::routing::get(get_replica_list))
        .route("/objects/:key", axum::routing::delete(remove))
        .route("/objects/:key/put_start", axum::routing::post(put_start))
        .route("/objects/:key/put_end", axum::routing::post(put_end))
        .route("/objects/:key/put_revoke", axum::routing::post(put_revoke))
        // Segment operations
        .route("/segments", axum::routing::post(mount_segment))
        .route("/segments", axum::routing::get(list_segments))
        .route("/segments/:id", axum::routing::delete(unmount_segment))
        .with_state(svc)
}
