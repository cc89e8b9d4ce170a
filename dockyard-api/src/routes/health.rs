use crate::dispatch::RouteRequest;
use crate::error::ApiResult;
use crate::state::AppState;
use axum::Json;
use chrono::Utc;
use dockyard_store::MigrationStatus;
use serde_json::{json, Value};

pub async fn health(_state: AppState, _req: RouteRequest) -> ApiResult<Json<Value>> {
    Ok(Json(json!({
        "status": "ok",
        "timestamp": Utc::now(),
    })))
}

pub async fn migration_status(state: AppState, _req: RouteRequest) -> ApiResult<Json<MigrationStatus>> {
    Ok(Json(state.store.migration_status().await?))
}
