use crate::dispatch::RouteRequest;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::Json;
use dockyard_store::{ContainerConfig, ValidationReport};
use serde_json::{json, Value};

pub async fn get(state: AppState, req: RouteRequest) -> ApiResult<Json<Value>> {
    let name = req.param(0);
    let config = state.store.container_config(name).await?;

    Ok(Json(json!({ "containerName": name, "config": config })))
}

pub async fn update(state: AppState, req: RouteRequest) -> ApiResult<Json<Value>> {
    let name = req.param(0);
    let config: ContainerConfig = req.json()?;

    let report = config.validate();
    if let Some(first) = report.errors.into_iter().next() {
        return Err(ApiError::invalid_field(&first.field, first.message));
    }

    state.store.update_container_config(name, &config).await?;

    Ok(Json(json!({
        "success": true,
        "config": config,
        "warnings": report.warnings,
    })))
}

pub async fn validate(_state: AppState, req: RouteRequest) -> ApiResult<Json<ValidationReport>> {
    let config: ContainerConfig = req.json()?;
    Ok(Json(config.validate()))
}

/// Compares against the demo configuration; the runtime never reports the
/// live one.
pub async fn diff(_state: AppState, req: RouteRequest) -> ApiResult<Json<Value>> {
    let proposed: ContainerConfig = req.json()?;
    let changes = ContainerConfig::demo().diff(&proposed);

    Ok(Json(json!({
        "hasChanges": !changes.is_empty(),
        "changes": changes,
    })))
}
