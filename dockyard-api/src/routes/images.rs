use super::required;
use crate::dispatch::RouteRequest;
use crate::error::ApiResult;
use crate::state::AppState;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

pub async fn info(state: AppState, req: RouteRequest) -> ApiResult<Json<Value>> {
    let image = state.images.image_info(req.param(0)).await?;
    Ok(Json(json!({ "image": image })))
}

pub async fn rollouts(state: AppState, req: RouteRequest) -> ApiResult<Json<Value>> {
    let rollouts = state.images.rollouts(req.param(0)).await?;

    Ok(Json(json!({
        "count": rollouts.len(),
        "rollouts": rollouts,
    })))
}

pub async fn builds(state: AppState, req: RouteRequest) -> ApiResult<Json<Value>> {
    let builds = state.images.builds(req.param(0)).await?;

    Ok(Json(json!({
        "count": builds.len(),
        "builds": builds,
    })))
}

pub async fn rebuild(state: AppState, req: RouteRequest) -> ApiResult<Json<Value>> {
    let name = req.param(0);
    let build = state.images.rebuild(name).await?;

    Ok(Json(json!({
        "success": true,
        "message": format!("Rebuild of {name} queued"),
        "build": build,
    })))
}

#[derive(Debug, Deserialize)]
struct RollbackBody {
    version: Option<String>,
}

pub async fn rollback(state: AppState, req: RouteRequest) -> ApiResult<Json<Value>> {
    let name = req.param(0);
    let body: RollbackBody = req.json()?;
    let version = required(body.version, "version")?;

    let rollout = state.images.rollback(name, &version).await?;

    Ok(Json(json!({
        "success": true,
        "message": format!("Rolling {name} back to {version}"),
        "rollout": rollout,
    })))
}
