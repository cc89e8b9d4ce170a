use crate::dispatch::RouteRequest;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use crate::topology::{self, Graph, Positions};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

pub async fn graph(state: AppState, _req: RouteRequest) -> ApiResult<Json<Graph>> {
    let positions = topology::load_positions(state.blobs.as_ref()).await?;
    Ok(Json(Graph::demo().with_positions(&positions)))
}

pub async fn orphans(_state: AppState, _req: RouteRequest) -> ApiResult<Json<Value>> {
    let graph = Graph::demo();
    let orphans = graph.orphans();

    Ok(Json(json!({
        "count": orphans.len(),
        "orphans": orphans,
    })))
}

pub async fn positions(state: AppState, _req: RouteRequest) -> ApiResult<Json<Value>> {
    let positions = topology::load_positions(state.blobs.as_ref()).await?;
    Ok(Json(json!({ "positions": positions })))
}

#[derive(Debug, Deserialize)]
struct PositionsBody {
    positions: Option<Positions>,
}

pub async fn save_positions(state: AppState, req: RouteRequest) -> ApiResult<Json<Value>> {
    let body: PositionsBody = req.json()?;
    let positions = body
        .positions
        .ok_or_else(|| ApiError::invalid_field("positions", "positions is required"))?;

    topology::save_positions(state.blobs.as_ref(), &positions).await?;

    Ok(Json(json!({ "success": true, "positions": positions })))
}
