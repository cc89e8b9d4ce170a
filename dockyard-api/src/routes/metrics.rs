use crate::dispatch::RouteRequest;
use crate::error::{ApiError, ApiResult};
use crate::metrics::{average, series, total, MetricsRange};
use crate::state::AppState;
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
struct RangeQuery {
    range: Option<String>,
}

fn parse_range(req: &RouteRequest) -> ApiResult<MetricsRange> {
    let query: RangeQuery = req.query()?;
    match query.range.as_deref() {
        None | Some("") => Ok(MetricsRange::default()),
        Some(range) => range
            .parse()
            .map_err(|message: String| ApiError::invalid_field("range", message)),
    }
}

pub async fn dashboard(_state: AppState, req: RouteRequest) -> ApiResult<Json<Value>> {
    let range = parse_range(&req)?;
    let now = Utc::now();

    let requests = series(range, now, 1200.0, 350.0);
    let errors = series(range, now, 6.0, 6.0);
    let cpu = series(range, now, 38.0, 18.0);
    let memory = series(range, now, 210.0, 60.0);

    let total_requests = total(&requests);
    let total_errors = total(&errors);
    let error_rate = if total_requests > 0.0 {
        (total_errors / total_requests * 10_000.0).round() / 100.0
    } else {
        0.0
    };

    Ok(Json(json!({
        "range": range,
        "series": {
            "requests": requests,
            "errors": errors,
            "cpu": cpu,
            "memory": memory,
        },
        "summary": {
            "totalRequests": total_requests,
            "totalErrors": total_errors,
            "errorRate": error_rate,
            "avgCpu": average(&cpu),
            "avgMemory": average(&memory),
        },
    })))
}

pub async fn container(_state: AppState, req: RouteRequest) -> ApiResult<Json<Value>> {
    let range = parse_range(&req)?;
    let now = Utc::now();

    let cpu = series(range, now, 24.0, 14.0);
    let memory = series(range, now, 128.0, 40.0);
    let requests = series(range, now, 240.0, 90.0);

    Ok(Json(json!({
        "containerName": req.param(0),
        "range": range,
        "series": {
            "cpu": cpu,
            "memory": memory,
            "requests": requests,
        },
        "summary": {
            "avgCpu": average(&cpu),
            "avgMemory": average(&memory),
            "totalRequests": total(&requests),
        },
    })))
}
