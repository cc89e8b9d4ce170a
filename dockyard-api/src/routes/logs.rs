use super::required;
use crate::dispatch::RouteRequest;
use crate::error::{ApiError, ApiResult};
use crate::runtime::LogLine;
use crate::state::AppState;
use axum::{
    http::{header, HeaderValue},
    response::{IntoResponse, Response},
    Json,
};
use rand::Rng;
use serde::Deserialize;
use serde_json::{json, Map, Value};

const DEFAULT_LOG_LIMIT: usize = 100;
const MAX_LOG_LIMIT: usize = 1000;
const HTTP_METHODS: &[&str] = &["GET", "POST", "PUT", "PATCH", "DELETE", "HEAD", "OPTIONS"];

#[derive(Debug, Default, Deserialize)]
pub struct LogQuery {
    pub level: Option<String>,
    pub search: Option<String>,
    pub limit: Option<usize>,
}

impl LogQuery {
    fn limit(&self) -> usize {
        self.limit.unwrap_or(DEFAULT_LOG_LIMIT).clamp(1, MAX_LOG_LIMIT)
    }

    fn matches(&self, line: &LogLine) -> bool {
        let level_ok = self
            .level
            .as_deref()
            .filter(|l| !l.is_empty() && *l != "all")
            .map_or(true, |level| line.level.eq_ignore_ascii_case(level));

        let search_ok = self
            .search
            .as_deref()
            .filter(|s| !s.is_empty())
            .map_or(true, |needle| line.message.to_lowercase().contains(&needle.to_lowercase()));

        level_ok && search_ok
    }

    pub fn apply(&self, lines: Vec<LogLine>) -> Vec<LogLine> {
        lines
            .into_iter()
            .filter(|line| self.matches(line))
            .take(self.limit())
            .collect()
    }
}

pub async fn list(state: AppState, req: RouteRequest) -> ApiResult<Json<Value>> {
    let name = req.param(0);
    let query: LogQuery = req.query()?;
    let logs = query.apply(state.runtime.logs(name).await?);

    Ok(Json(json!({
        "containerName": name,
        "count": logs.len(),
        "logs": logs,
    })))
}

pub async fn clear(_state: AppState, req: RouteRequest) -> ApiResult<Json<Value>> {
    Ok(Json(json!({
        "success": true,
        "message": format!("Logs cleared for {}", req.param(0)),
    })))
}

pub async fn download(state: AppState, req: RouteRequest) -> ApiResult<Response> {
    let name = req.param(0);
    let query: LogQuery = req.query()?;
    let logs = query.apply(state.runtime.logs(name).await?);

    let mut text = logs.iter().map(LogLine::to_text).collect::<Vec<_>>().join("\n");
    text.push('\n');

    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{name}-logs.txt\""))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("text/plain; charset=utf-8")),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        text,
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
struct HttpTestBody {
    method: Option<String>,
    path: Option<String>,
    #[serde(default)]
    headers: Map<String, Value>,
    body: Option<Value>,
}

/// Echoes a simulated `200` for the request the user composed.
pub async fn http_test(_state: AppState, req: RouteRequest) -> ApiResult<Json<Value>> {
    let name = req.param(0);
    let body: HttpTestBody = req.json()?;

    let method = required(body.method, "method")?.to_uppercase();
    if !HTTP_METHODS.contains(&method.as_str()) {
        return Err(ApiError::invalid_field(
            "method",
            format!("method must be one of: {}", HTTP_METHODS.join(", ")),
        ));
    }

    let path = required(body.path, "path")?;
    if !path.starts_with('/') {
        return Err(ApiError::invalid_field("path", "path must start with '/'"));
    }

    let duration_ms: u64 = rand::rng().random_range(12..180);

    Ok(Json(json!({
        "success": true,
        "request": {
            "method": method,
            "path": path,
            "headers": body.headers,
            "body": body.body,
        },
        "response": {
            "status": 200,
            "statusText": "OK",
            "headers": { "content-type": "application/json", "x-container": name },
            "body": { "ok": true, "container": name, "path": path },
            "durationMs": duration_ms,
        },
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn line(level: &str, message: &str) -> LogLine {
        LogLine {
            timestamp: Utc::now(),
            level: level.to_string(),
            message: message.to_string(),
            instance_id: "svc-a-1".to_string(),
        }
    }

    #[test]
    fn test_filters_by_level_and_search() {
        let lines = vec![
            line("info", "GET /health 200"),
            line("error", "upstream connection reset"),
            line("ERROR", "Upstream timeout"),
        ];

        let query = LogQuery {
            level: Some("error".to_string()),
            search: Some("UPSTREAM".to_string()),
            limit: None,
        };
        assert_eq!(query.apply(lines.clone()).len(), 2);

        let all = LogQuery {
            level: Some("all".to_string()),
            ..Default::default()
        };
        assert_eq!(all.apply(lines).len(), 3);
    }

    #[test]
    fn test_limit_is_clamped() {
        let lines: Vec<LogLine> = (0..1500).map(|_| line("info", "x")).collect();

        assert_eq!(LogQuery::default().apply(lines.clone()).len(), DEFAULT_LOG_LIMIT);

        let too_many = LogQuery {
            limit: Some(5000),
            ..Default::default()
        };
        assert_eq!(too_many.apply(lines).len(), MAX_LOG_LIMIT);
    }
}
