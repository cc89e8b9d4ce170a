//! Ordered route table and the single entry point that feeds it.
//!
//! Every request lands in [`dispatch`]: preflight short-circuits, the access
//! gate runs, then the table is scanned in registration order and the first
//! entry whose method and path both match handles the request.

use crate::access::{AccessDecision, Identity};
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::{
    body::{to_bytes, Bytes},
    extract::{Query, Request, State},
    http::{header, HeaderMap, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::json;
use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tracing::debug;

const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

pub type HandlerFuture = Pin<Box<dyn Future<Output = ApiResult<Response>> + Send>>;
pub type Handler = Arc<dyn Fn(AppState, RouteRequest) -> HandlerFuture + Send + Sync>;

/// What a handler sees of the request once it has been routed.
pub struct RouteRequest {
    /// Percent-decoded path captures, in template order
    pub params: Vec<String>,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// `None` on routes the gate does not cover
    pub identity: Option<Identity>,
}

impl RouteRequest {
    pub fn param(&self, index: usize) -> &str {
        self.params.get(index).map(String::as_str).unwrap_or_default()
    }

    /// Parse the body as JSON; an empty body reads as `{}`.
    pub fn json<T: DeserializeOwned>(&self) -> ApiResult<T> {
        let body: &[u8] = if self.body.iter().all(u8::is_ascii_whitespace) {
            b"{}"
        } else {
            &self.body
        };

        serde_json::from_slice(body).map_err(|e| ApiError::bad_request(format!("Invalid JSON body: {e}")))
    }

    pub fn query<T: DeserializeOwned>(&self) -> ApiResult<T> {
        Query::<T>::try_from_uri(&self.uri)
            .map(|Query(q)| q)
            .map_err(|e| ApiError::bad_request(e.body_text()))
    }

    pub fn created_by(&self) -> Option<&str> {
        self.identity.as_ref().map(|identity| identity.email.as_str())
    }
}

enum PathPattern {
    Exact(String),
    Captures(Regex),
}

impl PathPattern {
    /// `{name}` segments become single-segment captures; everything else is literal.
    fn compile(template: &str) -> Self {
        if !template.contains('{') {
            return PathPattern::Exact(template.to_string());
        }

        let body = template
            .split('/')
            .map(|segment| {
                if segment.starts_with('{') && segment.ends_with('}') {
                    "([^/]+)".to_string()
                } else {
                    regex::escape(segment)
                }
            })
            .collect::<Vec<_>>()
            .join("/");

        let regex = Regex::new(&format!("^{body}$")).expect("route template should compile - static pattern");
        PathPattern::Captures(regex)
    }

    fn matches(&self, path: &str) -> Option<Vec<String>> {
        match self {
            PathPattern::Exact(exact) => (exact == path).then(Vec::new),
            PathPattern::Captures(regex) => {
                let captures = regex.captures(path)?;
                captures
                    .iter()
                    .skip(1)
                    .map(|m| {
                        let raw = m?.as_str();
                        Some(
                            urlencoding::decode(raw)
                                .map(|decoded| decoded.into_owned())
                                .unwrap_or_else(|_| raw.to_string()),
                        )
                    })
                    .collect()
            }
        }
    }
}

struct Route {
    method: Method,
    template: &'static str,
    pattern: PathPattern,
    handler: Handler,
}

/// Routes in evaluation order. Register specific templates before the
/// general ones that would also match them.
#[derive(Default)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route<F, Fut, R>(mut self, method: Method, template: &'static str, handler: F) -> Self
    where
        F: Fn(AppState, RouteRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApiResult<R>> + Send + 'static,
        R: IntoResponse,
    {
        let handler: Handler = Arc::new(move |state: AppState, request: RouteRequest| -> HandlerFuture {
            let fut = handler(state, request);
            Box::pin(async move { fut.await.map(IntoResponse::into_response) })
        });

        self.routes.push(Route {
            method,
            template,
            pattern: PathPattern::compile(template),
            handler,
        });
        self
    }

    pub fn get<F, Fut, R>(self, template: &'static str, handler: F) -> Self
    where
        F: Fn(AppState, RouteRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApiResult<R>> + Send + 'static,
        R: IntoResponse,
    {
        self.route(Method::GET, template, handler)
    }

    pub fn post<F, Fut, R>(self, template: &'static str, handler: F) -> Self
    where
        F: Fn(AppState, RouteRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApiResult<R>> + Send + 'static,
        R: IntoResponse,
    {
        self.route(Method::POST, template, handler)
    }

    pub fn put<F, Fut, R>(self, template: &'static str, handler: F) -> Self
    where
        F: Fn(AppState, RouteRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApiResult<R>> + Send + 'static,
        R: IntoResponse,
    {
        self.route(Method::PUT, template, handler)
    }

    pub fn delete<F, Fut, R>(self, template: &'static str, handler: F) -> Self
    where
        F: Fn(AppState, RouteRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ApiResult<R>> + Send + 'static,
        R: IntoResponse,
    {
        self.route(Method::DELETE, template, handler)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// First entry matching both method and path, with its decoded captures.
    pub fn find(&self, method: &Method, path: &str) -> Option<(&'static str, Handler, Vec<String>)> {
        self.routes
            .iter()
            .filter(|route| route.method == *method)
            .find_map(|route| {
                route
                    .pattern
                    .matches(path)
                    .map(|params| (route.template, Arc::clone(&route.handler), params))
            })
    }
}

/// Requests the access gate never sees.
fn is_public(method: &Method, path: &str) -> bool {
    *method == Method::GET && path == "/api/health"
}

pub async fn dispatch(State(state): State<AppState>, request: Request) -> Response {
    let mut response = route_request(state, request).await;
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    response
}

async fn route_request(state: AppState, request: Request) -> Response {
    let (parts, body) = request.into_parts();

    if parts.method == Method::OPTIONS {
        return StatusCode::NO_CONTENT.into_response();
    }

    let path = parts.uri.path().to_string();

    let identity = if is_public(&parts.method, &path) {
        None
    } else {
        match state.gate.check(&parts.headers).await {
            AccessDecision::Allow(identity) => Some(identity),
            AccessDecision::Deny(reason) => {
                debug!(%path, %reason, "Access denied");
                return ApiError::Unauthorized(reason.to_string()).into_response();
            }
        }
    };

    let Some((template, handler, params)) = crate::routes::ROUTES.find(&parts.method, &path) else {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "Not found", "path": path })),
        )
            .into_response();
    };

    let body = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => return ApiError::bad_request(format!("Failed to read request body: {e}")).into_response(),
    };

    debug!(method = %parts.method, route = template, "Dispatching");

    let request = RouteRequest {
        params,
        uri: parts.uri,
        headers: parts.headers,
        body,
        identity,
    };

    match handler(state, request).await {
        Ok(response) => response,
        Err(e) => e.into_response(),
    }
}

/// Converts a handler panic into the standard 500 envelope.
pub fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let message = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "Unknown panic".to_string()
    };

    tracing::error!(error = %message, "Handler panicked");

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Internal server error", "message": message })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_pattern() {
        let pattern = PathPattern::compile("/api/jobs/stats");
        assert_eq!(pattern.matches("/api/jobs/stats"), Some(vec![]));
        assert_eq!(pattern.matches("/api/jobs/stats/"), None);
    }

    #[test]
    fn test_capture_pattern_decodes_segments() {
        let pattern = PathPattern::compile("/api/containers/{name}/instances/{id}");
        assert_eq!(
            pattern.matches("/api/containers/svc%20a/instances/i-1"),
            Some(vec!["svc a".to_string(), "i-1".to_string()])
        );
        assert_eq!(pattern.matches("/api/containers/a/b/instances/i-1"), None);
    }

    #[test]
    fn test_literal_segments_are_escaped() {
        let pattern = PathPattern::compile("/api/v1.0/{name}");
        assert!(pattern.matches("/api/v1.0/x").is_some());
        assert!(pattern.matches("/api/v1x0/x").is_none());
    }

    async fn first(_: AppState, _: RouteRequest) -> ApiResult<&'static str> {
        Ok("first")
    }

    async fn second(_: AppState, _: RouteRequest) -> ApiResult<&'static str> {
        Ok("second")
    }

    #[test]
    fn test_first_match_wins() {
        let table = RouteTable::new()
            .get("/api/jobs/stats", first)
            .get("/api/jobs/{id}", second)
            .post("/api/jobs/{id}", first);

        let (template, _, params) = table.find(&Method::GET, "/api/jobs/stats").unwrap();
        assert_eq!(template, "/api/jobs/stats");
        assert!(params.is_empty());

        let (template, _, params) = table.find(&Method::GET, "/api/jobs/abc").unwrap();
        assert_eq!(template, "/api/jobs/{id}");
        assert_eq!(params, vec!["abc".to_string()]);

        assert!(table.find(&Method::PUT, "/api/jobs/abc").is_none());
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn test_public_routes() {
        assert!(is_public(&Method::GET, "/api/health"));
        assert!(!is_public(&Method::POST, "/api/health"));
        assert!(!is_public(&Method::GET, "/api/containers"));
    }
}
