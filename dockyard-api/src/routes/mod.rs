pub mod config;
pub mod containers;
pub mod health;
pub mod images;
pub mod jobs;
pub mod logs;
pub mod metrics;
pub mod schedules;
pub mod snapshots;
pub mod topology;
pub mod webhooks;

use crate::dispatch::{dispatch, handle_panic, RouteTable};
use crate::error::ApiError;
use crate::state::AppState;
use axum::Router;
use once_cell::sync::Lazy;
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};

/// The whole HTTP surface, in evaluation order.
pub static ROUTES: Lazy<RouteTable> = Lazy::new(route_table);

fn route_table() -> RouteTable {
    RouteTable::new()
        .get("/api/health", health::health)
        .get("/api/migrations/status", health::migration_status)
        // Containers
        .get("/api/containers", containers::list)
        .post("/api/containers/register", containers::register)
        .get("/api/containers/{name}", containers::get)
        .delete("/api/containers/{name}", containers::delete)
        .post("/api/containers/{name}/restart", containers::restart)
        .post("/api/containers/{name}/stop", containers::stop)
        .put("/api/containers/{name}/color", containers::set_color)
        .get("/api/containers/{name}/instances", containers::instances)
        .delete("/api/containers/{name}/instances/{id}", containers::delete_instance)
        .get("/api/containers/{name}/config", config::get)
        .put("/api/containers/{name}/config", config::update)
        .post("/api/containers/{name}/config/validate", config::validate)
        .post("/api/containers/{name}/config/diff", config::diff)
        .get("/api/containers/{name}/logs/download", logs::download)
        .get("/api/containers/{name}/logs", logs::list)
        .delete("/api/containers/{name}/logs", logs::clear)
        .post("/api/containers/{name}/http-test", logs::http_test)
        // Topology
        .get("/api/topology", topology::graph)
        .get("/api/topology/orphans", topology::orphans)
        .get("/api/topology/positions", topology::positions)
        .put("/api/topology/positions", topology::save_positions)
        // Metrics
        .get("/api/metrics/dashboard", metrics::dashboard)
        .get("/api/metrics/{name}", metrics::container)
        // Jobs
        .get("/api/jobs", jobs::list)
        .get("/api/jobs/stats", jobs::stats)
        .get("/api/jobs/{id}", jobs::get)
        .delete("/api/jobs/{id}", jobs::delete)
        .post("/api/jobs/{id}/cancel", jobs::cancel)
        .post("/api/jobs/{id}/retry", jobs::retry)
        // Webhooks
        .get("/api/webhooks", webhooks::list)
        .post("/api/webhooks", webhooks::create)
        .put("/api/webhooks/{id}", webhooks::update)
        .delete("/api/webhooks/{id}", webhooks::delete)
        .get("/api/webhooks/{id}/deliveries", webhooks::deliveries)
        .post("/api/webhooks/{id}/test", webhooks::test)
        // Snapshots
        .get("/api/snapshots", snapshots::list)
        .post("/api/snapshots", snapshots::create)
        .get("/api/snapshots/stats", snapshots::stats)
        .get("/api/snapshots/{id}", snapshots::get)
        .delete("/api/snapshots/{id}", snapshots::delete)
        .post("/api/snapshots/{id}/restore", snapshots::restore)
        // Schedules
        .get("/api/schedules", schedules::list)
        .post("/api/schedules", schedules::create)
        .get("/api/schedules/{id}", schedules::get)
        .put("/api/schedules/{id}", schedules::update)
        .delete("/api/schedules/{id}", schedules::delete)
        .get("/api/schedules/{id}/history", schedules::history)
        .post("/api/schedules/{id}/trigger", schedules::trigger)
        // Images
        .get("/api/images/{name}", images::info)
        .get("/api/images/{name}/rollouts", images::rollouts)
        .get("/api/images/{name}/builds", images::builds)
        .post("/api/images/{name}/rebuild", images::rebuild)
        .post("/api/images/{name}/rollback", images::rollback)
}

pub fn create_app(state: AppState) -> Router {
    Router::new()
        .fallback(dispatch)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Required, non-blank string field from a request body.
pub(crate) fn required(value: Option<String>, field: &str) -> Result<String, ApiError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::invalid_field(field, format!("{field} is required")))
}
