//! HTTP surface of the container console.
//!
//! Requests pass through the [`access`] gate, are matched against the
//! ordered table in [`routes`] and handled against the shared store. Runtime,
//! image registry and webhook delivery are stub seams with demo data.

pub mod access;
pub mod config;
pub mod delivery;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod registry;
pub mod routes;
pub mod runtime;
pub mod scanner;
pub mod state;
pub mod topology;

pub use access::{AccessDecision, AccessGate, Identity};
pub use config::Config;
pub use error::{ApiError, ApiResult};
pub use routes::create_app;
pub use scanner::start_schedule_scan;
pub use state::AppState;
