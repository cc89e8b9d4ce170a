//! Registry and audit data for the container console
//!
//! This crate owns the relational schema (containers, colors, jobs, webhooks,
//! snapshots, scheduled actions, migrations), the blob store that holds
//! snapshot payloads, and the domain types shared with the HTTP service.
//! It is consumed by dockyard-api but has no HTTP knowledge of its own.

pub mod blob;
pub mod config;
pub mod container;
pub mod cron;
pub mod db;
pub mod error;
pub mod job;
pub mod migration;
pub mod schedule;
pub mod snapshot;
pub mod store;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod webhook;

pub use blob::{BlobStore, FsBlobStore, MemoryBlobStore};
pub use config::{ConfigChange, ContainerConfig, FieldError, ValidationReport};
pub use container::{Container, NewContainer};
pub use error::{Result, StoreError};
pub use job::{Job, JobFilters, JobStats, JobStatus, NewJob};
pub use migration::MigrationStatus;
pub use schedule::{NewSchedule, Schedule, ScheduleStatus, ScheduleUpdate};
pub use snapshot::{NewSnapshot, Snapshot, SnapshotPayload, SnapshotStats};
pub use store::ConsoleStore;
pub use webhook::{NewWebhook, Webhook, WebhookUpdate};

use chrono::{DateTime, Utc};

/// Store timestamps are Unix seconds; out-of-range values collapse to the epoch.
pub(crate) fn from_timestamp(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_default()
}
