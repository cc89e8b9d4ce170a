//! Response shapes the console pages consume that have no counterpart in
//! the store crate. Store-backed records (containers, jobs, snapshots,
//! schedules, webhooks) are re-used from `dockyard_store` directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Health {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

/// Result of an action endpoint that records a job.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ActionOutcome {
    pub success: bool,
    pub message: String,
    pub job_id: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Instance {
    pub id: String,
    pub status: String,
    pub location: String,
    pub started_at: DateTime<Utc>,
    pub cpu_percent: f64,
    pub memory_mb: u64,
    pub requests_per_minute: u64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

pub type Positions = BTreeMap<String, Position>;

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TopologyNode {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub label: String,
    pub status: String,
    #[serde(default)]
    pub position: Option<Position>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TopologyEdge {
    pub id: String,
    pub source: String,
    pub target: String,
    pub binding_type: String,
    pub binding_name: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct TopologyGraph {
    pub nodes: Vec<TopologyNode>,
    pub edges: Vec<TopologyEdge>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct MetricsPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Dashboard or per-container metrics. Series and summary keys differ
/// between the two, so both are kept as maps.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MetricsReport {
    #[serde(default)]
    pub container_name: Option<String>,
    pub range: String,
    pub series: BTreeMap<String, Vec<MetricsPoint>>,
    pub summary: BTreeMap<String, f64>,
}

impl MetricsReport {
    pub fn series(&self, name: &str) -> &[MetricsPoint] {
        self.series.get(name).map(Vec::as_slice).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct JobPage {
    pub count: usize,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
    pub jobs: Vec<dockyard_store::Job>,
}

/// Filters for the jobs page; unset fields are left off the query string.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobQuery {
    pub status: Option<String>,
    pub container: Option<String>,
    pub operation: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl JobQuery {
    pub(crate) fn params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(status) = &self.status {
            params.push(("status", status.clone()));
        }
        if let Some(container) = &self.container {
            params.push(("container", container.clone()));
        }
        if let Some(operation) = &self.operation {
            params.push(("operation", operation.clone()));
        }
        if let Some(limit) = self.limit {
            params.push(("limit", limit.to_string()));
        }
        if let Some(offset) = self.offset {
            params.push(("offset", offset.to_string()));
        }
        params
    }
}

/// A snapshot record together with the configuration held in its blob.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct SnapshotDetail {
    #[serde(flatten)]
    pub snapshot: dockyard_store::Snapshot,
    pub config: dockyard_store::ContainerConfig,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RestoreOutcome {
    pub success: bool,
    pub dry_run: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub backup_snapshot_id: Option<String>,
    pub has_changes: bool,
    pub changes: Vec<dockyard_store::ConfigChange>,
}
