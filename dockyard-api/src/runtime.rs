//! Container runtime seam. The console has no live runtime connection, so
//! [`DemoRuntime`] generates plausible instance and log data.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
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

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogLine {
    pub timestamp: DateTime<Utc>,
    pub level: String,
    pub message: String,
    pub instance_id: String,
}

impl LogLine {
    /// One line of the plain-text download.
    pub fn to_text(&self) -> String {
        format!(
            "{} [{}] {}: {}",
            self.timestamp.to_rfc3339(),
            self.level.to_uppercase(),
            self.instance_id,
            self.message
        )
    }
}

#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn list_instances(&self, container: &str) -> anyhow::Result<Vec<Instance>>;

    async fn delete_instance(&self, container: &str, instance_id: &str) -> anyhow::Result<()>;

    /// Recent log lines, newest first.
    async fn logs(&self, container: &str) -> anyhow::Result<Vec<LogLine>>;
}

const LOCATIONS: &[&str] = &["iad", "fra", "sin"];
const DEMO_LOG_LINES: usize = 250;

const LOG_PATTERN: &[(&str, &str)] = &[
    ("info", "GET /api/items 200"),
    ("info", "POST /api/items 201"),
    ("debug", "cache lookup hit ratio 0.92"),
    ("info", "GET /health 200"),
    ("warn", "slow upstream response (1.8s)"),
    ("info", "GET /api/items/42 200"),
    ("error", "upstream connection reset"),
    ("debug", "gc pause 4ms"),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct DemoRuntime;

impl DemoRuntime {
    fn instance_ids(container: &str) -> Vec<String> {
        (1..=LOCATIONS.len()).map(|n| format!("{container}-{n}")).collect()
    }
}

#[async_trait]
impl ContainerRuntime for DemoRuntime {
    async fn list_instances(&self, container: &str) -> anyhow::Result<Vec<Instance>> {
        let mut rng = rand::rng();
        let now = Utc::now();

        let instances = Self::instance_ids(container)
            .into_iter()
            .zip(LOCATIONS)
            .enumerate()
            .map(|(i, (id, location))| Instance {
                id,
                status: "running".to_string(),
                location: location.to_string(),
                started_at: now - Duration::hours(6 * (i as i64 + 1)),
                cpu_percent: (rng.random_range(2.0..65.0_f64) * 10.0).round() / 10.0,
                memory_mb: rng.random_range(96..480),
                requests_per_minute: rng.random_range(20..1500),
            })
            .collect();

        Ok(instances)
    }

    async fn delete_instance(&self, container: &str, instance_id: &str) -> anyhow::Result<()> {
        tracing::info!(container, instance_id, "Instance delete requested (demo runtime)");
        Ok(())
    }

    async fn logs(&self, container: &str) -> anyhow::Result<Vec<LogLine>> {
        let now = Utc::now();
        let ids = Self::instance_ids(container);

        let lines = (0..DEMO_LOG_LINES)
            .map(|i| {
                let (level, message) = LOG_PATTERN[i % LOG_PATTERN.len()];
                LogLine {
                    timestamp: now - Duration::seconds(15 * i as i64),
                    level: level.to_string(),
                    message: message.to_string(),
                    instance_id: ids[i % ids.len()].clone(),
                }
            })
            .collect();

        Ok(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_demo_logs_are_newest_first() {
        let lines = DemoRuntime.logs("svc-a").await.unwrap();
        assert_eq!(lines.len(), DEMO_LOG_LINES);
        assert!(lines.windows(2).all(|w| w[0].timestamp >= w[1].timestamp));
        assert!(lines.iter().any(|l| l.level == "error"));
        assert!(lines[0].to_text().contains("[INFO] svc-a-1"));
    }

    #[tokio::test]
    async fn test_demo_instances() {
        let instances = DemoRuntime.list_instances("svc-a").await.unwrap();
        assert_eq!(instances.len(), 3);
        assert_eq!(instances[0].id, "svc-a-1");
        assert!(instances.iter().all(|i| i.status == "running"));
    }
}
