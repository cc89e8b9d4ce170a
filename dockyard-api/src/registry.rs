//! Image registry seam with a fixed-data demo implementation.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageInfo {
    pub name: String,
    pub repository: String,
    pub tag: String,
    pub digest: String,
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rollout {
    pub id: String,
    pub version: String,
    pub status: String,
    pub progress: u8,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Build {
    pub id: String,
    pub version: String,
    pub status: String,
    pub trigger: String,
    pub started_at: DateTime<Utc>,
    pub duration_seconds: Option<u64>,
}

#[async_trait]
pub trait ImageRegistry: Send + Sync {
    async fn image_info(&self, name: &str) -> anyhow::Result<ImageInfo>;
    async fn rollouts(&self, name: &str) -> anyhow::Result<Vec<Rollout>>;
    async fn builds(&self, name: &str) -> anyhow::Result<Vec<Build>>;
    async fn rebuild(&self, name: &str) -> anyhow::Result<Build>;
    async fn rollback(&self, name: &str, version: &str) -> anyhow::Result<Rollout>;
}

const DEMO_VERSIONS: &[&str] = &["v1.4.2", "v1.4.1", "v1.4.0"];

#[derive(Debug, Clone, Copy, Default)]
pub struct DemoRegistry;

#[async_trait]
impl ImageRegistry for DemoRegistry {
    async fn image_info(&self, name: &str) -> anyhow::Result<ImageInfo> {
        Ok(ImageInfo {
            name: name.to_string(),
            repository: format!("registry.example.com/{name}"),
            tag: DEMO_VERSIONS[0].to_string(),
            digest: "sha256:4f1c9a7e2b3d5f60718293a4b5c6d7e8f90a1b2c3d4e5f60718293a4b5c6d7e8".to_string(),
            size_bytes: 48_213_504,
            created_at: Utc::now() - Duration::days(2),
        })
    }

    async fn rollouts(&self, _name: &str) -> anyhow::Result<Vec<Rollout>> {
        let now = Utc::now();

        Ok(DEMO_VERSIONS
            .iter()
            .enumerate()
            .map(|(i, version)| {
                let started_at = now - Duration::days(2 + 5 * i as i64);
                Rollout {
                    id: format!("rollout-{}", DEMO_VERSIONS.len() - i),
                    version: version.to_string(),
                    status: "completed".to_string(),
                    progress: 100,
                    started_at,
                    completed_at: Some(started_at + Duration::minutes(4)),
                }
            })
            .collect())
    }

    async fn builds(&self, _name: &str) -> anyhow::Result<Vec<Build>> {
        let now = Utc::now();

        Ok(DEMO_VERSIONS
            .iter()
            .enumerate()
            .map(|(i, version)| Build {
                id: format!("build-{}", DEMO_VERSIONS.len() - i),
                version: version.to_string(),
                status: "succeeded".to_string(),
                trigger: if i == 0 { "push" } else { "manual" }.to_string(),
                started_at: now - Duration::days(2 + 5 * i as i64) - Duration::minutes(10),
                duration_seconds: Some(184 + 11 * i as u64),
            })
            .collect())
    }

    async fn rebuild(&self, name: &str) -> anyhow::Result<Build> {
        tracing::info!(image = name, "Rebuild requested (demo registry)");
        Ok(Build {
            id: format!("build-{}", uuid::Uuid::new_v4()),
            version: DEMO_VERSIONS[0].to_string(),
            status: "queued".to_string(),
            trigger: "manual".to_string(),
            started_at: Utc::now(),
            duration_seconds: None,
        })
    }

    async fn rollback(&self, name: &str, version: &str) -> anyhow::Result<Rollout> {
        tracing::info!(image = name, version, "Rollback requested (demo registry)");
        Ok(Rollout {
            id: format!("rollout-{}", uuid::Uuid::new_v4()),
            version: version.to_string(),
            status: "in_progress".to_string(),
            progress: 0,
            started_at: Utc::now(),
            completed_at: None,
        })
    }
}
