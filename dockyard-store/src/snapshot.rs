use crate::blob::BlobStore;
use crate::config::ContainerConfig;
use crate::error::{Result, StoreError};
use crate::store::ConsoleStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};
use uuid::Uuid;

/// Version of the blob payload layout.
pub const SNAPSHOT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub id: String,
    pub container_name: String,
    pub name: String,
    pub description: Option<String>,
    pub blob_key: String,
    pub size_bytes: i64,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<String>,
}

/// What is written to the blob store for each snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotPayload {
    pub version: u32,
    pub snapshot_id: String,
    pub container_name: String,
    pub captured_at: DateTime<Utc>,
    pub config: ContainerConfig,
}

#[derive(Debug, Clone)]
pub struct NewSnapshot {
    pub container_name: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub created_by: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotStats {
    pub total: i64,
    pub total_size_bytes: i64,
    pub by_container: BTreeMap<String, i64>,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
}

pub fn snapshot_key(container_name: &str, id: &str) -> String {
    format!("snapshots/{container_name}/{id}.json")
}

impl ConsoleStore {
    /// Capture `config` for a container: the payload goes to the blob store,
    /// its key and size to the `snapshots` table.
    pub async fn create_snapshot(
        &self,
        blobs: &dyn BlobStore,
        new: NewSnapshot,
        config: ContainerConfig,
    ) -> Result<Snapshot> {
        if new.container_name.trim().is_empty() {
            return Err(StoreError::InvalidInput("containerName is required".to_string()));
        }

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let key = snapshot_key(&new.container_name, &id);
        let name = new
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("{} {}", new.container_name, now.format("%Y-%m-%d %H:%M")));

        let payload = SnapshotPayload {
            version: SNAPSHOT_FORMAT_VERSION,
            snapshot_id: id.clone(),
            container_name: new.container_name.clone(),
            captured_at: now,
            config,
        };
        let bytes = serde_json::to_vec_pretty(&payload)?;
        let size = blobs.put(&key, bytes).await?;

        let inserted = sqlx::query(
            "INSERT INTO snapshots (id, container_name, name, description, blob_key, size_bytes, created_at, created_by)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&new.container_name)
        .bind(&name)
        .bind(&new.description)
        .bind(&key)
        .bind(size as i64)
        .bind(now.timestamp())
        .bind(&new.created_by)
        .execute(self.pool())
        .await;

        if let Err(e) = inserted {
            // Don't leave an orphaned payload behind
            if let Err(cleanup) = blobs.delete(&key).await {
                warn!(key = %key, error = %cleanup, "Failed to remove snapshot payload after insert error");
            }
            return Err(e.into());
        }

        info!(snapshot_id = %id, container = %new.container_name, size, "Snapshot created");

        self.get_snapshot(&id).await
    }

    pub async fn list_snapshots(&self, container_name: Option<&str>) -> Result<Vec<Snapshot>> {
        let rows = match container_name {
            Some(name) => {
                sqlx::query_as::<_, SnapshotRow>(
                    "SELECT * FROM snapshots WHERE container_name = ? ORDER BY created_at DESC, rowid DESC",
                )
                .bind(name)
                .fetch_all(self.pool())
                .await?
            }
            None => {
                sqlx::query_as::<_, SnapshotRow>("SELECT * FROM snapshots ORDER BY created_at DESC, rowid DESC")
                    .fetch_all(self.pool())
                    .await?
            }
        };

        Ok(rows.into_iter().map(Snapshot::from).collect())
    }

    pub async fn get_snapshot(&self, id: &str) -> Result<Snapshot> {
        let row = sqlx::query_as::<_, SnapshotRow>("SELECT * FROM snapshots WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("Snapshot '{}'", id)))?;

        Ok(row.into())
    }

    /// Read back the payload a snapshot row points at
    pub async fn load_snapshot_payload(
        &self,
        blobs: &dyn BlobStore,
        snapshot: &Snapshot,
    ) -> Result<SnapshotPayload> {
        let bytes = blobs.get(&snapshot.blob_key).await?.ok_or_else(|| {
            StoreError::Blob(format!(
                "payload missing for snapshot {} at {}",
                snapshot.id, snapshot.blob_key
            ))
        })?;

        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Delete the row and, best-effort, its payload
    pub async fn delete_snapshot(&self, blobs: &dyn BlobStore, id: &str) -> Result<()> {
        let snapshot = self.get_snapshot(id).await?;

        if let Err(e) = blobs.delete(&snapshot.blob_key).await {
            warn!(key = %snapshot.blob_key, error = %e, "Failed to delete snapshot payload");
        }

        let result = sqlx::query("DELETE FROM snapshots WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("Snapshot '{}'", id)));
        }

        Ok(())
    }

    pub async fn snapshot_stats(&self) -> Result<SnapshotStats> {
        let (total, total_size_bytes, oldest, newest): (i64, i64, Option<i64>, Option<i64>) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(size_bytes), 0), MIN(created_at), MAX(created_at) FROM snapshots",
        )
        .fetch_one(self.pool())
        .await?;

        let by_container: Vec<(String, i64)> =
            sqlx::query_as("SELECT container_name, COUNT(*) FROM snapshots GROUP BY container_name")
                .fetch_all(self.pool())
                .await?;

        Ok(SnapshotStats {
            total,
            total_size_bytes,
            by_container: by_container.into_iter().collect(),
            oldest: oldest.map(crate::from_timestamp),
            newest: newest.map(crate::from_timestamp),
        })
    }
}

#[derive(sqlx::FromRow)]
struct SnapshotRow {
    id: String,
    container_name: String,
    name: String,
    description: Option<String>,
    blob_key: String,
    size_bytes: i64,
    created_at: i64,
    created_by: Option<String>,
}

impl From<SnapshotRow> for Snapshot {
    fn from(row: SnapshotRow) -> Self {
        Self {
            id: row.id,
            container_name: row.container_name,
            name: row.name,
            description: row.description,
            blob_key: row.blob_key,
            size_bytes: row.size_bytes,
            created_at: crate::from_timestamp(row.created_at),
            created_by: row.created_by,
        }
    }
}
