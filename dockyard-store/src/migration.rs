use crate::db::MIGRATOR;
use crate::error::Result;
use crate::store::ConsoleStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AppliedMigration {
    pub version: i64,
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct KnownMigration {
    pub version: i64,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MigrationStatus {
    pub current_version: Option<i64>,
    pub applied: Vec<AppliedMigration>,
    pub known: Vec<KnownMigration>,
    pub pending: Vec<i64>,
    pub up_to_date: bool,
}

impl ConsoleStore {
    /// Compare what the database recorded against the migrations compiled in
    pub async fn migration_status(&self) -> Result<MigrationStatus> {
        let rows: Vec<(i64, String, i64)> =
            sqlx::query_as("SELECT version, name, applied_at FROM migrations ORDER BY version")
                .fetch_all(self.pool())
                .await?;

        let applied: Vec<AppliedMigration> = rows
            .into_iter()
            .map(|(version, name, applied_at)| AppliedMigration {
                version,
                name,
                applied_at: crate::from_timestamp(applied_at),
            })
            .collect();

        let known: Vec<KnownMigration> = MIGRATOR
            .iter()
            .map(|m| KnownMigration {
                version: m.version,
                description: m.description.to_string(),
            })
            .collect();

        let pending: Vec<i64> = known
            .iter()
            .map(|m| m.version)
            .filter(|v| !applied.iter().any(|a| a.version == *v))
            .collect();

        Ok(MigrationStatus {
            current_version: applied.iter().map(|a| a.version).max(),
            up_to_date: pending.is_empty(),
            applied,
            known,
            pending,
        })
    }
}
