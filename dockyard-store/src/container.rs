use crate::config::ContainerConfig;
use crate::error::{Result, StoreError};
use crate::store::ConsoleStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_INSTANCE_TYPE: &str = "standard-1";
pub const DEFAULT_MAX_INSTANCES: i64 = 5;
pub const DEFAULT_PORT: i64 = 8080;
pub const DEFAULT_SLEEP_AFTER: &str = "10m";

/// Instance sizes the platform accepts for a registration.
pub const INSTANCE_TYPES: &[&str] = &["basic", "standard-1", "standard-2", "standard-3", "standard-4"];

/// A registered container definition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    pub name: String,
    pub class_name: String,
    pub image: Option<String>,
    pub instance_type: String,
    pub max_instances: i64,
    pub default_port: i64,
    pub sleep_after: String,
    pub status: String,
    pub color: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct NewContainer {
    pub name: String,
    pub class_name: String,
    pub image: Option<String>,
    pub instance_type: Option<String>,
    pub max_instances: Option<i64>,
    pub default_port: Option<i64>,
    pub sleep_after: Option<String>,
}

impl NewContainer {
    pub fn new(name: impl Into<String>, class_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class_name: class_name.into(),
            ..Default::default()
        }
    }
}

const SELECT_CONTAINERS: &str = "SELECT c.*, cc.color AS color
     FROM containers c
     LEFT JOIN container_colors cc ON cc.container_name = c.name";

impl ConsoleStore {
    /// Register a container. A duplicate name is reported as a conflict and
    /// leaves the existing row untouched.
    pub async fn register_container(&self, new: NewContainer) -> Result<Container> {
        let now = Utc::now().timestamp();

        sqlx::query(
            r#"
            INSERT INTO containers (name, class_name, image, instance_type, max_instances, default_port, sleep_after, status, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, 'active', ?, ?)
            "#,
        )
        .bind(&new.name)
        .bind(&new.class_name)
        .bind(&new.image)
        .bind(new.instance_type.as_deref().unwrap_or(DEFAULT_INSTANCE_TYPE))
        .bind(new.max_instances.unwrap_or(DEFAULT_MAX_INSTANCES))
        .bind(new.default_port.unwrap_or(DEFAULT_PORT))
        .bind(new.sleep_after.as_deref().unwrap_or(DEFAULT_SLEEP_AFTER))
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await
        .map_err(|e| StoreError::from_insert(e, format!("Container '{}'", new.name)))?;

        tracing::info!(container = %new.name, "Registered container");

        self.get_container(&new.name).await
    }

    /// List all registered containers, ordered by name
    pub async fn list_containers(&self) -> Result<Vec<Container>> {
        let rows = sqlx::query_as::<_, ContainerRow>(&format!("{SELECT_CONTAINERS} ORDER BY c.name"))
            .fetch_all(self.pool())
            .await?;

        Ok(rows.into_iter().map(Container::from).collect())
    }

    pub async fn get_container(&self, name: &str) -> Result<Container> {
        sqlx::query_as::<_, ContainerRow>(&format!("{SELECT_CONTAINERS} WHERE c.name = ?"))
            .bind(name)
            .fetch_optional(self.pool())
            .await?
            .map(Container::from)
            .ok_or_else(|| StoreError::NotFound(format!("Container '{}'", name)))
    }

    pub async fn container_exists(&self, name: &str) -> Result<bool> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM containers WHERE name = ?")
            .bind(name)
            .fetch_optional(self.pool())
            .await?;

        Ok(row.is_some())
    }

    /// Delete a registration together with its color
    pub async fn delete_container(&self, name: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM containers WHERE name = ?")
            .bind(name)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("Container '{}'", name)));
        }

        sqlx::query("DELETE FROM container_colors WHERE container_name = ?")
            .bind(name)
            .execute(self.pool())
            .await?;

        tracing::info!(container = %name, "Deleted container");

        Ok(())
    }

    /// Set (or replace) the display color of a registered container
    pub async fn set_container_color(&self, name: &str, color: &str) -> Result<()> {
        if !self.container_exists(name).await? {
            return Err(StoreError::NotFound(format!("Container '{}'", name)));
        }

        sqlx::query(
            "INSERT INTO container_colors (container_name, color, updated_at)
             VALUES (?, ?, ?)
             ON CONFLICT(container_name) DO UPDATE SET color = excluded.color, updated_at = excluded.updated_at",
        )
        .bind(name)
        .bind(color)
        .bind(Utc::now().timestamp())
        .execute(self.pool())
        .await?;

        Ok(())
    }

    /// Stored configuration of a container, or one derived from its
    /// registration columns when nothing has been saved yet.
    pub async fn container_config(&self, name: &str) -> Result<ContainerConfig> {
        let container = self.get_container(name).await?;

        let (stored,): (Option<String>,) =
            sqlx::query_as("SELECT config FROM containers WHERE name = ?")
                .bind(name)
                .fetch_one(self.pool())
                .await?;

        match stored {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(ContainerConfig::for_container(&container)),
        }
    }

    /// Persist a configuration and mirror its scalar fields onto the
    /// registration columns.
    pub async fn update_container_config(&self, name: &str, config: &ContainerConfig) -> Result<()> {
        let result = sqlx::query(
            "UPDATE containers
             SET config = ?, instance_type = ?, max_instances = ?, default_port = ?, sleep_after = ?, updated_at = ?
             WHERE name = ?",
        )
        .bind(serde_json::to_string(config)?)
        .bind(&config.instance_type)
        .bind(config.max_instances)
        .bind(config.networking.port)
        .bind(&config.sleep_policy.sleep_after)
        .bind(Utc::now().timestamp())
        .bind(name)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("Container '{}'", name)));
        }

        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct ContainerRow {
    name: String,
    class_name: String,
    image: Option<String>,
    instance_type: String,
    max_instances: i64,
    default_port: i64,
    sleep_after: String,
    status: String,
    color: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl From<ContainerRow> for Container {
    fn from(row: ContainerRow) -> Self {
        Self {
            name: row.name,
            class_name: row.class_name,
            image: row.image,
            instance_type: row.instance_type,
            max_instances: row.max_instances,
            default_port: row.default_port,
            sleep_after: row.sleep_after,
            status: row.status,
            color: row.color,
            created_at: crate::from_timestamp(row.created_at),
            updated_at: crate::from_timestamp(row.updated_at),
        }
    }
}
