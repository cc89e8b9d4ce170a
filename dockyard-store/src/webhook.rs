use crate::error::{Result, StoreError};
use crate::store::ConsoleStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Events a webhook may subscribe to.
pub const WEBHOOK_EVENTS: &[&str] = &[
    "container.started",
    "container.stopped",
    "container.restarted",
    "container.failed",
    "job.completed",
    "job.failed",
    "snapshot.created",
    "snapshot.restored",
    "schedule.triggered",
];

/// Notification subscription. The signing secret is write-only and only
/// its presence is reported.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Webhook {
    pub id: String,
    pub name: Option<String>,
    pub url: String,
    pub events: Vec<String>,
    pub enabled: bool,
    pub has_secret: bool,
    pub last_triggered_at: Option<DateTime<Utc>>,
    pub last_status: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewWebhook {
    pub name: Option<String>,
    pub url: String,
    pub events: Vec<String>,
    pub enabled: bool,
    pub secret: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct WebhookUpdate {
    pub name: Option<String>,
    pub url: Option<String>,
    pub events: Option<Vec<String>>,
    pub enabled: Option<bool>,
    pub secret: Option<String>,
}

impl ConsoleStore {
    pub async fn create_webhook(&self, new: NewWebhook) -> Result<Webhook> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().timestamp();

        sqlx::query(
            "INSERT INTO webhooks (id, name, url, events, enabled, secret, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&new.name)
        .bind(&new.url)
        .bind(serde_json::to_string(&new.events)?)
        .bind(new.enabled)
        .bind(&new.secret)
        .bind(now)
        .bind(now)
        .execute(self.pool())
        .await?;

        self.get_webhook(&id).await
    }

    pub async fn list_webhooks(&self) -> Result<Vec<Webhook>> {
        let rows = sqlx::query_as::<_, WebhookRow>("SELECT * FROM webhooks ORDER BY created_at DESC, rowid DESC")
            .fetch_all(self.pool())
            .await?;

        Ok(rows.into_iter().map(Webhook::from).collect())
    }

    pub async fn get_webhook(&self, id: &str) -> Result<Webhook> {
        let row = sqlx::query_as::<_, WebhookRow>("SELECT * FROM webhooks WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("Webhook '{}'", id)))?;

        Ok(row.into())
    }

    /// Apply the fields present in `update`, leaving the rest unchanged
    pub async fn update_webhook(&self, id: &str, update: WebhookUpdate) -> Result<Webhook> {
        // Existence check first so an empty update still reports 404
        self.get_webhook(id).await?;

        let events = update.events.map(|e| serde_json::to_string(&e)).transpose()?;

        sqlx::query(
            "UPDATE webhooks
             SET name = COALESCE(?, name),
                 url = COALESCE(?, url),
                 events = COALESCE(?, events),
                 enabled = COALESCE(?, enabled),
                 secret = COALESCE(?, secret),
                 updated_at = ?
             WHERE id = ?",
        )
        .bind(update.name)
        .bind(update.url)
        .bind(events)
        .bind(update.enabled)
        .bind(update.secret)
        .bind(Utc::now().timestamp())
        .bind(id)
        .execute(self.pool())
        .await?;

        self.get_webhook(id).await
    }

    pub async fn delete_webhook(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM webhooks WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("Webhook '{}'", id)));
        }

        Ok(())
    }

    /// Record the outcome of a (simulated) delivery
    pub async fn record_webhook_trigger(&self, id: &str, status: &str) -> Result<Webhook> {
        let now = Utc::now().timestamp();

        let result = sqlx::query(
            "UPDATE webhooks SET last_triggered_at = ?, last_status = ?, updated_at = ? WHERE id = ?",
        )
        .bind(now)
        .bind(status)
        .bind(now)
        .bind(id)
        .execute(self.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("Webhook '{}'", id)));
        }

        self.get_webhook(id).await
    }
}

#[derive(sqlx::FromRow)]
struct WebhookRow {
    id: String,
    name: Option<String>,
    url: String,
    events: String,
    enabled: bool,
    secret: Option<String>,
    last_triggered_at: Option<i64>,
    last_status: Option<String>,
    created_at: i64,
    updated_at: i64,
}

impl From<WebhookRow> for Webhook {
    fn from(row: WebhookRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            url: row.url,
            events: serde_json::from_str(&row.events).unwrap_or_default(),
            enabled: row.enabled,
            has_secret: row.secret.is_some(),
            last_triggered_at: row.last_triggered_at.map(crate::from_timestamp),
            last_status: row.last_status,
            created_at: crate::from_timestamp(row.created_at),
            updated_at: crate::from_timestamp(row.updated_at),
        }
    }
}
