use crate::cron;
use crate::error::{Result, StoreError};
use crate::job::{Job, NewJob};
use crate::store::ConsoleStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Actions a schedule may be bound to.
pub const SCHEDULE_ACTIONS: &[&str] = &["restart", "stop", "start", "snapshot"];

pub const DEFAULT_TIMEZONE: &str = "UTC";

/// Duration recorded for a manually triggered schedule run.
const TRIGGER_DURATION_MS: i64 = 1000;

/// A cron-like rule bound to a container and an action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub id: String,
    pub container_name: String,
    pub name: String,
    pub action: String,
    pub cron_expression: String,
    pub description: String,
    pub timezone: String,
    pub enabled: bool,
    pub status: ScheduleStatus,
    pub last_run_at: Option<DateTime<Utc>>,
    pub next_run_at: Option<DateTime<Utc>>,
    pub run_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleStatus {
    Active,
    Paused,
}

#[derive(Debug, Clone)]
pub struct NewSchedule {
    pub container_name: String,
    pub name: String,
    pub action: String,
    pub cron_expression: String,
    pub timezone: Option<String>,
    pub enabled: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ScheduleUpdate {
    pub name: Option<String>,
    pub action: Option<String>,
    pub cron_expression: Option<String>,
    pub timezone: Option<String>,
    pub enabled: Option<bool>,
}

fn check_action(action: &str) -> Result<()> {
    if SCHEDULE_ACTIONS.contains(&action) {
        Ok(())
    } else {
        Err(StoreError::InvalidInput(format!(
            "action must be one of: {}",
            SCHEDULE_ACTIONS.join(", ")
        )))
    }
}

impl ConsoleStore {
    pub async fn create_schedule(&self, new: NewSchedule) -> Result<Schedule> {
        check_action(&new.action)?;
        cron::validate(&new.cron_expression).map_err(StoreError::InvalidInput)?;

        let id = Uuid::new_v4().to_string();
        let now = Utc::now();
        let next_run_at = new
            .enabled
            .then(|| cron::next_run_after(&new.cron_expression, now).timestamp());

        sqlx::query(
            "INSERT INTO scheduled_actions (id, container_name, name, action, cron_expression, timezone, enabled, next_run_at, run_count, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?)",
        )
        .bind(&id)
        .bind(&new.container_name)
        .bind(&new.name)
        .bind(&new.action)
        .bind(new.cron_expression.trim())
        .bind(new.timezone.as_deref().unwrap_or(DEFAULT_TIMEZONE))
        .bind(new.enabled)
        .bind(next_run_at)
        .bind(now.timestamp())
        .bind(now.timestamp())
        .execute(self.pool())
        .await?;

        tracing::info!(schedule_id = %id, container = %new.container_name, action = %new.action, "Schedule created");

        self.get_schedule(&id).await
    }

    pub async fn list_schedules(&self, container_name: Option<&str>) -> Result<Vec<Schedule>> {
        let mut q = "SELECT * FROM scheduled_actions".to_string();
        if container_name.is_some() {
            q.push_str(" WHERE container_name = ?");
        }
        q.push_str(" ORDER BY created_at DESC, rowid DESC");

        let mut query = sqlx::query_as::<_, ScheduleRow>(&q);
        if let Some(name) = container_name {
            query = query.bind(name);
        }

        let rows = query.fetch_all(self.pool()).await?;
        Ok(rows.into_iter().map(Schedule::from).collect())
    }

    pub async fn get_schedule(&self, id: &str) -> Result<Schedule> {
        let row = sqlx::query_as::<_, ScheduleRow>("SELECT * FROM scheduled_actions WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("Schedule '{}'", id)))?;

        Ok(row.into())
    }

    /// Apply a partial update. The next run is recomputed from the
    /// resulting expression, and cleared while the schedule is paused.
    pub async fn update_schedule(&self, id: &str, update: ScheduleUpdate) -> Result<Schedule> {
        let current = self.get_schedule(id).await?;

        if let Some(action) = &update.action {
            check_action(action)?;
        }
        if let Some(expr) = &update.cron_expression {
            cron::validate(expr).map_err(StoreError::InvalidInput)?;
        }

        let now = Utc::now();
        let name = update.name.unwrap_or(current.name);
        let action = update.action.unwrap_or(current.action);
        let cron_expression = update
            .cron_expression
            .map(|e| e.trim().to_string())
            .unwrap_or(current.cron_expression);
        let timezone = update.timezone.unwrap_or(current.timezone);
        let enabled = update.enabled.unwrap_or(current.enabled);
        let next_run_at = enabled.then(|| cron::next_run_after(&cron_expression, now).timestamp());

        sqlx::query(
            "UPDATE scheduled_actions
             SET name = ?, action = ?, cron_expression = ?, timezone = ?, enabled = ?, next_run_at = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&name)
        .bind(&action)
        .bind(&cron_expression)
        .bind(&timezone)
        .bind(enabled)
        .bind(next_run_at)
        .bind(now.timestamp())
        .bind(id)
        .execute(self.pool())
        .await?;

        self.get_schedule(id).await
    }

    pub async fn delete_schedule(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM scheduled_actions WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("Schedule '{}'", id)));
        }

        Ok(())
    }

    /// Run a schedule by hand: record one completed job for its action and
    /// bump the run counter. Nothing is executed.
    pub async fn trigger_schedule(&self, id: &str, created_by: Option<&str>) -> Result<(Schedule, Job)> {
        let schedule = self.get_schedule(id).await?;

        let job = self
            .record_job(
                NewJob::completed(Some(&schedule.container_name), &schedule.action, TRIGGER_DURATION_MS)
                    .with_metadata("scheduleId", schedule.id.clone())
                    .with_metadata("scheduleName", schedule.name.clone())
                    .with_metadata("trigger", "manual")
                    .created_by(created_by),
            )
            .await?;

        let now = Utc::now().timestamp();
        sqlx::query(
            "UPDATE scheduled_actions SET run_count = run_count + 1, last_run_at = ?, updated_at = ? WHERE id = ?",
        )
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(self.pool())
        .await?;

        Ok((self.get_schedule(id).await?, job))
    }

    /// Enabled schedules whose next run is at or before `now`
    pub async fn due_schedules(&self, now: DateTime<Utc>) -> Result<Vec<Schedule>> {
        let rows = sqlx::query_as::<_, ScheduleRow>(
            "SELECT * FROM scheduled_actions
             WHERE enabled = 1 AND next_run_at IS NOT NULL AND next_run_at <= ?
             ORDER BY next_run_at",
        )
        .bind(now.timestamp())
        .fetch_all(self.pool())
        .await?;

        Ok(rows.into_iter().map(Schedule::from).collect())
    }
}

#[derive(sqlx::FromRow)]
struct ScheduleRow {
    id: String,
    container_name: String,
    name: String,
    action: String,
    cron_expression: String,
    timezone: String,
    enabled: bool,
    last_run_at: Option<i64>,
    next_run_at: Option<i64>,
    run_count: i64,
    created_at: i64,
    updated_at: i64,
}

impl From<ScheduleRow> for Schedule {
    fn from(row: ScheduleRow) -> Self {
        Self {
            description: cron::describe(&row.cron_expression),
            status: if row.enabled {
                ScheduleStatus::Active
            } else {
                ScheduleStatus::Paused
            },
            id: row.id,
            container_name: row.container_name,
            name: row.name,
            action: row.action,
            cron_expression: row.cron_expression,
            timezone: row.timezone,
            enabled: row.enabled,
            last_run_at: row.last_run_at.map(crate::from_timestamp),
            next_run_at: row.next_run_at.map(crate::from_timestamp),
            run_count: row.run_count,
            created_at: crate::from_timestamp(row.created_at),
            updated_at: crate::from_timestamp(row.updated_at),
        }
    }
}
