use crate::error::{Result, StoreError};
use crate::store::ConsoleStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::str::FromStr;
use uuid::Uuid;

/// Audit record of an operation performed through the console.
///
/// `metadata` is stored as a JSON object and spread into the serialized job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub container_name: Option<String>,
    pub operation: String,
    pub status: JobStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<i64>,
    pub error_message: Option<String>,
    pub created_by: Option<String>,
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub const ALL: [JobStatus; 5] = [
        JobStatus::Pending,
        JobStatus::Running,
        JobStatus::Completed,
        JobStatus::Failed,
        JobStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled)
    }

    pub fn can_cancel(&self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Running)
    }

    pub fn can_retry(&self) -> bool {
        matches!(self, JobStatus::Failed | JobStatus::Cancelled)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self> {
        JobStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| {
                StoreError::InvalidInput(format!(
                    "status must be one of: pending, running, completed, failed, cancelled (got '{s}')"
                ))
            })
    }
}

#[derive(Debug, Clone)]
pub struct NewJob {
    pub container_name: Option<String>,
    pub operation: String,
    pub status: JobStatus,
    pub duration_ms: Option<i64>,
    pub metadata: Map<String, Value>,
    pub error_message: Option<String>,
    pub created_by: Option<String>,
}

impl NewJob {
    /// An action that was recorded as having happened, with a fixed duration.
    pub fn completed(container_name: Option<&str>, operation: &str, duration_ms: i64) -> Self {
        Self {
            container_name: container_name.map(str::to_string),
            operation: operation.to_string(),
            status: JobStatus::Completed,
            duration_ms: Some(duration_ms),
            metadata: Map::new(),
            error_message: None,
            created_by: None,
        }
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }

    pub fn created_by(mut self, who: Option<&str>) -> Self {
        self.created_by = who.map(str::to_string);
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct JobFilters {
    pub status: Option<JobStatus>,
    pub container_name: Option<String>,
    pub operation: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct JobStats {
    pub total: i64,
    pub by_status: BTreeMap<String, i64>,
    pub by_operation: BTreeMap<String, i64>,
    pub average_duration_ms: Option<f64>,
    /// Completed jobs as a percentage of completed + failed.
    pub success_rate: f64,
}

impl ConsoleStore {
    /// Insert an audit row. Terminal statuses are stamped complete immediately.
    pub async fn record_job(&self, new: NewJob) -> Result<Job> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().timestamp();
        let completed_at = new.status.is_terminal().then_some(now);

        sqlx::query(
            "INSERT INTO jobs (id, container_name, operation, status, started_at, completed_at, duration_ms, metadata, error_message, created_by)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&new.container_name)
        .bind(&new.operation)
        .bind(new.status)
        .bind(now)
        .bind(completed_at)
        .bind(new.duration_ms)
        .bind(serde_json::to_string(&new.metadata)?)
        .bind(&new.error_message)
        .bind(&new.created_by)
        .execute(self.pool())
        .await?;

        tracing::debug!(job_id = %id, operation = %new.operation, status = %new.status, "Recorded job");

        self.get_job(&id).await
    }

    pub async fn get_job(&self, id: &str) -> Result<Job> {
        let row = sqlx::query_as::<_, JobRow>("SELECT * FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| StoreError::NotFound(format!("Job '{}'", id)))?;

        Ok(row.into())
    }

    /// List jobs newest first, returning the page and the unpaged total.
    pub async fn list_jobs(&self, filters: &JobFilters) -> Result<(Vec<Job>, i64)> {
        let mut clause = " WHERE 1=1".to_string();

        if filters.status.is_some() {
            clause.push_str(" AND status = ?");
        }
        if filters.container_name.is_some() {
            clause.push_str(" AND container_name = ?");
        }
        if filters.operation.is_some() {
            clause.push_str(" AND operation = ?");
        }

        let list_sql = format!("SELECT * FROM jobs{clause} ORDER BY started_at DESC, rowid DESC LIMIT ? OFFSET ?");
        let count_sql = format!("SELECT COUNT(*) FROM jobs{clause}");

        let mut list = sqlx::query_as::<_, JobRow>(&list_sql);
        let mut count = sqlx::query_as::<_, (i64,)>(&count_sql);

        if let Some(status) = filters.status {
            list = list.bind(status);
            count = count.bind(status);
        }
        if let Some(container) = &filters.container_name {
            list = list.bind(container);
            count = count.bind(container);
        }
        if let Some(operation) = &filters.operation {
            list = list.bind(operation);
            count = count.bind(operation);
        }

        let rows = list
            .bind(filters.limit)
            .bind(filters.offset)
            .fetch_all(self.pool())
            .await?;
        let (total,) = count.fetch_one(self.pool()).await?;

        Ok((rows.into_iter().map(Job::from).collect(), total))
    }

    pub async fn job_stats(&self) -> Result<JobStats> {
        let by_status_rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM jobs GROUP BY status")
                .fetch_all(self.pool())
                .await?;
        let by_operation_rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT operation, COUNT(*) FROM jobs GROUP BY operation")
                .fetch_all(self.pool())
                .await?;
        let (average_duration_ms,): (Option<f64>,) =
            sqlx::query_as("SELECT AVG(duration_ms) FROM jobs WHERE duration_ms IS NOT NULL")
                .fetch_one(self.pool())
                .await?;

        let mut by_status: BTreeMap<String, i64> = JobStatus::ALL
            .iter()
            .map(|s| (s.as_str().to_string(), 0))
            .collect();
        by_status.extend(by_status_rows);
        let by_operation: BTreeMap<String, i64> = by_operation_rows.into_iter().collect();

        let total = by_status.values().sum();
        let completed = by_status.get("completed").copied().unwrap_or(0);
        let failed = by_status.get("failed").copied().unwrap_or(0);
        let success_rate = if completed + failed == 0 {
            0.0
        } else {
            completed as f64 * 100.0 / (completed + failed) as f64
        };

        Ok(JobStats {
            total,
            by_status,
            by_operation,
            average_duration_ms,
            success_rate,
        })
    }

    /// Cancel a pending or running job
    pub async fn cancel_job(&self, id: &str) -> Result<Job> {
        let job = self.get_job(id).await?;

        if !job.status.can_cancel() {
            return Err(StoreError::InvalidInput(format!(
                "Job cannot be cancelled in status '{}'",
                job.status
            )));
        }

        sqlx::query("UPDATE jobs SET status = ?, completed_at = ? WHERE id = ?")
            .bind(JobStatus::Cancelled)
            .bind(Utc::now().timestamp())
            .bind(id)
            .execute(self.pool())
            .await?;

        self.get_job(id).await
    }

    /// Retry a failed or cancelled job. Nothing is re-executed: a new
    /// completed job pointing back at the original is recorded.
    pub async fn retry_job(&self, id: &str, created_by: Option<&str>) -> Result<Job> {
        let job = self.get_job(id).await?;

        if !job.status.can_retry() {
            return Err(StoreError::InvalidInput(format!(
                "Job cannot be retried in status '{}'",
                job.status
            )));
        }

        let retry = NewJob::completed(job.container_name.as_deref(), &job.operation, RETRY_DURATION_MS)
            .with_metadata("retryOf", job.id.clone())
            .created_by(created_by);

        self.record_job(retry).await
    }

    pub async fn delete_job(&self, id: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM jobs WHERE id = ?")
            .bind(id)
            .execute(self.pool())
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("Job '{}'", id)));
        }

        Ok(())
    }

    /// Jobs recorded on behalf of a schedule, newest first
    pub async fn jobs_for_schedule(&self, schedule_id: &str, limit: i64) -> Result<Vec<Job>> {
        let rows = sqlx::query_as::<_, JobRow>(
            "SELECT * FROM jobs
             WHERE json_extract(metadata, '$.scheduleId') = ?
             ORDER BY started_at DESC, rowid DESC
             LIMIT ?",
        )
        .bind(schedule_id)
        .bind(limit)
        .fetch_all(self.pool())
        .await?;

        Ok(rows.into_iter().map(Job::from).collect())
    }
}

const RETRY_DURATION_MS: i64 = 1500;

#[derive(sqlx::FromRow)]
struct JobRow {
    id: String,
    container_name: Option<String>,
    operation: String,
    status: JobStatus,
    started_at: i64,
    completed_at: Option<i64>,
    duration_ms: Option<i64>,
    metadata: Option<String>,
    error_message: Option<String>,
    created_by: Option<String>,
}

impl From<JobRow> for Job {
    fn from(row: JobRow) -> Self {
        let metadata = row
            .metadata
            .and_then(|s| serde_json::from_str::<Map<String, Value>>(&s).ok())
            .unwrap_or_default();

        Self {
            id: row.id,
            container_name: row.container_name,
            operation: row.operation,
            status: row.status,
            started_at: crate::from_timestamp(row.started_at),
            completed_at: row.completed_at.map(crate::from_timestamp),
            duration_ms: row.duration_ms,
            error_message: row.error_message,
            created_by: row.created_by,
            metadata,
        }
    }
}
