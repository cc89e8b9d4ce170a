use crate::dispatch::RouteRequest;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::Json;
use dockyard_store::{Job, JobFilters, JobStats, JobStatus};
use serde::Deserialize;
use serde_json::{json, Value};

const DEFAULT_JOB_LIMIT: i64 = 50;
const MAX_JOB_LIMIT: i64 = 500;

#[derive(Debug, Default, Deserialize)]
struct JobQuery {
    status: Option<String>,
    container: Option<String>,
    operation: Option<String>,
    limit: Option<i64>,
    offset: Option<i64>,
}

impl JobQuery {
    fn into_filters(self) -> ApiResult<JobFilters> {
        let status = match self.status.as_deref().filter(|s| !s.is_empty()) {
            Some(s) => Some(
                s.parse::<JobStatus>()
                    .map_err(|e| ApiError::invalid_field("status", e.to_string()))?,
            ),
            None => None,
        };

        Ok(JobFilters {
            status,
            container_name: self.container.filter(|c| !c.is_empty()),
            operation: self.operation.filter(|o| !o.is_empty()),
            limit: self.limit.unwrap_or(DEFAULT_JOB_LIMIT).clamp(1, MAX_JOB_LIMIT),
            offset: self.offset.unwrap_or(0).max(0),
        })
    }
}

pub async fn list(state: AppState, req: RouteRequest) -> ApiResult<Json<Value>> {
    let filters = req.query::<JobQuery>()?.into_filters()?;
    let (jobs, total) = state.store.list_jobs(&filters).await?;

    Ok(Json(json!({
        "count": jobs.len(),
        "total": total,
        "limit": filters.limit,
        "offset": filters.offset,
        "jobs": jobs,
    })))
}

pub async fn stats(state: AppState, _req: RouteRequest) -> ApiResult<Json<JobStats>> {
    Ok(Json(state.store.job_stats().await?))
}

pub async fn get(state: AppState, req: RouteRequest) -> ApiResult<Json<Job>> {
    Ok(Json(state.store.get_job(req.param(0)).await?))
}

pub async fn delete(state: AppState, req: RouteRequest) -> ApiResult<Json<Value>> {
    state.store.delete_job(req.param(0)).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn cancel(state: AppState, req: RouteRequest) -> ApiResult<Json<Value>> {
    let job = state.store.cancel_job(req.param(0)).await?;
    Ok(Json(json!({ "success": true, "job": job })))
}

pub async fn retry(state: AppState, req: RouteRequest) -> ApiResult<Json<Value>> {
    let job = state.store.retry_job(req.param(0), req.created_by()).await?;

    Ok(Json(json!({
        "success": true,
        "jobId": job.id,
        "job": job,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filters_default_and_clamp() {
        let filters = JobQuery::default().into_filters().unwrap();
        assert_eq!(filters.limit, DEFAULT_JOB_LIMIT);
        assert_eq!(filters.offset, 0);

        let filters = JobQuery {
            limit: Some(10_000),
            offset: Some(-3),
            ..Default::default()
        }
        .into_filters()
        .unwrap();
        assert_eq!(filters.limit, MAX_JOB_LIMIT);
        assert_eq!(filters.offset, 0);
    }

    #[test]
    fn test_unknown_status_is_a_field_error() {
        let err = JobQuery {
            status: Some("exploded".to_string()),
            ..Default::default()
        }
        .into_filters()
        .unwrap_err();

        assert!(matches!(err, ApiError::BadRequest { field: Some(ref f), .. } if f == "status"));
    }
}
