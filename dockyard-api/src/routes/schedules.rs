use super::required;
use crate::dispatch::RouteRequest;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::Json;
use dockyard_store::schedule::SCHEDULE_ACTIONS;
use dockyard_store::{cron, NewSchedule, Schedule, ScheduleUpdate};
use serde::Deserialize;
use serde_json::{json, Value};

const HISTORY_LIMIT: i64 = 50;

#[derive(Debug, Deserialize)]
struct ContainerQuery {
    container: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScheduleBody {
    container_name: Option<String>,
    name: Option<String>,
    action: Option<String>,
    cron_expression: Option<String>,
    timezone: Option<String>,
    enabled: Option<bool>,
}

fn check_action(action: &str) -> ApiResult<()> {
    if SCHEDULE_ACTIONS.contains(&action) {
        Ok(())
    } else {
        Err(ApiError::invalid_field(
            "action",
            format!("action must be one of: {}", SCHEDULE_ACTIONS.join(", ")),
        ))
    }
}

fn check_cron(expr: &str) -> ApiResult<()> {
    cron::validate(expr).map_err(|message| ApiError::invalid_field("cronExpression", message))
}

impl ScheduleBody {
    fn into_new(self) -> ApiResult<NewSchedule> {
        let container_name = required(self.container_name, "containerName")?;
        let name = required(self.name, "name")?;
        let action = required(self.action, "action")?;
        check_action(&action)?;
        let cron_expression = required(self.cron_expression, "cronExpression")?;
        check_cron(&cron_expression)?;

        Ok(NewSchedule {
            container_name,
            name,
            action,
            cron_expression,
            timezone: self.timezone.filter(|tz| !tz.trim().is_empty()),
            enabled: self.enabled.unwrap_or(true),
        })
    }

    fn into_update(self) -> ApiResult<ScheduleUpdate> {
        if let Some(action) = &self.action {
            check_action(action)?;
        }
        if let Some(expr) = &self.cron_expression {
            check_cron(expr)?;
        }

        Ok(ScheduleUpdate {
            name: self.name.filter(|n| !n.trim().is_empty()),
            action: self.action,
            cron_expression: self.cron_expression,
            timezone: self.timezone,
            enabled: self.enabled,
        })
    }
}

pub async fn list(state: AppState, req: RouteRequest) -> ApiResult<Json<Value>> {
    let query: ContainerQuery = req.query()?;
    let container = query.container.as_deref().filter(|c| !c.is_empty());
    let schedules = state.store.list_schedules(container).await?;

    Ok(Json(json!({
        "count": schedules.len(),
        "schedules": schedules,
    })))
}

pub async fn create(state: AppState, req: RouteRequest) -> ApiResult<Json<Value>> {
    let new = req.json::<ScheduleBody>()?.into_new()?;
    let schedule = state.store.create_schedule(new).await?;

    Ok(Json(json!({ "success": true, "schedule": schedule })))
}

pub async fn get(state: AppState, req: RouteRequest) -> ApiResult<Json<Schedule>> {
    Ok(Json(state.store.get_schedule(req.param(0)).await?))
}

pub async fn update(state: AppState, req: RouteRequest) -> ApiResult<Json<Value>> {
    let update = req.json::<ScheduleBody>()?.into_update()?;
    let schedule = state.store.update_schedule(req.param(0), update).await?;

    Ok(Json(json!({ "success": true, "schedule": schedule })))
}

pub async fn delete(state: AppState, req: RouteRequest) -> ApiResult<Json<Value>> {
    state.store.delete_schedule(req.param(0)).await?;
    Ok(Json(json!({ "success": true })))
}

pub async fn history(state: AppState, req: RouteRequest) -> ApiResult<Json<Value>> {
    let schedule = state.store.get_schedule(req.param(0)).await?;
    let history = state.store.jobs_for_schedule(&schedule.id, HISTORY_LIMIT).await?;

    Ok(Json(json!({
        "scheduleId": schedule.id,
        "count": history.len(),
        "history": history,
    })))
}

pub async fn trigger(state: AppState, req: RouteRequest) -> ApiResult<Json<Value>> {
    let (schedule, job) = state
        .store
        .trigger_schedule(req.param(0), req.created_by())
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": format!("Schedule {} triggered", schedule.name),
        "jobId": job.id,
        "job": job,
        "schedule": schedule,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> ScheduleBody {
        ScheduleBody {
            container_name: Some("svc-a".to_string()),
            name: Some("nightly".to_string()),
            action: Some("restart".to_string()),
            cron_expression: Some("0 3 * * *".to_string()),
            ..Default::default()
        }
    }

    fn field_of(err: ApiError) -> Option<String> {
        match err {
            ApiError::BadRequest { field, .. } => field,
            _ => None,
        }
    }

    #[test]
    fn test_new_schedule_defaults_to_enabled() {
        let new = valid().into_new().unwrap();
        assert!(new.enabled);
        assert_eq!(new.timezone, None);
    }

    #[test]
    fn test_new_schedule_field_errors() {
        let err = ScheduleBody {
            action: Some("explode".to_string()),
            ..valid()
        }
        .into_new()
        .unwrap_err();
        assert_eq!(field_of(err).as_deref(), Some("action"));

        let err = ScheduleBody {
            cron_expression: Some("0 3 * *".to_string()),
            ..valid()
        }
        .into_new()
        .unwrap_err();
        assert_eq!(field_of(err).as_deref(), Some("cronExpression"));

        let err = ScheduleBody {
            container_name: None,
            ..valid()
        }
        .into_new()
        .unwrap_err();
        assert_eq!(field_of(err).as_deref(), Some("containerName"));
    }
}
