use super::required;
use crate::dispatch::RouteRequest;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::Json;
use dockyard_store::container::INSTANCE_TYPES;
use dockyard_store::{Container, NewContainer, NewJob};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};

static COLOR_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#[0-9a-fA-F]{6}$").expect("color regex should compile - static pattern"));

static SLEEP_AFTER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+[smh]$").expect("duration regex should compile - static pattern"));

const RESTART_DURATION_MS: i64 = 2000;
const STOP_DURATION_MS: i64 = 1000;
const DELETE_INSTANCE_DURATION_MS: i64 = 500;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RegisterBody {
    name: Option<String>,
    class_name: Option<String>,
    image: Option<String>,
    instance_type: Option<String>,
    max_instances: Option<i64>,
    default_port: Option<i64>,
    sleep_after: Option<String>,
}

impl RegisterBody {
    fn into_new_container(self) -> ApiResult<NewContainer> {
        let name = required(self.name, "name")?;
        let class_name = required(self.class_name, "className")?;

        if let Some(instance_type) = &self.instance_type {
            if !INSTANCE_TYPES.contains(&instance_type.as_str()) {
                return Err(ApiError::invalid_field(
                    "instanceType",
                    format!("instanceType must be one of: {}", INSTANCE_TYPES.join(", ")),
                ));
            }
        }
        if self.max_instances.is_some_and(|n| !(1..=100).contains(&n)) {
            return Err(ApiError::invalid_field("maxInstances", "maxInstances must be between 1 and 100"));
        }
        if self.default_port.is_some_and(|p| !(1..=65535).contains(&p)) {
            return Err(ApiError::invalid_field("defaultPort", "defaultPort must be between 1 and 65535"));
        }
        if self.sleep_after.as_deref().is_some_and(|s| !SLEEP_AFTER_REGEX.is_match(s)) {
            return Err(ApiError::invalid_field(
                "sleepAfter",
                "sleepAfter must be a number followed by s, m or h",
            ));
        }

        Ok(NewContainer {
            image: self.image.filter(|i| !i.trim().is_empty()),
            instance_type: self.instance_type,
            max_instances: self.max_instances,
            default_port: self.default_port,
            sleep_after: self.sleep_after,
            ..NewContainer::new(name, class_name)
        })
    }
}

pub async fn list(state: AppState, _req: RouteRequest) -> ApiResult<Json<Value>> {
    let containers = state.store.list_containers().await?;

    Ok(Json(json!({
        "count": containers.len(),
        "containers": containers,
    })))
}

pub async fn register(state: AppState, req: RouteRequest) -> ApiResult<Json<Value>> {
    let body: RegisterBody = req.json()?;
    let container = state.store.register_container(body.into_new_container()?).await?;

    Ok(Json(json!({ "success": true, "container": container })))
}

pub async fn get(state: AppState, req: RouteRequest) -> ApiResult<Json<Container>> {
    Ok(Json(state.store.get_container(req.param(0)).await?))
}

pub async fn delete(state: AppState, req: RouteRequest) -> ApiResult<Json<Value>> {
    state.store.delete_container(req.param(0)).await?;

    Ok(Json(json!({ "success": true })))
}

pub async fn restart(state: AppState, req: RouteRequest) -> ApiResult<Json<Value>> {
    record_action(&state, &req, "restart", "restarted", RESTART_DURATION_MS).await
}

pub async fn stop(state: AppState, req: RouteRequest) -> ApiResult<Json<Value>> {
    record_action(&state, &req, "stop", "stopped", STOP_DURATION_MS).await
}

/// Nothing is sent to a runtime: the action is audited as an already
/// completed job.
async fn record_action(
    state: &AppState,
    req: &RouteRequest,
    operation: &str,
    past_tense: &str,
    duration_ms: i64,
) -> ApiResult<Json<Value>> {
    let container = state.store.get_container(req.param(0)).await?;

    let job = state
        .store
        .record_job(NewJob::completed(Some(&container.name), operation, duration_ms).created_by(req.created_by()))
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": format!("Container {} {}", container.name, past_tense),
        "jobId": job.id,
    })))
}

#[derive(Debug, Deserialize)]
struct ColorBody {
    color: Option<String>,
}

pub async fn set_color(state: AppState, req: RouteRequest) -> ApiResult<Json<Value>> {
    let name = req.param(0);
    let body: ColorBody = req.json()?;
    let color = required(body.color, "color")?;

    if !COLOR_REGEX.is_match(&color) {
        return Err(ApiError::invalid_field("color", "color must be a hex value like #1a2b3c"));
    }

    state.store.set_container_color(name, &color).await?;

    Ok(Json(json!({ "success": true, "name": name, "color": color })))
}

pub async fn instances(state: AppState, req: RouteRequest) -> ApiResult<Json<Value>> {
    let instances = state.runtime.list_instances(req.param(0)).await?;

    Ok(Json(json!({
        "count": instances.len(),
        "instances": instances,
    })))
}

pub async fn delete_instance(state: AppState, req: RouteRequest) -> ApiResult<Json<Value>> {
    let (name, instance_id) = (req.param(0), req.param(1));

    state.runtime.delete_instance(name, instance_id).await?;

    let job = state
        .store
        .record_job(
            NewJob::completed(Some(name), "delete-instance", DELETE_INSTANCE_DURATION_MS)
                .with_metadata("instanceId", instance_id)
                .created_by(req.created_by()),
        )
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": format!("Instance {instance_id} deleted"),
        "jobId": job.id,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(value: Value) -> RegisterBody {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_register_requires_name_and_class() {
        let err = body(json!({ "className": "Api" })).into_new_container().unwrap_err();
        assert!(matches!(err, ApiError::BadRequest { field: Some(ref f), .. } if f == "name"));

        let err = body(json!({ "name": "svc-a", "className": "  " })).into_new_container().unwrap_err();
        assert!(matches!(err, ApiError::BadRequest { field: Some(ref f), .. } if f == "className"));
    }

    #[test]
    fn test_register_rejects_unknown_instance_type() {
        let err = body(json!({ "name": "svc-a", "className": "Api", "instanceType": "huge" }))
            .into_new_container()
            .unwrap_err();
        assert!(matches!(err, ApiError::BadRequest { field: Some(ref f), .. } if f == "instanceType"));
    }

    #[test]
    fn test_register_keeps_optional_fields() {
        let new = body(json!({
            "name": " svc-a ",
            "className": "Api",
            "image": "",
            "instanceType": "basic",
            "maxInstances": 3
        }))
        .into_new_container()
        .unwrap();

        assert_eq!(new.name, "svc-a");
        assert_eq!(new.image, None);
        assert_eq!(new.instance_type.as_deref(), Some("basic"));
        assert_eq!(new.max_instances, Some(3));
        assert_eq!(new.default_port, None);
    }
}
