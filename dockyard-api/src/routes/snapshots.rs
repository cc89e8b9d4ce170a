use super::required;
use crate::dispatch::RouteRequest;
use crate::error::ApiResult;
use crate::state::AppState;
use axum::Json;
use dockyard_store::{ContainerConfig, NewJob, NewSnapshot, SnapshotStats, StoreError};
use serde::Deserialize;
use serde_json::{json, Value};

const RESTORE_DURATION_MS: i64 = 3000;

#[derive(Debug, Deserialize)]
struct ContainerQuery {
    container: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateBody {
    container_name: Option<String>,
    name: Option<String>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RestoreBody {
    #[serde(default = "default_create_backup")]
    create_backup: bool,
    #[serde(default)]
    dry_run: bool,
}

fn default_create_backup() -> bool {
    true
}

/// Registered containers snapshot their saved configuration; anything else
/// gets the demo configuration.
async fn current_config(state: &AppState, container_name: &str) -> ApiResult<ContainerConfig> {
    match state.store.container_config(container_name).await {
        Ok(config) => Ok(config),
        Err(StoreError::NotFound(_)) => Ok(ContainerConfig::demo()),
        Err(e) => Err(e.into()),
    }
}

pub async fn list(state: AppState, req: RouteRequest) -> ApiResult<Json<Value>> {
    let query: ContainerQuery = req.query()?;
    let container = query.container.as_deref().filter(|c| !c.is_empty());
    let snapshots = state.store.list_snapshots(container).await?;

    Ok(Json(json!({
        "count": snapshots.len(),
        "snapshots": snapshots,
    })))
}

pub async fn create(state: AppState, req: RouteRequest) -> ApiResult<Json<Value>> {
    let body: CreateBody = req.json()?;
    let container_name = required(body.container_name, "containerName")?;
    let config = current_config(&state, &container_name).await?;

    let snapshot = state
        .store
        .create_snapshot(
            state.blobs.as_ref(),
            NewSnapshot {
                container_name,
                name: body.name,
                description: body.description,
                created_by: req.created_by().map(str::to_string),
            },
            config,
        )
        .await?;

    Ok(Json(json!({ "success": true, "snapshot": snapshot })))
}

pub async fn stats(state: AppState, _req: RouteRequest) -> ApiResult<Json<SnapshotStats>> {
    Ok(Json(state.store.snapshot_stats().await?))
}

pub async fn get(state: AppState, req: RouteRequest) -> ApiResult<Json<Value>> {
    let snapshot = state.store.get_snapshot(req.param(0)).await?;
    let payload = state
        .store
        .load_snapshot_payload(state.blobs.as_ref(), &snapshot)
        .await?;

    let mut body = serde_json::to_value(&snapshot)?;
    if let Value::Object(map) = &mut body {
        map.insert("config".to_string(), serde_json::to_value(&payload.config)?);
    }

    Ok(Json(body))
}

pub async fn delete(state: AppState, req: RouteRequest) -> ApiResult<Json<Value>> {
    state
        .store
        .delete_snapshot(state.blobs.as_ref(), req.param(0))
        .await?;

    Ok(Json(json!({ "success": true })))
}

/// Computes what a restore would change against the same baseline
/// [`create`] captures. Nothing is applied to a container; a non-dry run records a `snapshot-restore` job and, unless
/// disabled, a backup snapshot of the current configuration first.
pub async fn restore(state: AppState, req: RouteRequest) -> ApiResult<Json<Value>> {
    let body: RestoreBody = req.json()?;
    let snapshot = state.store.get_snapshot(req.param(0)).await?;
    let payload = state
        .store
        .load_snapshot_payload(state.blobs.as_ref(), &snapshot)
        .await?;

    let current = current_config(&state, &snapshot.container_name).await?;
    let changes = current.diff(&payload.config);

    if body.dry_run {
        return Ok(Json(json!({
            "success": true,
            "dryRun": true,
            "hasChanges": !changes.is_empty(),
            "changes": changes,
        })));
    }

    let backup = if body.create_backup {
        let backup = state
            .store
            .create_snapshot(
                state.blobs.as_ref(),
                NewSnapshot {
                    container_name: snapshot.container_name.clone(),
                    name: Some(format!("Pre-restore backup ({})", snapshot.name)),
                    description: Some(format!("Automatic backup before restoring snapshot {}", snapshot.id)),
                    created_by: req.created_by().map(str::to_string),
                },
                current,
            )
            .await?;
        Some(backup)
    } else {
        None
    };

    let mut job = NewJob::completed(Some(&snapshot.container_name), "snapshot-restore", RESTORE_DURATION_MS)
        .with_metadata("snapshotId", snapshot.id.clone())
        .created_by(req.created_by());
    if let Some(backup) = &backup {
        job = job.with_metadata("backupSnapshotId", backup.id.clone());
    }
    let job = state.store.record_job(job).await?;

    Ok(Json(json!({
        "success": true,
        "dryRun": false,
        "message": format!("Snapshot {} restored to {}", snapshot.name, snapshot.container_name),
        "jobId": job.id,
        "backupSnapshotId": backup.map(|b| b.id),
        "hasChanges": !changes.is_empty(),
        "changes": changes,
    })))
}

