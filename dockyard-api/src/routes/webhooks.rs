use super::required;
use crate::dispatch::RouteRequest;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::Json;
use dockyard_store::webhook::WEBHOOK_EVENTS;
use dockyard_store::{NewWebhook, WebhookUpdate};
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

#[derive(Debug, Default, Deserialize)]
struct WebhookBody {
    name: Option<String>,
    url: Option<String>,
    events: Option<Vec<String>>,
    enabled: Option<bool>,
    secret: Option<String>,
}

fn check_url(url: &str) -> ApiResult<()> {
    match Url::parse(url) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") && parsed.host().is_some() => Ok(()),
        _ => Err(ApiError::invalid_field("url", "url must be a valid http(s) URL")),
    }
}

fn check_events(events: &[String]) -> ApiResult<()> {
    if events.is_empty() {
        return Err(ApiError::invalid_field("events", "at least one event is required"));
    }

    if let Some(unknown) = events.iter().find(|e| !WEBHOOK_EVENTS.contains(&e.as_str())) {
        return Err(ApiError::invalid_field(
            "events",
            format!("unknown event '{unknown}'. Must be one of: {}", WEBHOOK_EVENTS.join(", ")),
        ));
    }

    Ok(())
}

impl WebhookBody {
    fn into_new(self) -> ApiResult<NewWebhook> {
        let url = required(self.url, "url")?;
        check_url(&url)?;

        let events = self.events.unwrap_or_default();
        check_events(&events)?;

        Ok(NewWebhook {
            name: self.name.filter(|n| !n.trim().is_empty()),
            url,
            events,
            enabled: self.enabled.unwrap_or(true),
            secret: self.secret.filter(|s| !s.is_empty()),
        })
    }

    /// Only the fields present are validated and changed.
    fn into_update(self) -> ApiResult<WebhookUpdate> {
        if let Some(url) = &self.url {
            check_url(url)?;
        }
        if let Some(events) = &self.events {
            check_events(events)?;
        }

        Ok(WebhookUpdate {
            name: self.name.filter(|n| !n.trim().is_empty()),
            url: self.url,
            events: self.events,
            enabled: self.enabled,
            secret: self.secret.filter(|s| !s.is_empty()),
        })
    }
}

pub async fn list(state: AppState, _req: RouteRequest) -> ApiResult<Json<Value>> {
    let webhooks = state.store.list_webhooks().await?;

    Ok(Json(json!({
        "count": webhooks.len(),
        "webhooks": webhooks,
    })))
}

pub async fn create(state: AppState, req: RouteRequest) -> ApiResult<Json<Value>> {
    let new = req.json::<WebhookBody>()?.into_new()?;
    let webhook = state.store.create_webhook(new).await?;

    Ok(Json(json!({ "success": true, "webhook": webhook })))
}

pub async fn update(state: AppState, req: RouteRequest) -> ApiResult<Json<Value>> {
    let update = req.json::<WebhookBody>()?.into_update()?;
    let webhook = state.store.update_webhook(req.param(0), update).await?;

    Ok(Json(json!({ "success": true, "webhook": webhook })))
}

pub async fn delete(state: AppState, req: RouteRequest) -> ApiResult<Json<Value>> {
    state.store.delete_webhook(req.param(0)).await?;
    Ok(Json(json!({ "success": true })))
}

/// Deliveries are never recorded, so the history is always empty.
pub async fn deliveries(state: AppState, req: RouteRequest) -> ApiResult<Json<Value>> {
    state.store.get_webhook(req.param(0)).await?;

    Ok(Json(json!({ "deliveries": [], "count": 0 })))
}

pub async fn test(state: AppState, req: RouteRequest) -> ApiResult<Json<Value>> {
    let webhook = state.store.get_webhook(req.param(0)).await?;
    let outcome = state.webhooks.send_test(&webhook).await?;
    let webhook = state.store.record_webhook_trigger(&webhook.id, &outcome.status).await?;

    Ok(Json(json!({
        "success": outcome.status == "success",
        "delivery": outcome,
        "webhook": webhook,
    })))
}
