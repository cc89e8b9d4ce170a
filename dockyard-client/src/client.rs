//! Typed HTTP client for the console API
//!
//! Reads go through a [`TtlCache`] keyed by endpoint and query parameters
//! unless the caller asks for [`Fetch::Fresh`]. Every write drops the cached
//! entries of the collections it can change, so the next read refetches.

use crate::cache::{cache_key, TtlCache};
use crate::error::{ClientError, ErrorEnvelope, Result};
use crate::pages::{RegistrationForm, ScheduleForm};
use crate::types::{
    ActionOutcome, Health, Instance, JobPage, JobQuery, MetricsReport, Positions, RestoreOutcome,
    SnapshotDetail, TopologyGraph, TopologyNode,
};
use dockyard_store::{
    Container, ContainerConfig, Job, JobStats, Schedule, Snapshot, SnapshotStats, ValidationReport,
    Webhook,
};
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

/// Header the access gate reads when no cookie is present.
pub const ACCESS_HEADER: &str = "Cf-Access-Jwt-Assertion";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Whether a read may be served from the cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Fetch {
    #[default]
    Cached,
    Fresh,
}

pub struct ConsoleClient {
    http: Client,
    base_url: String,
    token: Option<String>,
    cache: TtlCache<Value>,
}

fn segment(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

fn field<T: DeserializeOwned>(mut body: Value, name: &str) -> Result<T> {
    let value = body
        .get_mut(name)
        .map(Value::take)
        .ok_or_else(|| ClientError::Decode(format!("missing field `{name}`")))?;
    decode(value)
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| ClientError::Decode(e.to_string()))
}

impl ConsoleClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("dockyard-client/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: None,
            cache: TtlCache::default(),
        })
    }

    /// Send an access token with every request.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache = TtlCache::new(ttl);
        self
    }

    pub fn cache(&self) -> &TtlCache<Value> {
        &self.cache
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, format!("{}{path}", self.base_url));
        match &self.token {
            Some(token) => builder.header(ACCESS_HEADER, token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Value> {
        let response = builder.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            let envelope: ErrorEnvelope = serde_json::from_slice(&bytes).unwrap_or(ErrorEnvelope {
                error: status.canonical_reason().unwrap_or("Request failed").to_string(),
                message: None,
                field: None,
            });
            return Err(envelope.into_error(status.as_u16()));
        }

        serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode(e.to_string()))
    }

    async fn get(&self, path: &str, params: &[(&str, String)], fetch: Fetch) -> Result<Value> {
        let key = cache_key(path, params);

        if fetch == Fetch::Cached {
            if let Some(hit) = self.cache.get(&key) {
                debug!(key = %key, "Cache hit");
                return Ok(hit);
            }
        }

        let value = self
            .send(self.request(Method::GET, path).query(params))
            .await?;
        self.cache.insert(key, value.clone());
        Ok(value)
    }

    /// Send a write and drop cached reads under each of `invalidates`.
    async fn write(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        invalidates: &[&str],
    ) -> Result<Value> {
        let mut builder = self.request(method, path);
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let result = self.send(builder).await;
        for prefix in invalidates {
            self.cache.invalidate(prefix);
        }
        result
    }

    pub async fn health(&self) -> Result<Health> {
        decode(self.get("/api/health", &[], Fetch::Fresh).await?)
    }

    // Containers

    pub async fn containers(&self, fetch: Fetch) -> Result<Vec<Container>> {
        field(self.get("/api/containers", &[], fetch).await?, "containers")
    }

    pub async fn container(&self, name: &str, fetch: Fetch) -> Result<Container> {
        decode(self.get(&format!("/api/containers/{}", segment(name)), &[], fetch).await?)
    }

    /// Validates locally first; nothing is sent for an invalid form.
    pub async fn register_container(&self, form: &RegistrationForm) -> Result<Container> {
        form.validate()?;
        let body = serde_json::to_value(form).map_err(|e| ClientError::Decode(e.to_string()))?;

        let response = self
            .write(
                Method::POST,
                "/api/containers/register",
                Some(&body),
                &["/api/containers", "/api/topology"],
            )
            .await?;
        field(response, "container")
    }

    pub async fn delete_container(&self, name: &str) -> Result<()> {
        self.write(
            Method::DELETE,
            &format!("/api/containers/{}", segment(name)),
            None,
            &["/api/containers", "/api/topology"],
        )
        .await
        .map(drop)
    }

    pub async fn restart_container(&self, name: &str) -> Result<ActionOutcome> {
        self.container_action(name, "restart").await
    }

    pub async fn stop_container(&self, name: &str) -> Result<ActionOutcome> {
        self.container_action(name, "stop").await
    }

    async fn container_action(&self, name: &str, action: &str) -> Result<ActionOutcome> {
        decode(
            self.write(
                Method::POST,
                &format!("/api/containers/{}/{action}", segment(name)),
                None,
                &["/api/containers", "/api/jobs"],
            )
            .await?,
        )
    }

    pub async fn set_color(&self, name: &str, color: &str) -> Result<()> {
        self.write(
            Method::PUT,
            &format!("/api/containers/{}/color", segment(name)),
            Some(&json!({ "color": color })),
            &["/api/containers"],
        )
        .await
        .map(drop)
    }

    pub async fn instances(&self, name: &str, fetch: Fetch) -> Result<Vec<Instance>> {
        let path = format!("/api/containers/{}/instances", segment(name));
        field(self.get(&path, &[], fetch).await?, "instances")
    }

    pub async fn container_config(&self, name: &str, fetch: Fetch) -> Result<ContainerConfig> {
        let path = format!("/api/containers/{}/config", segment(name));
        field(self.get(&path, &[], fetch).await?, "config")
    }

    /// The store mirrors part of the config onto the container row, so the
    /// whole container collection is dropped, not just the config entry.
    pub async fn update_config(&self, name: &str, config: &ContainerConfig) -> Result<ContainerConfig> {
        let path = format!("/api/containers/{}/config", segment(name));
        let body = serde_json::to_value(config).map_err(|e| ClientError::Decode(e.to_string()))?;
        field(
            self.write(Method::PUT, &path, Some(&body), &["/api/containers"])
                .await?,
            "config",
        )
    }

    pub async fn validate_config(&self, name: &str, config: &ContainerConfig) -> Result<ValidationReport> {
        let path = format!("/api/containers/{}/config/validate", segment(name));
        let body = serde_json::to_value(config).map_err(|e| ClientError::Decode(e.to_string()))?;
        decode(self.write(Method::POST, &path, Some(&body), &[]).await?)
    }

    // Topology

    pub async fn topology(&self, fetch: Fetch) -> Result<TopologyGraph> {
        decode(self.get("/api/topology", &[], fetch).await?)
    }

    pub async fn topology_orphans(&self, fetch: Fetch) -> Result<Vec<TopologyNode>> {
        field(self.get("/api/topology/orphans", &[], fetch).await?, "orphans")
    }

    pub async fn save_positions(&self, positions: &Positions) -> Result<Positions> {
        let response = self
            .write(
                Method::PUT,
                "/api/topology/positions",
                Some(&json!({ "positions": positions })),
                &["/api/topology"],
            )
            .await?;
        field(response, "positions")
    }

    // Metrics

    pub async fn dashboard_metrics(&self, range: &str, fetch: Fetch) -> Result<MetricsReport> {
        decode(
            self.get("/api/metrics/dashboard", &[("range", range.to_string())], fetch)
                .await?,
        )
    }

    pub async fn container_metrics(&self, name: &str, range: &str, fetch: Fetch) -> Result<MetricsReport> {
        let path = format!("/api/metrics/{}", segment(name));
        decode(self.get(&path, &[("range", range.to_string())], fetch).await?)
    }

    // Jobs

    pub async fn jobs(&self, query: &JobQuery, fetch: Fetch) -> Result<JobPage> {
        decode(self.get("/api/jobs", &query.params(), fetch).await?)
    }

    pub async fn job_stats(&self, fetch: Fetch) -> Result<JobStats> {
        decode(self.get("/api/jobs/stats", &[], fetch).await?)
    }

    pub async fn job(&self, id: &str, fetch: Fetch) -> Result<Job> {
        decode(self.get(&format!("/api/jobs/{}", segment(id)), &[], fetch).await?)
    }

    pub async fn cancel_job(&self, id: &str) -> Result<Job> {
        let path = format!("/api/jobs/{}/cancel", segment(id));
        field(self.write(Method::POST, &path, None, &["/api/jobs"]).await?, "job")
    }

    pub async fn retry_job(&self, id: &str) -> Result<Job> {
        let path = format!("/api/jobs/{}/retry", segment(id));
        field(self.write(Method::POST, &path, None, &["/api/jobs"]).await?, "job")
    }

    // Webhooks

    pub async fn webhooks(&self, fetch: Fetch) -> Result<Vec<Webhook>> {
        field(self.get("/api/webhooks", &[], fetch).await?, "webhooks")
    }

    pub async fn create_webhook(&self, url: &str, events: &[&str]) -> Result<Webhook> {
        let body = json!({ "url": url, "events": events });
        let response = self
            .write(Method::POST, "/api/webhooks", Some(&body), &["/api/webhooks"])
            .await?;
        field(response, "webhook")
    }

    pub async fn delete_webhook(&self, id: &str) -> Result<()> {
        let path = format!("/api/webhooks/{}", segment(id));
        self.write(Method::DELETE, &path, None, &["/api/webhooks"])
            .await
            .map(drop)
    }

    // Snapshots

    pub async fn snapshots(&self, container: Option<&str>, fetch: Fetch) -> Result<Vec<Snapshot>> {
        let params: Vec<(&str, String)> = container
            .map(|c| vec![("container", c.to_string())])
            .unwrap_or_default();
        field(self.get("/api/snapshots", &params, fetch).await?, "snapshots")
    }

    pub async fn snapshot_stats(&self, fetch: Fetch) -> Result<SnapshotStats> {
        decode(self.get("/api/snapshots/stats", &[], fetch).await?)
    }

    pub async fn snapshot(&self, id: &str, fetch: Fetch) -> Result<SnapshotDetail> {
        decode(self.get(&format!("/api/snapshots/{}", segment(id)), &[], fetch).await?)
    }

    pub async fn create_snapshot(
        &self,
        container_name: &str,
        name: Option<&str>,
        description: Option<&str>,
    ) -> Result<Snapshot> {
        let body = json!({
            "containerName": container_name,
            "name": name,
            "description": description,
        });
        let response = self
            .write(Method::POST, "/api/snapshots", Some(&body), &["/api/snapshots"])
            .await?;
        field(response, "snapshot")
    }

    pub async fn delete_snapshot(&self, id: &str) -> Result<()> {
        let path = format!("/api/snapshots/{}", segment(id));
        self.write(Method::DELETE, &path, None, &["/api/snapshots"])
            .await
            .map(drop)
    }

    pub async fn restore_snapshot(&self, id: &str, dry_run: bool, create_backup: bool) -> Result<RestoreOutcome> {
        let path = format!("/api/snapshots/{}/restore", segment(id));
        let body = json!({ "dryRun": dry_run, "createBackup": create_backup });
        let invalidates: &[&str] = if dry_run {
            &[]
        } else {
            &["/api/snapshots", "/api/jobs"]
        };
        decode(self.write(Method::POST, &path, Some(&body), invalidates).await?)
    }

    // Schedules

    pub async fn schedules(&self, container: Option<&str>, fetch: Fetch) -> Result<Vec<Schedule>> {
        let params: Vec<(&str, String)> = container
            .map(|c| vec![("container", c.to_string())])
            .unwrap_or_default();
        field(self.get("/api/schedules", &params, fetch).await?, "schedules")
    }

    pub async fn create_schedule(&self, form: &ScheduleForm) -> Result<Schedule> {
        form.validate()?;
        let body = serde_json::to_value(form).map_err(|e| ClientError::Decode(e.to_string()))?;
        let response = self
            .write(Method::POST, "/api/schedules", Some(&body), &["/api/schedules"])
            .await?;
        field(response, "schedule")
    }

    pub async fn set_schedule_enabled(&self, id: &str, enabled: bool) -> Result<Schedule> {
        let path = format!("/api/schedules/{}", segment(id));
        let response = self
            .write(Method::PUT, &path, Some(&json!({ "enabled": enabled })), &["/api/schedules"])
            .await?;
        field(response, "schedule")
    }

    pub async fn trigger_schedule(&self, id: &str) -> Result<ActionOutcome> {
        let path = format!("/api/schedules/{}/trigger", segment(id));
        decode(
            self.write(Method::POST, &path, None, &["/api/schedules", "/api/jobs"])
                .await?,
        )
    }

    pub async fn delete_schedule(&self, id: &str) -> Result<()> {
        let path = format!("/api/schedules/{}", segment(id));
        self.write(Method::DELETE, &path, None, &["/api/schedules"])
            .await
            .map(drop)
    }
}
