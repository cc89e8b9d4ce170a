//! Per-container runtime configuration: environment variables, networking,
//! health checks and sleep policy, plus the validation and diff rules the
//! console applies before anything is saved or restored.

use crate::container::{Container, INSTANCE_TYPES};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

static ENV_KEY_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("env key regex should compile - static pattern")
});

static DURATION_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d+[smh]$").expect("duration regex should compile - static pattern")
});

const PROTOCOLS: &[&str] = &["http", "https", "tcp"];
const SECRET_MARKERS: &[&str] = &["SECRET", "TOKEN", "PASSWORD", "KEY"];
const MAX_INSTANCES_LIMIT: i64 = 100;
const MAX_INSTANCES_WARNING: i64 = 20;
const MAX_HEALTH_RETRIES: i64 = 10;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ContainerConfig {
    #[serde(default)]
    pub env_vars: BTreeMap<String, String>,
    #[serde(default)]
    pub networking: NetworkingConfig,
    #[serde(default)]
    pub health_check: HealthCheckConfig,
    #[serde(default)]
    pub sleep_policy: SleepPolicy,
    #[serde(default = "default_instance_type")]
    pub instance_type: String,
    #[serde(default = "default_max_instances")]
    pub max_instances: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct NetworkingConfig {
    pub port: i64,
    pub protocol: String,
    pub public: bool,
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct HealthCheckConfig {
    pub enabled: bool,
    pub path: String,
    pub interval_seconds: i64,
    pub timeout_seconds: i64,
    pub retries: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct SleepPolicy {
    pub enabled: bool,
    pub sleep_after: String,
}

fn default_instance_type() -> String {
    crate::container::DEFAULT_INSTANCE_TYPE.to_string()
}

fn default_max_instances() -> i64 {
    crate::container::DEFAULT_MAX_INSTANCES
}

impl Default for NetworkingConfig {
    fn default() -> Self {
        Self {
            port: crate::container::DEFAULT_PORT,
            protocol: "http".to_string(),
            public: false,
            allowed_origins: Vec::new(),
        }
    }
}

impl Default for HealthCheckConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/health".to_string(),
            interval_seconds: 30,
            timeout_seconds: 5,
            retries: 3,
        }
    }
}

impl Default for SleepPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            sleep_after: crate::container::DEFAULT_SLEEP_AFTER.to_string(),
        }
    }
}

impl Default for ContainerConfig {
    fn default() -> Self {
        Self {
            env_vars: BTreeMap::new(),
            networking: NetworkingConfig::default(),
            health_check: HealthCheckConfig::default(),
            sleep_policy: SleepPolicy::default(),
            instance_type: default_instance_type(),
            max_instances: default_max_instances(),
        }
    }
}

impl ContainerConfig {
    /// Configuration implied by a registration that never saved one.
    pub fn for_container(container: &Container) -> Self {
        Self {
            networking: NetworkingConfig {
                port: container.default_port,
                ..Default::default()
            },
            sleep_policy: SleepPolicy {
                enabled: true,
                sleep_after: container.sleep_after.clone(),
            },
            instance_type: container.instance_type.clone(),
            max_instances: container.max_instances,
            ..Default::default()
        }
    }

    /// Fixed "current" configuration used by the validate/diff, snapshot and
    /// restore paths. The runtime never reports real configuration back, so
    /// these operate on this stand-in rather than on a live container.
    pub fn demo() -> Self {
        let env_vars = [
            ("NODE_ENV", "production"),
            ("LOG_LEVEL", "info"),
            ("API_URL", "https://api.example.com"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        Self {
            env_vars,
            networking: NetworkingConfig {
                port: 8080,
                protocol: "https".to_string(),
                public: true,
                allowed_origins: vec!["https://console.example.com".to_string()],
            },
            health_check: HealthCheckConfig::default(),
            sleep_policy: SleepPolicy::default(),
            instance_type: "standard-1".to_string(),
            max_instances: 5,
        }
    }

    pub fn validate(&self) -> ValidationReport {
        let mut errors = Vec::new();
        let mut warnings = Vec::new();

        for key in self.env_vars.keys() {
            if !ENV_KEY_REGEX.is_match(key) {
                errors.push(FieldError::new(
                    format!("envVars.{key}"),
                    "must start with a letter or underscore and contain only letters, digits and underscores",
                ));
            } else if SECRET_MARKERS.iter().any(|m| key.to_uppercase().contains(m)) {
                warnings.push(format!(
                    "envVars.{key} looks like a secret; prefer a secret binding over a plain variable"
                ));
            }
        }

        if !(1..=65535).contains(&self.networking.port) {
            errors.push(FieldError::new("networking.port", "must be between 1 and 65535"));
        }
        if !PROTOCOLS.contains(&self.networking.protocol.as_str()) {
            errors.push(FieldError::new(
                "networking.protocol",
                format!("must be one of: {}", PROTOCOLS.join(", ")),
            ));
        }

        let hc = &self.health_check;
        if !hc.path.starts_with('/') {
            errors.push(FieldError::new("healthCheck.path", "must start with '/'"));
        }
        if hc.interval_seconds < 1 {
            errors.push(FieldError::new("healthCheck.intervalSeconds", "must be at least 1"));
        }
        if hc.timeout_seconds < 1 {
            errors.push(FieldError::new("healthCheck.timeoutSeconds", "must be at least 1"));
        } else if hc.timeout_seconds >= hc.interval_seconds {
            errors.push(FieldError::new(
                "healthCheck.timeoutSeconds",
                "must be shorter than intervalSeconds",
            ));
        }
        if !(0..=MAX_HEALTH_RETRIES).contains(&hc.retries) {
            errors.push(FieldError::new(
                "healthCheck.retries",
                format!("must be between 0 and {MAX_HEALTH_RETRIES}"),
            ));
        }

        if !DURATION_REGEX.is_match(&self.sleep_policy.sleep_after) {
            errors.push(FieldError::new(
                "sleepPolicy.sleepAfter",
                "must be a duration such as 30s, 10m or 2h",
            ));
        }
        if !self.sleep_policy.enabled {
            warnings.push("sleep is disabled; idle instances will keep running".to_string());
        }

        if !INSTANCE_TYPES.contains(&self.instance_type.as_str()) {
            errors.push(FieldError::new(
                "instanceType",
                format!("must be one of: {}", INSTANCE_TYPES.join(", ")),
            ));
        }
        if !(1..=MAX_INSTANCES_LIMIT).contains(&self.max_instances) {
            errors.push(FieldError::new(
                "maxInstances",
                format!("must be between 1 and {MAX_INSTANCES_LIMIT}"),
            ));
        } else if self.max_instances > MAX_INSTANCES_WARNING {
            warnings.push(format!(
                "maxInstances above {MAX_INSTANCES_WARNING} may exceed account limits"
            ));
        }

        ValidationReport {
            valid: errors.is_empty(),
            errors,
            warnings,
        }
    }

    /// Field-level changes needed to go from `self` to `proposed`.
    pub fn diff(&self, proposed: &ContainerConfig) -> Vec<ConfigChange> {
        let current = serde_json::to_value(self).unwrap_or(Value::Null);
        let proposed = serde_json::to_value(proposed).unwrap_or(Value::Null);

        let mut changes = Vec::new();
        diff_values("", &current, &proposed, &mut changes);
        changes
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationReport {
    pub valid: bool,
    pub errors: Vec<FieldError>,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Added,
    Removed,
    Modified,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfigChange {
    pub field: String,
    pub from: Option<Value>,
    pub to: Option<Value>,
    pub kind: ChangeKind,
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

// Objects are compared key by key; anything else (arrays included) is a leaf.
fn diff_values(prefix: &str, current: &Value, proposed: &Value, out: &mut Vec<ConfigChange>) {
    match (current, proposed) {
        (Value::Object(a), Value::Object(b)) => diff_objects(prefix, a, b, out),
        (a, b) if a != b => out.push(ConfigChange {
            field: prefix.to_string(),
            from: Some(a.clone()),
            to: Some(b.clone()),
            kind: ChangeKind::Modified,
        }),
        _ => {}
    }
}

fn diff_objects(prefix: &str, a: &Map<String, Value>, b: &Map<String, Value>, out: &mut Vec<ConfigChange>) {
    for (key, old) in a {
        let path = join_path(prefix, key);
        match b.get(key) {
            Some(new) => diff_values(&path, old, new, out),
            None => out.push(ConfigChange {
                field: path,
                from: Some(old.clone()),
                to: None,
                kind: ChangeKind::Removed,
            }),
        }
    }
    for (key, new) in b {
        if !a.contains_key(key) {
            out.push(ConfigChange {
                field: join_path(prefix, key),
                from: None,
                to: Some(new.clone()),
                kind: ChangeKind::Added,
            });
        }
    }
}
