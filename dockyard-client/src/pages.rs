//! Page-local logic for the console: container list filtering and sorting,
//! and the checks the registration and schedule forms run before
//! submitting. The server repeats every check; these only save a round trip.

use crate::error::{ClientError, Result};
use dockyard_store::container::INSTANCE_TYPES;
use dockyard_store::schedule::SCHEDULE_ACTIONS;
use dockyard_store::{cron, Container};
use serde::Serialize;
use std::cmp::Ordering;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerFilter {
    /// Case-insensitive substring of name, class name or image.
    pub text: String,
    /// Exact status; `None` (or "all") shows everything.
    pub status: Option<String>,
}

impl ContainerFilter {
    pub fn matches(&self, container: &Container) -> bool {
        let status_ok = match self.status.as_deref() {
            None | Some("") | Some("all") => true,
            Some(status) => container.status.eq_ignore_ascii_case(status),
        };
        if !status_ok {
            return false;
        }

        let needle = self.text.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }

        [
            Some(container.name.as_str()),
            Some(container.class_name.as_str()),
            container.image.as_deref(),
        ]
        .into_iter()
        .flatten()
        .any(|haystack| haystack.to_lowercase().contains(&needle))
    }

    pub fn apply<'a>(&self, containers: &'a [Container]) -> Vec<&'a Container> {
        containers.iter().filter(|c| self.matches(c)).collect()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortKey {
    #[default]
    Name,
    Status,
    Created,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Stable sort; ties fall back to name so the grid doesn't jump around.
pub fn sort_containers(containers: &mut [&Container], key: SortKey, order: SortOrder) {
    containers.sort_by(|a, b| {
        let primary = match key {
            SortKey::Name => Ordering::Equal,
            SortKey::Status => a.status.cmp(&b.status),
            SortKey::Created => a.created_at.cmp(&b.created_at),
        };
        let ordering = primary.then_with(|| a.name.cmp(&b.name));

        match order {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        }
    });
}

fn invalid(field: &str, message: impl Into<String>) -> ClientError {
    ClientError::Invalid {
        field: field.to_string(),
        message: message.into(),
    }
}

fn require(value: &str, field: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(invalid(field, format!("{field} is required")))
    } else {
        Ok(())
    }
}

/// `10m`, `30s`, `2h`
fn is_duration(value: &str) -> bool {
    match value.char_indices().last() {
        Some((at, unit)) if at > 0 && matches!(unit, 's' | 'm' | 'h') => {
            value[..at].chars().all(|c| c.is_ascii_digit())
        }
        _ => false,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationForm {
    pub name: String,
    pub class_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instance_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_instances: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_port: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sleep_after: Option<String>,
}

impl RegistrationForm {
    pub fn new(name: impl Into<String>, class_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            class_name: class_name.into(),
            ..Default::default()
        }
    }

    /// First problem found, reported against the camelCase field name the
    /// server would use.
    pub fn validate(&self) -> Result<()> {
        require(&self.name, "name")?;
        require(&self.class_name, "className")?;

        if let Some(instance_type) = &self.instance_type {
            if !INSTANCE_TYPES.contains(&instance_type.as_str()) {
                return Err(invalid(
                    "instanceType",
                    format!("instanceType must be one of: {}", INSTANCE_TYPES.join(", ")),
                ));
            }
        }
        if self.max_instances.is_some_and(|n| !(1..=100).contains(&n)) {
            return Err(invalid("maxInstances", "maxInstances must be between 1 and 100"));
        }
        if self.default_port.is_some_and(|p| !(1..=65535).contains(&p)) {
            return Err(invalid("defaultPort", "defaultPort must be between 1 and 65535"));
        }
        if self.sleep_after.as_deref().is_some_and(|s| !is_duration(s)) {
            return Err(invalid(
                "sleepAfter",
                "sleepAfter must be a number followed by s, m or h",
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleForm {
    pub container_name: String,
    pub name: String,
    pub action: String,
    pub cron_expression: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    pub enabled: bool,
}

impl ScheduleForm {
    pub fn new(
        container_name: impl Into<String>,
        name: impl Into<String>,
        action: impl Into<String>,
        cron_expression: impl Into<String>,
    ) -> Self {
        Self {
            container_name: container_name.into(),
            name: name.into(),
            action: action.into(),
            cron_expression: cron_expression.into(),
            timezone: None,
            enabled: true,
        }
    }

    pub fn validate(&self) -> Result<()> {
        require(&self.container_name, "containerName")?;
        require(&self.name, "name")?;
        require(&self.action, "action")?;
        if !SCHEDULE_ACTIONS.contains(&self.action.as_str()) {
            return Err(invalid(
                "action",
                format!("action must be one of: {}", SCHEDULE_ACTIONS.join(", ")),
            ));
        }
        require(&self.cron_expression, "cronExpression")?;
        cron::validate(&self.cron_expression).map_err(|message| invalid("cronExpression", message))
    }

    /// Human-readable cadence shown under the cron input.
    pub fn describe(&self) -> String {
        cron::describe(&self.cron_expression)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn container(name: &str, status: &str, age_hours: i64) -> Container {
        let created = Utc::now() - Duration::hours(age_hours);
        Container {
            name: name.to_string(),
            class_name: "ApiContainer".to_string(),
            image: Some(format!("registry.local/{name}:latest")),
            instance_type: "standard-1".to_string(),
            max_instances: 5,
            default_port: 8080,
            sleep_after: "10m".to_string(),
            status: status.to_string(),
            color: None,
            created_at: created,
            updated_at: created,
        }
    }

    fn field_of(err: ClientError) -> String {
        match err {
            ClientError::Invalid { field, .. } => field,
            other => panic!("expected a local validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_filter_by_text_and_status() {
        let all = vec![
            container("billing-api", "running", 1),
            container("search", "stopped", 2),
            container("billing-worker", "stopped", 3),
        ];

        let filter = ContainerFilter {
            text: "BILLING".to_string(),
            status: None,
        };
        let names: Vec<_> = filter.apply(&all).iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["billing-api", "billing-worker"]);

        let filter = ContainerFilter {
            text: "billing".to_string(),
            status: Some("stopped".to_string()),
        };
        assert_eq!(filter.apply(&all).len(), 1);

        // image text matches too
        let filter = ContainerFilter {
            text: "registry.local/search".to_string(),
            status: Some("all".to_string()),
        };
        assert_eq!(filter.apply(&all)[0].name, "search");
    }

    #[test]
    fn test_sort_orders() {
        let all = vec![
            container("b", "stopped", 1),
            container("a", "running", 3),
            container("c", "running", 2),
        ];
        let mut view: Vec<&Container> = all.iter().collect();
        fn names(v: &[&Container]) -> Vec<String> {
            v.iter().map(|c| c.name.clone()).collect()
        }

        sort_containers(&mut view, SortKey::Name, SortOrder::Descending);
        assert_eq!(names(&view), ["c", "b", "a"]);

        sort_containers(&mut view, SortKey::Status, SortOrder::Ascending);
        assert_eq!(names(&view), ["a", "c", "b"]);

        sort_containers(&mut view, SortKey::Created, SortOrder::Ascending);
        assert_eq!(names(&view), ["a", "c", "b"]);

        sort_containers(&mut view, SortKey::Created, SortOrder::Descending);
        assert_eq!(names(&view), ["b", "c", "a"]);
    }

    #[test]
    fn test_registration_form_checks() {
        assert!(RegistrationForm::new("svc-a", "Api").validate().is_ok());

        let err = RegistrationForm::new(" ", "Api").validate().unwrap_err();
        assert_eq!(field_of(err), "name");

        let form = RegistrationForm {
            instance_type: Some("huge".to_string()),
            ..RegistrationForm::new("svc-a", "Api")
        };
        assert_eq!(field_of(form.validate().unwrap_err()), "instanceType");

        let form = RegistrationForm {
            max_instances: Some(0),
            ..RegistrationForm::new("svc-a", "Api")
        };
        assert_eq!(field_of(form.validate().unwrap_err()), "maxInstances");

        let form = RegistrationForm {
            sleep_after: Some("m".to_string()),
            ..RegistrationForm::new("svc-a", "Api")
        };
        assert_eq!(field_of(form.validate().unwrap_err()), "sleepAfter");
    }

    #[test]
    fn test_registration_form_body_omits_unset_fields() {
        let body = serde_json::to_value(RegistrationForm::new("svc-a", "Api")).unwrap();
        assert_eq!(body, serde_json::json!({ "name": "svc-a", "className": "Api" }));
    }

    #[test]
    fn test_duration_shapes() {
        assert!(is_duration("10m"));
        assert!(is_duration("30s"));
        assert!(is_duration("2h"));
        assert!(!is_duration("10"));
        assert!(!is_duration("h"));
        assert!(!is_duration("1.5h"));
        assert!(!is_duration(""));
    }

    #[test]
    fn test_schedule_form_checks() {
        let form = ScheduleForm::new("svc-a", "nightly", "restart", "0 3 * * *");
        assert!(form.validate().is_ok());
        assert!(form.enabled);

        let bad_cron = ScheduleForm {
            cron_expression: "0 3 * *".to_string(),
            ..form.clone()
        };
        assert_eq!(field_of(bad_cron.validate().unwrap_err()), "cronExpression");

        let bad_action = ScheduleForm {
            action: "explode".to_string(),
            ..form.clone()
        };
        assert_eq!(field_of(bad_action.validate().unwrap_err()), "action");

        let every_five = ScheduleForm {
            cron_expression: "*/5 * * * *".to_string(),
            ..form
        };
        assert_eq!(every_five.describe(), "Every 5 minutes");
    }
}
