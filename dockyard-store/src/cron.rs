//! Cron expression helpers.
//!
//! Schedules are never executed by this system, so there is no real cron
//! evaluation: the next run is always reported as one hour after `now`.
//! Expressions are only checked for shape and rendered as text.

use chrono::{DateTime, Duration, Utc};

const WEEKDAYS: [&str; 7] = [
    "Sunday",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
];

/// Accept five whitespace-separated fields made of cron characters.
pub fn validate(expr: &str) -> Result<(), String> {
    let fields: Vec<&str> = expr.split_whitespace().collect();

    if fields.len() != 5 {
        return Err(format!(
            "cron expression must have 5 fields (minute hour day month weekday), got {}",
            fields.len()
        ));
    }

    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '*' | '/' | ',' | '-');
    if let Some(field) = fields.iter().find(|f| !f.chars().all(allowed)) {
        return Err(format!("invalid cron field '{field}'"));
    }

    Ok(())
}

/// Placeholder for real cron evaluation.
pub fn next_run_after(_expr: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    now + Duration::hours(1)
}

/// Human-readable text for common shapes; anything else is echoed back.
pub fn describe(expr: &str) -> String {
    let fields: Vec<&str> = expr.split_whitespace().collect();
    let [minute, hour, day, month, weekday] = fields.as_slice() else {
        return expr.to_string();
    };

    let at = |h: &str, m: &str| -> Option<String> {
        let h: u32 = h.parse().ok().filter(|h| *h < 24)?;
        let m: u32 = m.parse().ok().filter(|m| *m < 60)?;
        Some(format!("{h:02}:{m:02}"))
    };

    match (*minute, *hour, *day, *month, *weekday) {
        ("*", "*", "*", "*", "*") => "Every minute".to_string(),
        (m, "*", "*", "*", "*") if m.starts_with("*/") => format!("Every {} minutes", &m[2..]),
        ("0", "*", "*", "*", "*") => "Every hour".to_string(),
        ("0", h, "*", "*", "*") if h.starts_with("*/") => format!("Every {} hours", &h[2..]),
        (m, h, "*", "*", "*") => match at(h, m) {
            Some(time) => format!("Daily at {time}"),
            None => expr.to_string(),
        },
        (m, h, "*", "*", "1-5") => match at(h, m) {
            Some(time) => format!("Weekdays at {time}"),
            None => expr.to_string(),
        },
        (m, h, "*", "*", d) => match (at(h, m), d.parse::<usize>().ok().and_then(|d| WEEKDAYS.get(d % 7))) {
            (Some(time), Some(day)) => format!("Every {day} at {time}"),
            _ => expr.to_string(),
        },
        (m, h, d, "*", "*") => match (at(h, m), d.parse::<u32>().ok().filter(|d| (1..=31).contains(d))) {
            (Some(time), Some(day)) => format!("Monthly on day {day} at {time}"),
            _ => expr.to_string(),
        },
        _ => expr.to_string(),
    }
}
