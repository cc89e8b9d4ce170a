//! Demo time series for the dashboard and per-container charts.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::Serialize;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum MetricsRange {
    #[default]
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "6h")]
    SixHours,
    #[serde(rename = "24h")]
    OneDay,
    #[serde(rename = "7d")]
    SevenDays,
    #[serde(rename = "30d")]
    ThirtyDays,
}

impl MetricsRange {
    pub const ALL: [&'static str; 5] = ["1h", "6h", "24h", "7d", "30d"];

    pub fn points(&self) -> i64 {
        match self {
            MetricsRange::OneHour => 60,
            MetricsRange::SixHours => 72,
            MetricsRange::OneDay => 96,
            MetricsRange::SevenDays => 84,
            MetricsRange::ThirtyDays => 90,
        }
    }

    pub fn span(&self) -> Duration {
        match self {
            MetricsRange::OneHour => Duration::hours(1),
            MetricsRange::SixHours => Duration::hours(6),
            MetricsRange::OneDay => Duration::hours(24),
            MetricsRange::SevenDays => Duration::days(7),
            MetricsRange::ThirtyDays => Duration::days(30),
        }
    }

    pub fn step(&self) -> Duration {
        self.span() / self.points() as i32
    }
}

impl FromStr for MetricsRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "1h" => Ok(MetricsRange::OneHour),
            "6h" => Ok(MetricsRange::SixHours),
            "24h" => Ok(MetricsRange::OneDay),
            "7d" => Ok(MetricsRange::SevenDays),
            "30d" => Ok(MetricsRange::ThirtyDays),
            other => Err(format!(
                "Invalid range '{other}'. Must be one of: {}",
                MetricsRange::ALL.join(", ")
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct Point {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

/// Oldest point first, ending at `end`. Values wander around `base`
/// by up to `jitter` in either direction and never go negative.
pub fn series(range: MetricsRange, end: DateTime<Utc>, base: f64, jitter: f64) -> Vec<Point> {
    let mut rng = rand::rng();
    let step = range.step();
    let points = range.points();

    (0..points)
        .map(|i| {
            let value = base + rng.random_range(-jitter..=jitter);
            Point {
                timestamp: end - step * (points - 1 - i) as i32,
                value: (value.max(0.0) * 100.0).round() / 100.0,
            }
        })
        .collect()
}

pub fn average(points: &[Point]) -> f64 {
    if points.is_empty() {
        return 0.0;
    }
    let mean = points.iter().map(|p| p.value).sum::<f64>() / points.len() as f64;
    (mean * 100.0).round() / 100.0
}

pub fn total(points: &[Point]) -> f64 {
    points.iter().map(|p| p.value).sum::<f64>().round()
}
