use chrono::{DateTime, Utc};
use dockyard_store::{ConsoleStore, Schedule};
use tokio::time::{interval, Duration};
use tracing::{error, info};

/// Periodically report schedules that are due. Nothing is executed and
/// `nextRunAt` is left untouched, so a due schedule is reported again on
/// every pass until someone triggers or reschedules it.
pub async fn start_schedule_scan(store: ConsoleStore, interval_secs: u64) {
    let mut interval = interval(Duration::from_secs(interval_secs.max(1)));

    info!("Schedule scan running (checks every {} seconds)", interval_secs);

    loop {
        interval.tick().await;

        if let Err(e) = scan_due_schedules(&store, Utc::now()).await {
            error!("Schedule scan failed: {}", e);
        }
    }
}

pub async fn scan_due_schedules(store: &ConsoleStore, now: DateTime<Utc>) -> anyhow::Result<Vec<Schedule>> {
    let due = store.due_schedules(now).await?;

    for schedule in &due {
        info!(
            schedule_id = %schedule.id,
            container = %schedule.container_name,
            action = %schedule.action,
            cron = %schedule.cron_expression,
            next_run_at = ?schedule.next_run_at,
            "Schedule due"
        );
    }

    Ok(due)
}
