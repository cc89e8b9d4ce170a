mod common;

use chrono::{Duration, Utc};
use common::{count_rows, create_test_db};
use dockyard_api::scanner::scan_due_schedules;
use dockyard_store::{ConsoleStore, NewSchedule, ScheduleUpdate};

fn nightly(container: &str, enabled: bool) -> NewSchedule {
    NewSchedule {
        container_name: container.to_string(),
        name: format!("{container}-nightly"),
        action: "restart".to_string(),
        cron_expression: "0 3 * * *".to_string(),
        timezone: None,
        enabled,
    }
}

#[tokio::test]
async fn test_nothing_due_right_after_creation() {
    let pool = create_test_db().await;
    let store = ConsoleStore::new(pool);
    store.create_schedule(nightly("svc-a", true)).await.unwrap();

    let due = scan_due_schedules(&store, Utc::now()).await.unwrap();
    assert!(due.is_empty());
}

#[tokio::test]
async fn test_due_schedules_are_reported_without_side_effects() {
    let pool = create_test_db().await;
    let store = ConsoleStore::new(pool.clone());
    let schedule = store.create_schedule(nightly("svc-a", true)).await.unwrap();
    store.create_schedule(nightly("svc-b", false)).await.unwrap();

    let later = Utc::now() + Duration::hours(2);
    let due = scan_due_schedules(&store, later).await.unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].id, schedule.id);

    // Reporting a schedule neither runs it nor moves it along
    let after = store.get_schedule(&schedule.id).await.unwrap();
    assert_eq!(after.run_count, 0);
    assert_eq!(after.next_run_at, schedule.next_run_at);
    assert_eq!(count_rows(&pool, "jobs").await, 0);

    // ...so the next pass reports it again
    let due = scan_due_schedules(&store, later).await.unwrap();
    assert_eq!(due.len(), 1);
}

#[tokio::test]
async fn test_paused_schedule_drops_out_of_scan() {
    let pool = create_test_db().await;
    let store = ConsoleStore::new(pool);
    let schedule = store.create_schedule(nightly("svc-a", true)).await.unwrap();

    store
        .update_schedule(
            &schedule.id,
            ScheduleUpdate {
                enabled: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let due = scan_due_schedules(&store, Utc::now() + Duration::days(2)).await.unwrap();
    assert!(due.is_empty());
}
