//! Tests for the listing API and the periodic ticker

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use prometheus_schedule::builders::ScheduleBuilder;
use prometheus_schedule::config::ScheduleConfig;
use prometheus_schedule::core::{AlwaysDue, AppResult, Task, TaskExecutor};
use prometheus_schedule::infra::lock::InMemoryLockStore;
use prometheus_schedule::runtime::{list_tasks, spawn_ticker, ScheduleSnapshot};
use prometheus_schedule::util::clock::SystemClock;

#[derive(Default)]
struct Counting(AtomicUsize);

#[async_trait]
impl TaskExecutor for Counting {
    async fn execute(&self, _task: &Task) -> AppResult<String> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(String::new())
    }
}

fn built() -> prometheus_schedule::builders::BuiltSchedule {
    let config = ScheduleConfig::from_json_str(
        r#"{
            "extensions": {"ping_on_failure": {"url": "https://example.com/alert"}},
            "tasks": [
                {"command": "app:report --all", "frequency": "0 * * * *", "timezone": "UTC", "without_overlapping": null},
                {"command": "bash:/backup.sh", "frequency": "0 0 * * *"}
            ]
        }"#,
    )
    .unwrap();
    ScheduleBuilder::new(config)
        .with_local_store(Arc::new(InMemoryLockStore::new(Arc::new(SystemClock))))
        .build()
        .unwrap()
}

#[test]
fn test_list_tasks_shows_pipeline_order() {
    let built = built();
    let tasks = list_tasks(&built.schedule);
    assert_eq!(tasks.len(), 2);

    assert_eq!(tasks[0].description, "app:report");
    assert_eq!(tasks[0].command, "app:report --all");
    assert_eq!(tasks[0].expression, "0 * * * *");
    assert_eq!(tasks[0].timezone.as_deref(), Some("UTC"));
    assert_eq!(
        tasks[0].extensions,
        [
            "On Task Failure, ping \"https://example.com/alert\"",
            "Without overlapping"
        ]
    );

    assert_eq!(tasks[1].command, "bash: /backup.sh");
    assert_eq!(tasks[1].extensions, ["On Task Failure, ping \"https://example.com/alert\""]);
}

#[test]
fn test_snapshot_serializes() {
    let snapshot = ScheduleSnapshot::capture(&built().schedule);
    assert_eq!(snapshot.extensions, ["On Task Failure, ping \"https://example.com/alert\""]);

    let json = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(json["tasks"][1]["description"], "/backup.sh");
    assert_eq!(json["tasks"][0]["id"].as_str().unwrap().len(), 16);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_ticker_runs_passes_until_aborted() {
    let built = built();
    let executor = Arc::new(Counting::default());
    let runner = Arc::new(built.runner(AlwaysDue, executor.clone()));

    let handle = spawn_ticker(runner, Duration::from_millis(10));
    tokio::time::sleep(Duration::from_millis(80)).await;
    handle.abort();
    let _ = handle.await;

    let ran = executor.0.load(Ordering::SeqCst);
    // first tick fires immediately; later ticks keep running passes
    assert!(ran >= 4, "ran {ran}");
}
