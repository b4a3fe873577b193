//! Tests for builder modules

use std::sync::Arc;

use prometheus_schedule::builders::ScheduleBuilder;
use prometheus_schedule::config::{ScheduleConfig, TaskConfig};
use prometheus_schedule::core::{Extension, HookError, RunContext, ScheduleError, Task, TaskKind};
use prometheus_schedule::infra::lock::InMemoryLockStore;
use prometheus_schedule::util::clock::SystemClock;

fn entry(raw: &str) -> TaskConfig {
    serde_json::from_str(raw).unwrap()
}

fn memory_builder(config: ScheduleConfig) -> ScheduleBuilder {
    ScheduleBuilder::new(config).with_local_store(Arc::new(InMemoryLockStore::new(Arc::new(SystemClock))))
}

#[test]
fn test_expand_single_command_uses_description_override() {
    let builder = ScheduleBuilder::default();
    let tasks = builder
        .expand(&entry(
            r#"{"command": "my:command --option", "frequency": "@daily", "description": "nightly"}"#,
        ))
        .unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].description(), "nightly");
    assert_eq!(
        *tasks[0].kind(),
        TaskKind::Command {
            name: "my:command".into(),
            args: vec!["--option".into()]
        }
    );
}

#[test]
fn test_expand_compound_ignores_shared_description() {
    let builder = ScheduleBuilder::default();
    let tasks = builder
        .expand(&entry(
            r#"{"command": ["a:one", "bash:/two.sh"], "frequency": "@daily", "description": "ignored"}"#,
        ))
        .unwrap();
    let descriptions: Vec<&str> = tasks.iter().map(Task::description).collect();
    assert_eq!(descriptions, ["a:one", "/two.sh"]);
    assert_eq!(
        *tasks[1].kind(),
        TaskKind::Process {
            command_line: "/two.sh".into()
        }
    );
}

#[test]
fn test_expand_falls_back_to_schedule_timezone() {
    let config = ScheduleConfig {
        timezone: Some("+02:00".into()),
        ..ScheduleConfig::default()
    };
    let builder = ScheduleBuilder::new(config);

    let inherited = builder.expand(&entry(r#"{"command": "a", "frequency": "@daily"}"#)).unwrap();
    assert_eq!(inherited[0].timezone(), Some("+02:00"));

    let own = builder
        .expand(&entry(r#"{"command": "a", "frequency": "@daily", "timezone": "UTC"}"#))
        .unwrap();
    assert_eq!(own[0].timezone(), Some("UTC"));
}

#[test]
fn test_duplicate_tasks_are_rejected() {
    let result = memory_builder(ScheduleConfig::default())
        .with_task(Task::from_command("app:x", "@daily").unwrap())
        .with_task(Task::from_command("app:x", "@daily").unwrap())
        .build();
    assert!(matches!(result, Err(ScheduleError::DuplicateTask { .. })));
}

#[test]
fn test_same_command_on_different_expressions_is_allowed() {
    let built = memory_builder(ScheduleConfig::default())
        .with_task(Task::from_command("app:x", "@daily").unwrap())
        .with_task(Task::from_command("app:x", "@hourly").unwrap())
        .build()
        .unwrap();
    let ids: Vec<&str> = built.schedule.tasks().iter().map(Task::id).collect();
    assert_ne!(ids[0], ids[1]);
}

#[test]
fn test_config_tasks_precede_programmatic_tasks() {
    let config = ScheduleConfig::from_json_str(
        r#"{"extensions": {"without_overlapping": null}, "tasks": [{"command": "from:config", "frequency": "@daily"}]}"#,
    )
    .unwrap();
    let built = memory_builder(config)
        .with_task(Task::from_command("from:code", "@daily").unwrap())
        .with_schedule_extension(Extension::single_server())
        .build();
    // single-server needs a distributed store; nothing was registered
    assert!(matches!(built, Err(ScheduleError::MissingDependency { .. })));

    let config = ScheduleConfig::from_json_str(
        r#"{"extensions": {"without_overlapping": null}, "tasks": [{"command": "from:config", "frequency": "@daily"}]}"#,
    )
    .unwrap();
    let built = memory_builder(config)
        .with_task(Task::from_command("from:code", "@daily").unwrap())
        .build()
        .unwrap();
    let descriptions: Vec<&str> = built.schedule.tasks().iter().map(Task::description).collect();
    assert_eq!(descriptions, ["from:config", "from:code"]);
    assert_eq!(built.schedule.extensions(), [Extension::without_overlapping()]);
}

#[test]
fn test_file_store_is_built_from_config() {
    let root = tempfile::tempdir().expect("tempdir");
    let dir = root.path().join("locks");
    let config = ScheduleConfig::from_json_str(&format!(
        r#"{{"local_lock_store": "file", "lock_dir": {}, "tasks": [{{"command": "a", "frequency": "@daily", "without_overlapping": null}}]}}"#,
        serde_json::to_string(&dir).unwrap()
    ))
    .unwrap();
    let built = ScheduleBuilder::new(config).build().unwrap();
    assert_eq!(built.schedule.tasks().len(), 1);
    assert!(dir.is_dir());
}

#[test]
fn test_default_local_store_excludes_separately_built_schedules() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = || {
        ScheduleConfig::from_json_str(&format!(
            r#"{{"lock_dir": {}, "tasks": [{{"command": "app:report", "frequency": "@hourly", "without_overlapping": null}}]}}"#,
            serde_json::to_string(dir.path()).unwrap()
        ))
        .unwrap()
    };
    // two schedulers on one host, each building its own stores
    let first = ScheduleBuilder::new(config()).build().unwrap();
    let second = ScheduleBuilder::new(config()).build().unwrap();

    let first_task = &first.schedule.tasks()[0];
    let second_task = &second.schedule.tasks()[0];
    assert_eq!(first_task.id(), second_task.id());

    let mut running = RunContext::new(first_task, &first.schedule, chrono::Utc::now());
    first.dispatcher.filter(&mut running).unwrap();

    let mut contender = RunContext::new(second_task, &second.schedule, chrono::Utc::now());
    match second.dispatcher.filter(&mut contender) {
        Err(HookError::Skip(reason)) => assert_eq!(reason, "Task running in another process."),
        other => panic!("expected skip, got {other:?}"),
    }

    drop(running);
    let mut next = RunContext::new(second_task, &second.schedule, chrono::Utc::now());
    assert!(second.dispatcher.filter(&mut next).is_ok());
}

#[test]
fn test_invalid_config_fails_build() {
    let config = ScheduleConfig {
        lock_ttl_secs: 0,
        ..ScheduleConfig::default()
    };
    let Err(err) = ScheduleBuilder::new(config).build() else {
        panic!("zero ttl must be rejected");
    };
    assert_eq!(err.to_string(), "invalid configuration: lock_ttl_secs must be greater than 0");
}
