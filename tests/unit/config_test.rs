//! Tests for configuration models

use prometheus_schedule::config::{CommandSpec, LocalStoreKind, ScheduleConfig, TaskConfig};
use prometheus_schedule::core::{Extension, ExtensionKind, DEFAULT_TTL_SECS};

#[test]
fn test_schedule_config_defaults() {
    let config = ScheduleConfig::from_json_str("{}").unwrap();
    assert_eq!(config, ScheduleConfig::default());
    assert_eq!(config.lock_ttl_secs, DEFAULT_TTL_SECS);
    assert_eq!(config.local_lock_store, LocalStoreKind::Auto);
    assert!(config.single_server_lock_factory.is_none());
    assert!(config.tasks.is_empty());
}

#[test]
fn test_local_lock_store_kinds() {
    for (raw, kind) in [
        ("auto", LocalStoreKind::Auto),
        ("file", LocalStoreKind::File),
        ("memory", LocalStoreKind::Memory),
    ] {
        let config =
            ScheduleConfig::from_json_str(&format!(r#"{{"local_lock_store": "{raw}"}}"#)).unwrap();
        assert_eq!(config.local_lock_store, kind);
    }
    assert!(ScheduleConfig::from_json_str(r#"{"local_lock_store": "flock"}"#).is_err());
    assert!(ScheduleConfig::from_json_str(r#"{"local_lock_store": "semaphore"}"#).is_err());
}

#[test]
fn test_command_spec_shapes() {
    let single: CommandSpec = serde_json::from_str(r#""app:report --all""#).unwrap();
    assert_eq!(single.entries().unwrap(), [(None, "app:report --all".to_string())]);

    let list: CommandSpec = serde_json::from_str(r#"["a", "bash:/b.sh"]"#).unwrap();
    assert_eq!(
        list.entries().unwrap(),
        [(None, "a".to_string()), (None, "bash:/b.sh".to_string())]
    );

    let described: CommandSpec =
        serde_json::from_str(r#"{"second": "b", "first": "a"}"#).unwrap();
    assert_eq!(
        described.entries().unwrap(),
        [
            (Some("second".to_string()), "b".to_string()),
            (Some("first".to_string()), "a".to_string())
        ]
    );
}

#[test]
fn test_command_spec_rejects_empty_and_blank() {
    let empty: CommandSpec = serde_json::from_str("[]").unwrap();
    assert_eq!(empty.entries().unwrap_err(), "command list is empty");

    let blank: CommandSpec = serde_json::from_str(r#"["a", "  "]"#).unwrap();
    assert!(blank.entries().unwrap_err().contains("is blank"));

    let not_string: CommandSpec = serde_json::from_str(r#"{"x": 1}"#).unwrap();
    assert!(not_string.entries().is_err());
}

#[test]
fn test_task_extensions_follow_field_order() {
    let task: TaskConfig = serde_json::from_str(
        r#"{
            "command": "app:x",
            "frequency": "* * * * *",
            "email_after": null,
            "ping_before": {"url": "https://example.com/b"},
            "without_overlapping": {"ttl": 60}
        }"#,
    )
    .unwrap();

    let kinds: Vec<ExtensionKind> = task
        .extensions
        .extensions(DEFAULT_TTL_SECS)
        .iter()
        .map(Extension::kind)
        .collect();
    assert_eq!(
        kinds,
        [
            ExtensionKind::WithoutOverlapping,
            ExtensionKind::PingBefore,
            ExtensionKind::EmailAfter
        ]
    );
}

#[test]
fn test_lock_ttl_falls_back_to_schedule_default() {
    let task: TaskConfig = serde_json::from_str(
        r#"{"command": "app:x", "frequency": "@hourly", "without_overlapping": null, "only_on_single_server": {"ttl": 30}}"#,
    )
    .unwrap();
    let extensions = task.extensions.extensions(900);
    let ttls: Vec<u64> = extensions
        .iter()
        .filter_map(|ext| match ext {
            Extension::WithoutOverlapping(lock) | Extension::SingleServer(lock) => Some(lock.ttl),
            _ => None,
        })
        .collect();
    assert_eq!(ttls, [900, 30]);
}

#[test]
fn test_absent_keys_attach_nothing() {
    let task: TaskConfig =
        serde_json::from_str(r#"{"command": "app:x", "frequency": "* * * * *"}"#).unwrap();
    assert!(task.extensions.extensions(DEFAULT_TTL_SECS).is_empty());
}

#[test]
fn test_validation_errors() {
    let cases = [
        (r#"{"lock_ttl_secs": 0}"#, "lock_ttl_secs must be greater than 0"),
        (r#"{"single_server_lock_factory": " "}"#, "single_server_lock_factory must not be empty"),
        (
            r#"{"tasks": [{"command": "a", "frequency": " "}]}"#,
            "task #0 invalid: frequency must not be empty",
        ),
        (
            r#"{"tasks": [{"command": "a", "frequency": "* * * * *", "without_overlapping": {"ttl": 0}}]}"#,
            "task #0 invalid: without_overlapping.ttl must be greater than 0",
        ),
        (
            r#"{"extensions": {"ping_after": {"url": ""}}}"#,
            "schedule extensions invalid: ping_after.url must not be empty",
        ),
    ];
    for (raw, expected) in cases {
        assert_eq!(ScheduleConfig::from_json_str(raw).unwrap_err(), expected, "{raw}");
    }
}

#[test]
fn test_from_path_reads_json_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("schedule.json");
    std::fs::write(
        &path,
        r#"{"timezone": "+02:00", "tasks": [{"command": "app:x", "frequency": "0 * * * *"}]}"#,
    )
    .unwrap();

    let config = ScheduleConfig::from_path(&path).unwrap();
    assert_eq!(config.timezone.as_deref(), Some("+02:00"));
    assert_eq!(config.tasks.len(), 1);

    dir.close().unwrap();
    assert!(ScheduleConfig::from_path(&path).unwrap_err().starts_with("cannot read"));
}
