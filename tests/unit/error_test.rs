//! Tests for error types

use prometheus_schedule::core::{HookError, ScheduleError};

#[test]
fn test_missing_dependency_error() {
    let err = ScheduleError::MissingDependency {
        extension: "only_on_single_server",
        message: "configure a lock factory".to_string(),
    };
    assert_eq!(format!("{}", err), "configure a lock factory");
}

#[test]
fn test_unsupported_extension_error() {
    let err = ScheduleError::UnsupportedExtension("between".to_string());
    assert_eq!(format!("{}", err), "no extension handler registered for \"between\"");
}

#[test]
fn test_duplicate_task_error() {
    let err = ScheduleError::DuplicateTask {
        id: "abc".to_string(),
        description: "app:report".to_string(),
    };
    assert_eq!(format!("{}", err), "duplicate task id abc for \"app:report\"");
}

#[test]
fn test_backend_error() {
    let err = ScheduleError::Backend("connection failed".to_string());
    assert_eq!(format!("{}", err), "backend error: connection failed");
}

#[test]
fn test_hook_skip_is_not_a_failure() {
    let err = HookError::skip("Task running in another process.");
    assert!(matches!(err, HookError::Skip(_)));
    assert_eq!(format!("{}", err), "skipped: Task running in another process.");
}

#[test]
fn test_schedule_error_becomes_hook_failure() {
    let err: HookError = ScheduleError::Backend("disk full".to_string()).into();
    assert!(matches!(err, HookError::Failed(_)));
    assert_eq!(format!("{}", err), "backend error: disk full");
}
