//! Core model and extension pipeline.

pub mod audit;
pub mod dispatcher;
pub mod error;
pub mod extension;
pub mod handler;
pub mod lock;
pub mod notify;
pub mod runner;
pub mod task;

pub use audit::{build_audit_event, AuditAction, AuditEvent, AuditSink, InMemoryAuditSink};
pub use dispatcher::{ExtensionDispatcher, Stage};
pub use error::{AppResult, HookError, ScheduleError};
pub use extension::{EmailOptions, Extension, ExtensionKind, LockOptions, Ping, TimeWindow};
pub use handler::{
    EmailHandler, ExtensionHandler, LockingHandler, PingHandler, TimeWindowHandler,
    SINGLE_SERVER_CONFIG_PATH,
};
pub use lock::{Lock, LockStore, LockToken, DEFAULT_TTL_SECS};
pub use notify::{EmailMessage, Notifier, TracingNotifier};
pub use runner::{AlwaysDue, DueEvaluator, RunReport, RunStatus, ScheduleRunner, TaskExecutor, TaskRun};
pub use task::{Outcome, RunContext, Schedule, Task, TaskKind, PROCESS_PREFIX};
