//! Scheduling pass: select due tasks and drive each through the pipeline.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::core::{
    build_audit_event, AppResult, AuditAction, AuditSink, ExtensionDispatcher, HookError,
    RunContext, Schedule, Task,
};
use crate::util::clock::{Clock, SystemClock};

/// Decides whether a task's expression matches the current instant.
///
/// Cron parsing and timezone handling live behind this trait.
pub trait DueEvaluator: Send + Sync {
    /// Whether `expression` (in `timezone`) is due at `now`.
    fn is_due(&self, expression: &str, timezone: Option<&str>, now: DateTime<Utc>) -> bool;
}

/// Evaluator treating every task as due. Useful for "run now" commands.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysDue;

impl DueEvaluator for AlwaysDue {
    fn is_due(&self, _expression: &str, _timezone: Option<&str>, _now: DateTime<Utc>) -> bool {
        true
    }
}

impl<F> DueEvaluator for F
where
    F: Fn(&str, Option<&str>, DateTime<Utc>) -> bool + Send + Sync,
{
    fn is_due(&self, expression: &str, timezone: Option<&str>, now: DateTime<Utc>) -> bool {
        self(expression, timezone, now)
    }
}

/// Performs the actual work of a task (command or process invocation).
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Run `task` and return its output, or the failure.
    async fn execute(&self, task: &Task) -> AppResult<String>;
}

#[async_trait]
impl<T: TaskExecutor + ?Sized> TaskExecutor for Arc<T> {
    async fn execute(&self, task: &Task) -> AppResult<String> {
        (**self).execute(task).await
    }
}

/// How one task's run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    /// A filter (lock contention, time window) prevented the run.
    Skipped {
        /// Why the run was skipped.
        reason: String,
    },
    /// Body succeeded.
    Succeeded {
        /// Body output.
        output: String,
    },
    /// Body, a filter or a `before` hook failed.
    Failed {
        /// Rendered error chain.
        error: String,
    },
}

/// Result of one task within a pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskRun {
    /// Task identity.
    pub task_id: String,
    /// Task description.
    pub description: String,
    /// Final status.
    pub status: RunStatus,
    /// Secondary failures from `after` / `on_success` / `on_failure` hooks.
    pub hook_errors: Vec<String>,
}

impl TaskRun {
    fn new(task: &Task, status: RunStatus, hook_errors: Vec<String>) -> Self {
        Self {
            task_id: task.id().to_string(),
            description: task.description().to_string(),
            status,
            hook_errors,
        }
    }

    /// Whether the run was skipped.
    pub const fn is_skipped(&self) -> bool {
        matches!(self.status, RunStatus::Skipped { .. })
    }

    /// Whether the body succeeded.
    pub const fn is_success(&self) -> bool {
        matches!(self.status, RunStatus::Succeeded { .. })
    }

    /// Whether the run failed.
    pub const fn is_failure(&self) -> bool {
        matches!(self.status, RunStatus::Failed { .. })
    }
}

/// Outcome of a whole scheduling pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Instant the pass evaluated due-ness at.
    pub started_at: DateTime<Utc>,
    /// One entry per due task, in schedule order.
    pub runs: Vec<TaskRun>,
}

impl RunReport {
    /// Runs that were skipped.
    pub fn skipped(&self) -> impl Iterator<Item = &TaskRun> {
        self.runs.iter().filter(|run| run.is_skipped())
    }

    /// Runs that succeeded.
    pub fn succeeded(&self) -> impl Iterator<Item = &TaskRun> {
        self.runs.iter().filter(|run| run.is_success())
    }

    /// Runs that failed.
    pub fn failed(&self) -> impl Iterator<Item = &TaskRun> {
        self.runs.iter().filter(|run| run.is_failure())
    }

    /// True when nothing failed.
    pub fn is_success(&self) -> bool {
        self.failed().next().is_none()
    }
}

/// Runs due tasks of a schedule through the extension pipeline.
pub struct ScheduleRunner<D, X> {
    schedule: Arc<Schedule>,
    dispatcher: Arc<ExtensionDispatcher>,
    evaluator: D,
    executor: X,
    clock: Arc<dyn Clock>,
    audit: Option<Arc<Mutex<dyn AuditSink>>>,
}

impl<D, X> ScheduleRunner<D, X>
where
    D: DueEvaluator,
    X: TaskExecutor,
{
    /// Create a runner over a validated schedule.
    pub fn new(
        schedule: Arc<Schedule>,
        dispatcher: Arc<ExtensionDispatcher>,
        evaluator: D,
        executor: X,
    ) -> Self {
        Self {
            schedule,
            dispatcher,
            evaluator,
            executor,
            clock: Arc::new(SystemClock),
            audit: None,
        }
    }

    /// Use `clock` for due-ness and run timestamps.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Attach an audit sink.
    #[must_use]
    pub fn with_audit(mut self, audit: Arc<Mutex<dyn AuditSink>>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Schedule being run.
    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Tasks due at `now`, in schedule order.
    pub fn due_tasks(&self, now: DateTime<Utc>) -> Vec<&Task> {
        self.schedule
            .tasks()
            .iter()
            .filter(|task| self.evaluator.is_due(task.expression(), task.timezone(), now))
            .collect()
    }

    /// Run every task due now, one after another.
    ///
    /// A skip or failure of one task never stops the others.
    pub async fn run_due(&self) -> RunReport {
        let started_at = self.clock.now();
        let due = self.due_tasks(started_at);
        tracing::debug!(due = due.len(), total = self.schedule.tasks().len(), "scheduling pass");

        let mut runs = Vec::with_capacity(due.len());
        for task in due {
            runs.push(self.run_task(task).await);
        }

        let report = RunReport { started_at, runs };
        tracing::info!(
            ran = report.runs.len(),
            succeeded = report.succeeded().count(),
            failed = report.failed().count(),
            skipped = report.skipped().count(),
            "scheduling pass finished"
        );
        report
    }

    /// Drive one task through filter, before, body, after and outcome hooks.
    pub async fn run_task(&self, task: &Task) -> TaskRun {
        let mut ctx = RunContext::new(task, &self.schedule, self.clock.now());

        match self.dispatcher.filter(&mut ctx) {
            Ok(()) => {}
            Err(HookError::Skip(reason)) => {
                tracing::info!(task_id = task.id(), task = task.description(), %reason, "task skipped");
                self.record(task, AuditAction::Skipped, Some(reason.clone()));
                return TaskRun::new(task, RunStatus::Skipped { reason }, Vec::new());
            }
            Err(HookError::Failed(error)) => {
                let error = format!("{error:#}");
                tracing::warn!(task_id = task.id(), task = task.description(), %error, "task filter failed");
                self.record(task, AuditAction::Failed, Some(error.clone()));
                return TaskRun::new(task, RunStatus::Failed { error }, Vec::new());
            }
        }

        self.record(task, AuditAction::Started, None);
        let mut skipped = None;
        match self.dispatcher.before(&mut ctx).await {
            Ok(()) => match self.executor.execute(task).await {
                Ok(output) => ctx.mark_success(output),
                Err(error) => ctx.mark_failure(error),
            },
            Err(HookError::Skip(reason)) => skipped = Some(reason),
            Err(HookError::Failed(error)) => ctx.mark_failure(error),
        }

        let mut hook_errors = self.dispatcher.after(&mut ctx).await;
        if skipped.is_none() {
            if ctx.is_success() {
                hook_errors.extend(self.dispatcher.on_success(&mut ctx).await);
            } else {
                hook_errors.extend(self.dispatcher.on_failure(&mut ctx).await);
            }
        }

        let hook_errors: Vec<String> = hook_errors.iter().map(|e| format!("{e:#}")).collect();
        for error in &hook_errors {
            self.record(task, AuditAction::HookFailed, Some(error.clone()));
        }

        let status = if let Some(reason) = skipped {
            tracing::info!(task_id = task.id(), task = task.description(), %reason, "task skipped");
            self.record(task, AuditAction::Skipped, Some(reason.clone()));
            RunStatus::Skipped { reason }
        } else if let Some(error) = ctx.error() {
            let error = format!("{error:#}");
            tracing::warn!(task_id = task.id(), task = task.description(), %error, "task failed");
            self.record(task, AuditAction::Failed, Some(error.clone()));
            RunStatus::Failed { error }
        } else {
            tracing::info!(task_id = task.id(), task = task.description(), "task succeeded");
            self.record(task, AuditAction::Succeeded, None);
            RunStatus::Succeeded {
                output: ctx.output().unwrap_or_default().to_string(),
            }
        };

        TaskRun::new(task, status, hook_errors)
    }

    fn record(&self, task: &Task, action: AuditAction, detail: Option<String>) {
        if let Some(audit) = &self.audit {
            audit
                .lock()
                .record(build_audit_event(task.id(), task.description(), action, detail));
        }
    }
}
