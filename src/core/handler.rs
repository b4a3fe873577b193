//! Extension handlers: the behavior behind each extension variant.
//!
//! Each handler claims one or more [`ExtensionKind`]s and implements the
//! lifecycle hooks it cares about; the rest default to no-ops.

use std::sync::Arc;

use async_trait::async_trait;

use crate::core::{
    EmailMessage, EmailOptions, Extension, ExtensionKind, HookError, Lock, LockOptions, LockStore,
    Notifier, RunContext, ScheduleError, Task,
};
use crate::util::clock::Clock;
use crate::util::time::{local_time_of_day, parse_zone};

/// Config path operators must set to enable single-server locking.
pub const SINGLE_SERVER_CONFIG_PATH: &str = "single_server_lock_factory";

/// Behavior for a subset of extension kinds.
///
/// `filter` is synchronous: lock acquisition never waits. The remaining hooks
/// may deliver notifications and are awaited.
#[async_trait]
pub trait ExtensionHandler: Send + Sync {
    /// Whether this handler processes `kind`.
    fn supports(&self, kind: ExtensionKind) -> bool;

    /// Build-time check of an extension as attached to `task`.
    fn validate(&self, _task: &Task, _extension: &Extension) -> Result<(), ScheduleError> {
        Ok(())
    }

    /// Decide whether the task runs. `HookError::Skip` stops the run.
    fn filter(&self, _ctx: &mut RunContext<'_>, _extension: &Extension) -> Result<(), HookError> {
        Ok(())
    }

    /// Runs before the task body.
    async fn before(&self, _ctx: &mut RunContext<'_>, _extension: &Extension) -> Result<(), HookError> {
        Ok(())
    }

    /// Runs after the task body whatever the outcome.
    async fn after(&self, _ctx: &mut RunContext<'_>, _extension: &Extension) -> Result<(), HookError> {
        Ok(())
    }

    /// Runs after a successful body.
    async fn on_success(&self, _ctx: &mut RunContext<'_>, _extension: &Extension) -> Result<(), HookError> {
        Ok(())
    }

    /// Runs after a failed body.
    async fn on_failure(&self, _ctx: &mut RunContext<'_>, _extension: &Extension) -> Result<(), HookError> {
        Ok(())
    }
}

/// Acquires a lock in `filter` and releases it in `after`.
///
/// Backs both `WithoutOverlapping` (local store) and `SingleServer`
/// (distributed store). The lease lives in the run context, so it is released
/// even when the run is abandoned before `after`.
pub struct LockingHandler {
    kind: ExtensionKind,
    store: Option<Arc<dyn LockStore>>,
}

impl LockingHandler {
    /// Handler for `WithoutOverlapping`, backed by the host-local store.
    pub fn without_overlapping(store: Arc<dyn LockStore>) -> Self {
        Self {
            kind: ExtensionKind::WithoutOverlapping,
            store: Some(store),
        }
    }

    /// Handler for `SingleServer`. A missing store fails schedule validation.
    pub fn single_server(store: Option<Arc<dyn LockStore>>) -> Self {
        Self {
            kind: ExtensionKind::SingleServer,
            store,
        }
    }

    /// Lock key for `task` under `kind`.
    pub fn lock_key(kind: ExtensionKind, task_id: &str) -> String {
        format!("{kind}:{task_id}")
    }

    /// Remediation message for a missing distributed store.
    pub fn missing_dependency_message() -> String {
        format!(
            "To use \"{}\" you must configure a lock factory (config path: \"{SINGLE_SERVER_CONFIG_PATH}\").",
            ExtensionKind::SingleServer
        )
    }

    fn missing_dependency(&self) -> ScheduleError {
        ScheduleError::MissingDependency {
            extension: self.kind.as_str(),
            message: Self::missing_dependency_message(),
        }
    }

    fn options(extension: &Extension) -> LockOptions {
        match extension {
            Extension::WithoutOverlapping(options) | Extension::SingleServer(options) => *options,
            _ => LockOptions::default(),
        }
    }

    const fn contention_reason(&self) -> &'static str {
        match self.kind {
            ExtensionKind::SingleServer => "Task running on another server.",
            _ => "Task running in another process.",
        }
    }
}

#[async_trait]
impl ExtensionHandler for LockingHandler {
    fn supports(&self, kind: ExtensionKind) -> bool {
        kind == self.kind
    }

    fn validate(&self, _task: &Task, extension: &Extension) -> Result<(), ScheduleError> {
        if self.store.is_none() {
            return Err(self.missing_dependency());
        }
        if Self::options(extension).ttl == 0 {
            return Err(ScheduleError::InvalidConfig(format!(
                "{}: ttl must be greater than 0",
                self.kind
            )));
        }
        Ok(())
    }

    fn filter(&self, ctx: &mut RunContext<'_>, extension: &Extension) -> Result<(), HookError> {
        let store = self.store.as_ref().ok_or_else(|| self.missing_dependency())?;
        let key = Self::lock_key(self.kind, ctx.task().id());
        let ttl = Self::options(extension).ttl;
        // same lock attached at schedule and task level
        if ctx.held_keys().contains(&key.as_str()) {
            return Ok(());
        }

        match Lock::acquire(store, &key, ttl)? {
            Some(lock) => {
                tracing::debug!(task_id = ctx.task().id(), key = %key, ttl, store = store.name(), "lock acquired");
                ctx.hold(lock);
                Ok(())
            }
            None => Err(HookError::skip(self.contention_reason())),
        }
    }

    async fn after(&self, ctx: &mut RunContext<'_>, _extension: &Extension) -> Result<(), HookError> {
        let key = Self::lock_key(self.kind, ctx.task().id());
        ctx.release(&key)?;
        Ok(())
    }
}

/// Filters runs by time of day (`Between` / `UnlessBetween`).
pub struct TimeWindowHandler {
    clock: Arc<dyn Clock>,
}

impl TimeWindowHandler {
    /// Handler reading wall time from `clock`.
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }
}

#[async_trait]
impl ExtensionHandler for TimeWindowHandler {
    fn supports(&self, kind: ExtensionKind) -> bool {
        matches!(kind, ExtensionKind::Between | ExtensionKind::UnlessBetween)
    }

    fn validate(&self, task: &Task, _extension: &Extension) -> Result<(), ScheduleError> {
        if let Some(timezone) = task.timezone() {
            parse_zone(timezone).map_err(ScheduleError::InvalidConfig)?;
        }
        Ok(())
    }

    fn filter(&self, ctx: &mut RunContext<'_>, extension: &Extension) -> Result<(), HookError> {
        let now = local_time_of_day(self.clock.now(), ctx.task().timezone())
            .map_err(|e| HookError::Failed(anyhow::anyhow!(e)))?;

        match extension {
            Extension::Between(window) if !window.contains(now) => Err(HookError::skip(format!(
                "Only runs between {} and {}",
                window.start, window.end
            ))),
            Extension::UnlessBetween(window) if window.contains(now) => Err(HookError::skip(
                format!("Only runs if not between {} and {}", window.start, window.end),
            )),
            _ => Ok(()),
        }
    }
}

/// Sends pings around the task body.
pub struct PingHandler {
    notifier: Arc<dyn Notifier>,
}

impl PingHandler {
    /// Handler delivering through `notifier`.
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }
}

#[async_trait]
impl ExtensionHandler for PingHandler {
    fn supports(&self, kind: ExtensionKind) -> bool {
        matches!(
            kind,
            ExtensionKind::PingBefore
                | ExtensionKind::PingAfter
                | ExtensionKind::PingOnSuccess
                | ExtensionKind::PingOnFailure
        )
    }

    async fn before(&self, _ctx: &mut RunContext<'_>, extension: &Extension) -> Result<(), HookError> {
        if let Extension::PingBefore(ping) = extension {
            self.notifier.ping(&ping.url, &ping.method).await?;
        }
        Ok(())
    }

    async fn after(&self, _ctx: &mut RunContext<'_>, extension: &Extension) -> Result<(), HookError> {
        if let Extension::PingAfter(ping) = extension {
            self.notifier.ping(&ping.url, &ping.method).await?;
        }
        Ok(())
    }

    async fn on_success(&self, _ctx: &mut RunContext<'_>, extension: &Extension) -> Result<(), HookError> {
        if let Extension::PingOnSuccess(ping) = extension {
            self.notifier.ping(&ping.url, &ping.method).await?;
        }
        Ok(())
    }

    async fn on_failure(&self, _ctx: &mut RunContext<'_>, extension: &Extension) -> Result<(), HookError> {
        if let Extension::PingOnFailure(ping) = extension {
            self.notifier.ping(&ping.url, &ping.method).await?;
        }
        Ok(())
    }
}

/// Emails the run output.
pub struct EmailHandler {
    notifier: Arc<dyn Notifier>,
}

impl EmailHandler {
    /// Handler delivering through `notifier`.
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self { notifier }
    }

    fn message(ctx: &RunContext<'_>, options: &EmailOptions) -> EmailMessage {
        let task = ctx.task();
        let failed = ctx.error().is_some();
        let subject = options.subject.clone().unwrap_or_else(|| {
            let status = if failed { "Failed" } else { "Succeeded" };
            format!("[Scheduled Task {status}] {}", task.description())
        });

        let mut body = format!(
            "Task: {}\nCommand: {}\nExpression: {}\nStarted: {}\n",
            task.description(),
            task.kind(),
            task.expression(),
            ctx.started_at().to_rfc3339(),
        );
        match (ctx.error(), ctx.output()) {
            (Some(error), _) => body.push_str(&format!("\nError:\n{error:#}\n")),
            (None, Some(output)) => body.push_str(&format!("\nOutput:\n{output}\n")),
            (None, None) => {}
        }

        EmailMessage {
            to: options.to.clone(),
            subject,
            body,
        }
    }
}

#[async_trait]
impl ExtensionHandler for EmailHandler {
    fn supports(&self, kind: ExtensionKind) -> bool {
        matches!(kind, ExtensionKind::EmailAfter | ExtensionKind::EmailOnFailure)
    }

    async fn after(&self, ctx: &mut RunContext<'_>, extension: &Extension) -> Result<(), HookError> {
        if let Extension::EmailAfter(options) = extension {
            let message = Self::message(ctx, options);
            self.notifier.email(&message).await?;
        }
        Ok(())
    }

    async fn on_failure(&self, ctx: &mut RunContext<'_>, extension: &Extension) -> Result<(), HookError> {
        if let Extension::EmailOnFailure(options) = extension {
            let message = Self::message(ctx, options);
            self.notifier.email(&message).await?;
        }
        Ok(())
    }
}
