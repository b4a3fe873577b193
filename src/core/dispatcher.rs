//! Extension dispatcher: drives every lifecycle hook through the handlers.
//!
//! Handlers are resolved into a kind → handler table once, when the
//! dispatcher is built. For each hook, the extensions of a run are visited in
//! pipeline order (schedule-level first, then task-level, see
//! [`Schedule::pipeline`]).

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::{
    EmailHandler, Extension, ExtensionHandler, ExtensionKind, HookError, LockStore, LockingHandler,
    Notifier, PingHandler, RunContext, Schedule, ScheduleError, TimeWindowHandler,
};
use crate::util::clock::Clock;

/// Lifecycle point, used for logging and error context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// `filter` hooks.
    Filter,
    /// `before` hooks.
    Before,
    /// `after` hooks.
    After,
    /// `on_success` hooks.
    Success,
    /// `on_failure` hooks.
    Failure,
}

impl Stage {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Filter => "filter",
            Self::Before => "before",
            Self::After => "after",
            Self::Success => "on_success",
            Self::Failure => "on_failure",
        }
    }
}

/// Registry mapping each extension kind to exactly one handler.
pub struct ExtensionDispatcher {
    handlers: Vec<Box<dyn ExtensionHandler>>,
    table: HashMap<ExtensionKind, usize>,
}

impl ExtensionDispatcher {
    /// Resolve the handler table. Two handlers claiming one kind is an error.
    pub fn new(handlers: Vec<Box<dyn ExtensionHandler>>) -> Result<Self, ScheduleError> {
        let mut table = HashMap::new();
        for kind in ExtensionKind::ALL {
            let mut claims = handlers
                .iter()
                .enumerate()
                .filter(|(_, handler)| handler.supports(kind))
                .map(|(index, _)| index);
            if let Some(index) = claims.next() {
                if claims.next().is_some() {
                    return Err(ScheduleError::InvalidConfig(format!(
                        "more than one extension handler supports \"{kind}\""
                    )));
                }
                table.insert(kind, index);
            }
        }
        Ok(Self { handlers, table })
    }

    /// The standard handler set.
    ///
    /// `distributed` may be `None`; schedules using `SingleServer` then fail
    /// [`validate`](Self::validate).
    pub fn with_defaults(
        local: Arc<dyn LockStore>,
        distributed: Option<Arc<dyn LockStore>>,
        clock: Arc<dyn Clock>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, ScheduleError> {
        Self::new(vec![
            Box::new(LockingHandler::without_overlapping(local)),
            Box::new(LockingHandler::single_server(distributed)),
            Box::new(TimeWindowHandler::new(clock)),
            Box::new(PingHandler::new(Arc::clone(&notifier))),
            Box::new(EmailHandler::new(notifier)),
        ])
    }

    /// Handler registered for `kind`.
    pub fn handler(&self, kind: ExtensionKind) -> Result<&dyn ExtensionHandler, ScheduleError> {
        self.table
            .get(&kind)
            .map(|&index| self.handlers[index].as_ref())
            .ok_or_else(|| ScheduleError::UnsupportedExtension(kind.to_string()))
    }

    /// Check every extension of the schedule before anything runs.
    ///
    /// Reports the first missing handler or missing collaborator.
    pub fn validate(&self, schedule: &Schedule) -> Result<(), ScheduleError> {
        // covers schedules that have no tasks yet
        for extension in schedule.extensions() {
            self.handler(extension.kind())?;
        }
        for task in schedule.tasks() {
            for extension in schedule.pipeline(task) {
                self.handler(extension.kind())?.validate(task, extension)?;
            }
        }
        Ok(())
    }

    /// Run every filter in order; the first skip or error stops the run.
    ///
    /// Locks taken by earlier filters are released before returning an error.
    pub fn filter(&self, ctx: &mut RunContext<'_>) -> Result<(), HookError> {
        let (schedule, task) = (ctx.schedule(), ctx.task());
        for extension in schedule.pipeline(task) {
            let result = self
                .handler(extension.kind())
                .map_err(HookError::from)
                .and_then(|handler| handler.filter(ctx, extension));

            if let Err(err) = result {
                for release_err in ctx.release_all() {
                    tracing::warn!(task_id = task.id(), error = %release_err, "failed to release lock after filter");
                }
                return Err(match err {
                    HookError::Skip(reason) => HookError::Skip(reason),
                    HookError::Failed(e) => {
                        HookError::Failed(e.context(hook_context(Stage::Filter, extension)))
                    }
                });
            }
        }
        Ok(())
    }

    /// Run `before` hooks; the first error stops the remaining ones.
    pub async fn before(&self, ctx: &mut RunContext<'_>) -> Result<(), HookError> {
        let (schedule, task) = (ctx.schedule(), ctx.task());
        for extension in schedule.pipeline(task) {
            self.handler(extension.kind())?
                .before(ctx, extension)
                .await
                .map_err(|err| match err {
                    HookError::Failed(e) => {
                        HookError::Failed(e.context(hook_context(Stage::Before, extension)))
                    }
                    skip @ HookError::Skip(_) => skip,
                })?;
        }
        Ok(())
    }

    /// Run every `after` hook, then release any lease still held.
    ///
    /// Failures do not stop later hooks; they are returned for reporting.
    pub async fn after(&self, ctx: &mut RunContext<'_>) -> Vec<anyhow::Error> {
        let mut errors = self.run_all(ctx, Stage::After).await;
        errors.extend(ctx.release_all().into_iter().map(anyhow::Error::from));
        errors
    }

    /// Run every `on_success` hook.
    pub async fn on_success(&self, ctx: &mut RunContext<'_>) -> Vec<anyhow::Error> {
        self.run_all(ctx, Stage::Success).await
    }

    /// Run every `on_failure` hook.
    pub async fn on_failure(&self, ctx: &mut RunContext<'_>) -> Vec<anyhow::Error> {
        self.run_all(ctx, Stage::Failure).await
    }

    async fn run_all(&self, ctx: &mut RunContext<'_>, stage: Stage) -> Vec<anyhow::Error> {
        let (schedule, task) = (ctx.schedule(), ctx.task());
        let mut errors = Vec::new();
        for extension in schedule.pipeline(task) {
            let handler = match self.handler(extension.kind()) {
                Ok(handler) => handler,
                Err(err) => {
                    errors.push(anyhow::Error::from(err));
                    continue;
                }
            };
            let result = match stage {
                Stage::After => handler.after(ctx, extension).await,
                Stage::Success => handler.on_success(ctx, extension).await,
                Stage::Failure => handler.on_failure(ctx, extension).await,
                Stage::Filter | Stage::Before => Ok(()),
            };
            match result {
                Ok(()) => {}
                Err(HookError::Skip(reason)) => {
                    tracing::debug!(task_id = task.id(), stage = stage.as_str(), %reason, "skip ignored outside filter");
                }
                Err(HookError::Failed(e)) => {
                    let e = e.context(hook_context(stage, extension));
                    tracing::warn!(task_id = task.id(), error = %format!("{e:#}"), "extension hook failed");
                    errors.push(e);
                }
            }
        }
        errors
    }
}

fn hook_context(stage: Stage, extension: &Extension) -> String {
    format!("{} hook of \"{extension}\" failed", stage.as_str())
}
