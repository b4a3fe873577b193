//! Periodic scheduling passes on the tokio runtime.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::core::{DueEvaluator, ScheduleRunner, TaskExecutor};

/// Run a scheduling pass every `every` until the handle is aborted.
///
/// Passes never overlap: a slow pass delays the next tick instead of
/// stacking up behind it.
pub fn spawn_ticker<D, X>(runner: Arc<ScheduleRunner<D, X>>, every: Duration) -> JoinHandle<()>
where
    D: DueEvaluator + 'static,
    X: TaskExecutor + 'static,
{
    tokio::spawn(async move {
        tracing::info!(every_ms = every.as_millis(), "schedule ticker started");
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let report = runner.run_due().await;
            if !report.is_success() {
                tracing::warn!(failed = report.failed().count(), "scheduling pass had failures");
            }
        }
    })
}
