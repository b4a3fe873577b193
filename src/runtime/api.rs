//! Operator-facing listing of a schedule.

use serde::{Deserialize, Serialize};

use crate::core::{Extension, Schedule, Task};

/// One task as shown by listing/debug tooling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    /// Task identity.
    pub id: String,
    /// Description.
    pub description: String,
    /// Command or process line.
    pub command: String,
    /// Due expression.
    pub expression: String,
    /// Timezone, if any.
    pub timezone: Option<String>,
    /// Descriptions of every extension applied, in pipeline order.
    pub extensions: Vec<String>,
}

/// Whole-schedule listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleSnapshot {
    /// Schedule-level extension descriptions.
    pub extensions: Vec<String>,
    /// Tasks in schedule order.
    pub tasks: Vec<TaskSnapshot>,
}

impl ScheduleSnapshot {
    /// Capture `schedule`.
    pub fn capture(schedule: &Schedule) -> Self {
        Self {
            extensions: schedule.extensions().iter().map(Extension::description).collect(),
            tasks: list_tasks(schedule),
        }
    }
}

fn snapshot(schedule: &Schedule, task: &Task) -> TaskSnapshot {
    TaskSnapshot {
        id: task.id().to_string(),
        description: task.description().to_string(),
        command: task.kind().to_string(),
        expression: task.expression().to_string(),
        timezone: task.timezone().map(str::to_string),
        extensions: schedule.pipeline(task).map(Extension::description).collect(),
    }
}

/// Snapshot every task of `schedule`, in order.
pub fn list_tasks(schedule: &Schedule) -> Vec<TaskSnapshot> {
    schedule
        .tasks()
        .iter()
        .map(|task| snapshot(schedule, task))
        .collect()
}
