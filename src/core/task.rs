//! Task, schedule and per-run context.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::core::{Extension, Lock, ScheduleError};

/// Prefix marking a configured command as a shell process.
pub const PROCESS_PREFIX: &str = "bash:";

/// What a task runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TaskKind {
    /// Application command with arguments.
    Command {
        /// Command name.
        name: String,
        /// Arguments as configured.
        args: Vec<String>,
    },
    /// Shell process.
    Process {
        /// Full command line.
        command_line: String,
    },
}

impl TaskKind {
    /// Parse a configured command string. `bash:` selects a process.
    pub fn parse(command: &str) -> Result<Self, ScheduleError> {
        let command = command.trim();
        if let Some(line) = command.strip_prefix(PROCESS_PREFIX) {
            let line = line.trim();
            if line.is_empty() {
                return Err(ScheduleError::InvalidConfig(
                    "process command line is empty".into(),
                ));
            }
            return Ok(Self::Process {
                command_line: line.to_string(),
            });
        }

        let mut parts = command.split_whitespace();
        let name = parts
            .next()
            .ok_or_else(|| ScheduleError::InvalidConfig("command is empty".into()))?;
        Ok(Self::Command {
            name: name.to_string(),
            args: parts.map(str::to_string).collect(),
        })
    }

    /// Default description: command name or process command line.
    pub fn default_description(&self) -> &str {
        match self {
            Self::Command { name, .. } => name,
            Self::Process { command_line } => command_line,
        }
    }

    const fn tag(&self) -> &'static str {
        match self {
            Self::Command { .. } => "command",
            Self::Process { .. } => "process",
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Command { name, args } if args.is_empty() => f.write_str(name),
            Self::Command { name, args } => write!(f, "{name} {}", args.join(" ")),
            Self::Process { command_line } => write!(f, "{PROCESS_PREFIX} {command_line}"),
        }
    }
}

/// A schedulable unit of work.
///
/// Deserializing ignores any stored `id` and derives it from the fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "TaskFields")]
pub struct Task {
    id: String,
    kind: TaskKind,
    description: String,
    expression: String,
    timezone: Option<String>,
    extensions: Vec<Extension>,
}

/// Serialized form of a [`Task`] without its derived id.
#[derive(Deserialize)]
struct TaskFields {
    kind: TaskKind,
    description: String,
    expression: String,
    #[serde(default)]
    timezone: Option<String>,
    #[serde(default)]
    extensions: Vec<Extension>,
}

impl From<TaskFields> for Task {
    fn from(fields: TaskFields) -> Self {
        let mut task = Self {
            id: String::new(),
            kind: fields.kind,
            description: fields.description,
            expression: fields.expression,
            timezone: fields.timezone,
            extensions: fields.extensions,
        };
        task.refresh_id();
        task
    }
}

impl Task {
    /// Create a task from its kind and due expression.
    pub fn new(kind: TaskKind, expression: impl Into<String>) -> Self {
        let description = kind.default_description().to_string();
        let mut task = Self {
            id: String::new(),
            kind,
            description,
            expression: expression.into(),
            timezone: None,
            extensions: Vec::new(),
        };
        task.refresh_id();
        task
    }

    /// Parse `command` (see [`TaskKind::parse`]) and create a task.
    pub fn from_command(command: &str, expression: impl Into<String>) -> Result<Self, ScheduleError> {
        Ok(Self::new(TaskKind::parse(command)?, expression))
    }

    /// Override the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self.refresh_id();
        self
    }

    /// Set the timezone the expression is evaluated in.
    #[must_use]
    pub fn with_timezone(mut self, timezone: impl Into<String>) -> Self {
        self.timezone = Some(timezone.into());
        self.refresh_id();
        self
    }

    /// Append an extension.
    #[must_use]
    pub fn with_extension(mut self, extension: Extension) -> Self {
        self.extensions.push(extension);
        self
    }

    /// Stable identity derived from kind, command, expression, timezone and description.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// What the task runs.
    pub const fn kind(&self) -> &TaskKind {
        &self.kind
    }

    /// Human-readable description.
    pub fn description(&self) -> &str {
        &self.description
    }

    /// Due expression, opaque to the pipeline.
    pub fn expression(&self) -> &str {
        &self.expression
    }

    /// Timezone, if any.
    pub fn timezone(&self) -> Option<&str> {
        self.timezone.as_deref()
    }

    /// Task-level extensions in declaration order.
    pub fn extensions(&self) -> &[Extension] {
        &self.extensions
    }

    /// Descriptions of the task-level extensions, in order.
    pub fn extension_descriptions(&self) -> Vec<String> {
        self.extensions.iter().map(Extension::description).collect()
    }

    fn refresh_id(&mut self) {
        let command = self.kind.to_string();
        let mut hasher = Sha256::new();
        for part in [
            self.kind.tag(),
            command.as_str(),
            self.expression.as_str(),
            self.timezone.as_deref().unwrap_or_default(),
            self.description.as_str(),
        ] {
            hasher.update(part.as_bytes());
            hasher.update([0u8]);
        }
        let digest = format!("{:x}", hasher.finalize());
        self.id = digest[..16].to_string();
    }
}

/// Ordered collection of tasks plus schedule-wide extensions.
///
/// Deserializing goes through [`Schedule::add`], so duplicate tasks are
/// rejected.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "ScheduleFields")]
pub struct Schedule {
    tasks: Vec<Task>,
    extensions: Vec<Extension>,
}

#[derive(Deserialize)]
struct ScheduleFields {
    #[serde(default)]
    tasks: Vec<Task>,
    #[serde(default)]
    extensions: Vec<Extension>,
}

impl TryFrom<ScheduleFields> for Schedule {
    type Error = ScheduleError;

    fn try_from(fields: ScheduleFields) -> Result<Self, Self::Error> {
        let mut schedule = Self {
            tasks: Vec::with_capacity(fields.tasks.len()),
            extensions: fields.extensions,
        };
        for task in fields.tasks {
            schedule.add(task)?;
        }
        Ok(schedule)
    }
}

impl Schedule {
    /// Empty schedule.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task; identities must be unique.
    pub fn add(&mut self, task: Task) -> Result<&mut Self, ScheduleError> {
        if self.tasks.iter().any(|t| t.id == task.id) {
            return Err(ScheduleError::DuplicateTask {
                id: task.id,
                description: task.description,
            });
        }
        self.tasks.push(task);
        Ok(self)
    }

    /// Add a schedule-level extension, applied to every task.
    pub fn add_extension(&mut self, extension: Extension) -> &mut Self {
        self.extensions.push(extension);
        self
    }

    /// Tasks in insertion order.
    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Schedule-level extensions.
    pub fn extensions(&self) -> &[Extension] {
        &self.extensions
    }

    /// Look up a task by id.
    pub fn find(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Extensions applied to `task`: schedule-level first, then the task's own.
    pub fn pipeline<'a>(&'a self, task: &'a Task) -> impl Iterator<Item = &'a Extension> + 'a {
        self.extensions.iter().chain(task.extensions.iter())
    }
}

/// Result of a run as tracked through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Body not finished (or never started).
    Pending,
    /// Body succeeded.
    Success,
    /// Body or a `before` hook failed.
    Failure,
}

/// Per-execution record passed through the dispatch pipeline.
///
/// Locks taken by filters are held here until `after` releases them; any
/// lease still held when the context is dropped is released by `Lock`'s drop.
#[derive(Debug)]
pub struct RunContext<'a> {
    task: &'a Task,
    schedule: &'a Schedule,
    started_at: DateTime<Utc>,
    outcome: Outcome,
    output: Option<String>,
    error: Option<anyhow::Error>,
    leases: Vec<Lock>,
}

impl<'a> RunContext<'a> {
    /// Fresh context for one run of `task`.
    pub const fn new(task: &'a Task, schedule: &'a Schedule, started_at: DateTime<Utc>) -> Self {
        Self {
            task,
            schedule,
            started_at,
            outcome: Outcome::Pending,
            output: None,
            error: None,
            leases: Vec::new(),
        }
    }

    /// Task being run.
    pub const fn task(&self) -> &'a Task {
        self.task
    }

    /// Owning schedule.
    pub const fn schedule(&self) -> &'a Schedule {
        self.schedule
    }

    /// When the run started.
    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Current outcome.
    pub const fn outcome(&self) -> Outcome {
        self.outcome
    }

    /// Captured body output on success.
    pub fn output(&self) -> Option<&str> {
        self.output.as_deref()
    }

    /// Captured failure.
    pub const fn error(&self) -> Option<&anyhow::Error> {
        self.error.as_ref()
    }

    /// Whether the run succeeded.
    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }

    /// Record a successful body.
    pub fn mark_success(&mut self, output: impl Into<String>) {
        self.outcome = Outcome::Success;
        self.output = Some(output.into());
    }

    /// Record a failure.
    pub fn mark_failure(&mut self, error: anyhow::Error) {
        self.outcome = Outcome::Failure;
        self.error = Some(error);
    }

    /// Take ownership of an acquired lock for the rest of the run.
    pub fn hold(&mut self, lock: Lock) {
        self.leases.push(lock);
    }

    /// Keys of locks currently held by this run.
    pub fn held_keys(&self) -> Vec<&str> {
        self.leases.iter().map(Lock::key).collect()
    }

    /// Release and forget the lease on `key`, if this run holds it.
    pub fn release(&mut self, key: &str) -> Result<(), ScheduleError> {
        match self.leases.iter().position(|lock| lock.key() == key) {
            Some(index) => self.leases.remove(index).release(),
            None => Ok(()),
        }
    }

    /// Release every lease still held, newest first. Returns the errors met.
    pub fn release_all(&mut self) -> Vec<ScheduleError> {
        let mut errors = Vec::new();
        while let Some(lock) = self.leases.pop() {
            if let Err(err) = lock.release() {
                errors.push(err);
            }
        }
        errors
    }
}
