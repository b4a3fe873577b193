//! Builds a validated [`Schedule`] and its [`ExtensionDispatcher`].
//!
//! All collaborator checks happen here, before any task can run: an invalid
//! configuration or a missing distributed lock store fails `build`.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{ScheduleConfig, TaskConfig};
use crate::core::{
    DueEvaluator, Extension, ExtensionDispatcher, LockStore, Notifier, Schedule, ScheduleError,
    ScheduleRunner, Task, TaskExecutor, TracingNotifier, SINGLE_SERVER_CONFIG_PATH,
};
use crate::infra::lock::{local_store, FileLockStore};
use crate::util::clock::{Clock, SystemClock};

/// Schedule plus the dispatcher validated against it.
#[derive(Clone)]
pub struct BuiltSchedule {
    /// Tasks and schedule-level extensions.
    pub schedule: Arc<Schedule>,
    /// Handler table for this schedule.
    pub dispatcher: Arc<ExtensionDispatcher>,
    clock: Arc<dyn Clock>,
}

impl BuiltSchedule {
    /// Create a runner sharing this schedule's clock.
    pub fn runner<D, X>(&self, evaluator: D, executor: X) -> ScheduleRunner<D, X>
    where
        D: DueEvaluator,
        X: TaskExecutor,
    {
        ScheduleRunner::new(
            Arc::clone(&self.schedule),
            Arc::clone(&self.dispatcher),
            evaluator,
            executor,
        )
        .with_clock(Arc::clone(&self.clock))
    }
}

/// Assembles a schedule from configuration and programmatic additions.
pub struct ScheduleBuilder {
    config: ScheduleConfig,
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    local_store: Option<Arc<dyn LockStore>>,
    lock_factories: HashMap<String, Arc<dyn LockStore>>,
    tasks: Vec<Task>,
    extensions: Vec<Extension>,
}

impl Default for ScheduleBuilder {
    fn default() -> Self {
        Self::new(ScheduleConfig::default())
    }
}

impl ScheduleBuilder {
    /// Start from `config`.
    pub fn new(config: ScheduleConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
            notifier: Arc::new(TracingNotifier),
            local_store: None,
            lock_factories: HashMap::new(),
            tasks: Vec::new(),
            extensions: Vec::new(),
        }
    }

    /// Configuration the builder reads.
    pub const fn config(&self) -> &ScheduleConfig {
        &self.config
    }

    /// Clock used by lock stores, time windows and the runner.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Notification transport for ping and email extensions.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Use `store` as the host-local store instead of probing.
    #[must_use]
    pub fn with_local_store(mut self, store: Arc<dyn LockStore>) -> Self {
        self.local_store = Some(store);
        self
    }

    /// Register a distributed store under `name`.
    ///
    /// It is used when `single_server_lock_factory` names it.
    #[must_use]
    pub fn register_lock_factory(mut self, name: impl Into<String>, store: Arc<dyn LockStore>) -> Self {
        self.lock_factories.insert(name.into(), store);
        self
    }

    /// Add a task defined in code, after the configured ones.
    #[must_use]
    pub fn with_task(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }

    /// Add a schedule-level extension defined in code.
    #[must_use]
    pub fn with_schedule_extension(mut self, extension: Extension) -> Self {
        self.extensions.push(extension);
        self
    }

    /// Expand one task entry into its tasks (one per command).
    pub fn expand(&self, entry: &TaskConfig) -> Result<Vec<Task>, ScheduleError> {
        let commands = entry.command.entries().map_err(ScheduleError::InvalidConfig)?;
        let single = commands.len() == 1;
        let extensions = entry.extensions.extensions(self.config.lock_ttl_secs);
        let timezone = entry.timezone.as_ref().or(self.config.timezone.as_ref());

        commands
            .into_iter()
            .map(|(label, command)| {
                let mut task = Task::from_command(&command, entry.frequency.clone())?;
                let description = label.or_else(|| entry.description.clone().filter(|_| single));
                if let Some(description) = description {
                    task = task.with_description(description);
                }
                if let Some(timezone) = timezone {
                    task = task.with_timezone(timezone.clone());
                }
                Ok(extensions
                    .iter()
                    .cloned()
                    .fold(task, Task::with_extension))
            })
            .collect()
    }

    fn distributed_store(&self) -> Result<Option<Arc<dyn LockStore>>, ScheduleError> {
        let Some(name) = &self.config.single_server_lock_factory else {
            return Ok(None);
        };
        self.lock_factories
            .get(name)
            .cloned()
            .map(Some)
            .ok_or_else(|| ScheduleError::MissingDependency {
                extension: "only_on_single_server",
                message: format!(
                    "Lock factory \"{name}\" is not registered (config path: \"{SINGLE_SERVER_CONFIG_PATH}\")."
                ),
            })
    }

    /// Validate configuration, assemble the schedule and check every extension.
    pub fn build(self) -> Result<BuiltSchedule, ScheduleError> {
        self.config.validate().map_err(ScheduleError::InvalidConfig)?;

        let local = match &self.local_store {
            Some(store) => Arc::clone(store),
            None => {
                let dir = self
                    .config
                    .lock_dir
                    .clone()
                    .unwrap_or_else(FileLockStore::default_dir);
                local_store(self.config.local_lock_store, &dir, Arc::clone(&self.clock))?
            }
        };
        let distributed = self.distributed_store()?;

        let mut schedule = Schedule::new();
        for extension in self
            .config
            .extensions
            .extensions(self.config.lock_ttl_secs)
            .into_iter()
            .chain(self.extensions.iter().cloned())
        {
            schedule.add_extension(extension);
        }
        for entry in &self.config.tasks {
            for task in self.expand(entry)? {
                schedule.add(task)?;
            }
        }
        for task in self.tasks {
            schedule.add(task)?;
        }

        let dispatcher = ExtensionDispatcher::with_defaults(
            local,
            distributed,
            Arc::clone(&self.clock),
            self.notifier,
        )?;
        dispatcher.validate(&schedule)?;

        tracing::info!(
            tasks = schedule.tasks().len(),
            schedule_extensions = schedule.extensions().len(),
            "schedule built"
        );

        Ok(BuiltSchedule {
            schedule: Arc::new(schedule),
            dispatcher: Arc::new(dispatcher),
            clock: self.clock,
        })
    }
}
