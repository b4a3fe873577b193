//! Configuration models for schedules, tasks and lock stores.

pub mod schedule;

pub use schedule::{
    CommandSpec, ExtensionsConfig, LocalStoreKind, LockConfig, ScheduleConfig, TaskConfig,
    CONFIG_PATH_ENV,
};
