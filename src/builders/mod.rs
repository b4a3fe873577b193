//! Builders to construct schedules and their dispatcher from configuration.

pub mod schedule_builder;

pub use schedule_builder::{BuiltSchedule, ScheduleBuilder};
