//! # Prometheus Schedule
//!
//! An in-process task scheduler built around an extension pipeline.
//!
//! A [`Schedule`](core::Schedule) holds tasks, each with a due expression and
//! an ordered list of [`Extension`](core::Extension)s. For every due task the
//! [`ScheduleRunner`](core::ScheduleRunner) drives a run through the
//! [`ExtensionDispatcher`](core::ExtensionDispatcher):
//!
//! ```text
//! filter ──skip──▶ (leases released, body not run)
//!   │
//!   ▼
//! before ─▶ body ─▶ after (always; releases locks) ─▶ on_success | on_failure
//! ```
//!
//! ## Locking
//!
//! - `without_overlapping` takes a lock in a host-local
//!   [`LockStore`](core::LockStore) (advisory lock files shared by every
//!   process on the host) so a slow run never overlaps its next tick.
//! - `only_on_single_server` takes the same lock in an operator-supplied
//!   distributed store so at most one host runs the task at a time. Building a
//!   schedule that uses it without a store fails immediately.
//!
//! Acquisition never blocks: contention skips the task for that tick. Locks are
//! bounded by a TTL (3600s by default) so a crashed holder cannot wedge a task.
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use prometheus_schedule::builders::ScheduleBuilder;
//! use prometheus_schedule::config::ScheduleConfig;
//! use prometheus_schedule::core::AlwaysDue;
//!
//! let config = ScheduleConfig::from_json_str(r#"{
//!     "tasks": [{ "command": "app:report", "frequency": "0 * * * *", "without_overlapping": null }]
//! }"#)?;
//! let built = ScheduleBuilder::new(config).build()?;
//! let runner = built.runner(AlwaysDue, my_executor);
//! let report = runner.run_due().await;
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Domain model, lock capability and the extension pipeline.
pub mod core;
/// Configuration models for schedules, tasks and lock stores.
pub mod config;
/// Builders to assemble a validated schedule from configuration.
pub mod builders;
/// Lock store backends.
pub mod infra;
/// Introspection and the periodic ticker.
pub mod runtime;
/// Shared utilities.
pub mod util;
