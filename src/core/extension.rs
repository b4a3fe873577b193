//! Extension variants attached to tasks or to the whole schedule.
//!
//! The set is closed: every variant is handled by exactly one
//! [`ExtensionHandler`](crate::core::ExtensionHandler) looked up by its
//! [`ExtensionKind`]. The `Display` output of each variant is the
//! operator-facing description used in listings and logs.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::lock::DEFAULT_TTL_SECS;
use crate::util::time::TimeOfDay;

/// Tag identifying an extension variant, used for handler lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtensionKind {
    /// Local mutual exclusion for a task.
    WithoutOverlapping,
    /// Fleet-wide mutual exclusion for a task.
    #[serde(rename = "only_on_single_server")]
    SingleServer,
    /// Only run inside a daily window.
    Between,
    /// Only run outside a daily window.
    UnlessBetween,
    /// Ping a URL before the task body runs.
    PingBefore,
    /// Ping a URL after the task body, whatever the outcome.
    PingAfter,
    /// Ping a URL when the task succeeds.
    PingOnSuccess,
    /// Ping a URL when the task fails.
    PingOnFailure,
    /// Email the output after every run.
    EmailAfter,
    /// Email the output when the task fails.
    EmailOnFailure,
}

impl ExtensionKind {
    /// Every kind, in canonical order.
    pub const ALL: [Self; 10] = [
        Self::WithoutOverlapping,
        Self::SingleServer,
        Self::Between,
        Self::UnlessBetween,
        Self::PingBefore,
        Self::PingAfter,
        Self::PingOnSuccess,
        Self::PingOnFailure,
        Self::EmailAfter,
        Self::EmailOnFailure,
    ];

    /// Configuration key naming this kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::WithoutOverlapping => "without_overlapping",
            Self::SingleServer => "only_on_single_server",
            Self::Between => "between",
            Self::UnlessBetween => "unless_between",
            Self::PingBefore => "ping_before",
            Self::PingAfter => "ping_after",
            Self::PingOnSuccess => "ping_on_success",
            Self::PingOnFailure => "ping_on_failure",
            Self::EmailAfter => "email_after",
            Self::EmailOnFailure => "email_on_failure",
        }
    }
}

impl fmt::Display for ExtensionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters shared by the locking extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockOptions {
    /// Maximum expected lock duration in seconds.
    #[serde(default = "default_ttl")]
    pub ttl: u64,
}

const fn default_ttl() -> u64 {
    DEFAULT_TTL_SECS
}

impl Default for LockOptions {
    fn default() -> Self {
        Self { ttl: DEFAULT_TTL_SECS }
    }
}

/// Daily window; wraps past midnight when `start` is after `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    /// Window start (inclusive).
    pub start: TimeOfDay,
    /// Window end (inclusive).
    pub end: TimeOfDay,
}

impl TimeWindow {
    /// Build a window.
    pub const fn new(start: TimeOfDay, end: TimeOfDay) -> Self {
        Self { start, end }
    }

    /// Whether `time` falls inside the window.
    pub fn contains(&self, time: TimeOfDay) -> bool {
        if self.start <= self.end {
            self.start <= time && time <= self.end
        } else {
            time >= self.start || time <= self.end
        }
    }
}

/// HTTP ping target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ping {
    /// Target URL.
    pub url: String,
    /// HTTP method.
    #[serde(default = "default_method")]
    pub method: String,
}

fn default_method() -> String {
    "GET".to_string()
}

impl Ping {
    /// `GET` ping to `url`.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: default_method(),
        }
    }
}

/// Email notification options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailOptions {
    /// Recipient; falls back to the notifier's default when absent.
    #[serde(default)]
    pub to: Option<String>,
    /// Subject override.
    #[serde(default)]
    pub subject: Option<String>,
}

/// A behavior attached to a task or to the whole schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Extension {
    /// Skip the run while a previous run of the same task holds the local lock.
    WithoutOverlapping(LockOptions),
    /// Skip the run while any host holds the distributed lock for the task.
    #[serde(rename = "only_on_single_server")]
    SingleServer(LockOptions),
    /// Only run inside the window.
    Between(TimeWindow),
    /// Only run outside the window.
    UnlessBetween(TimeWindow),
    /// Ping before the task body.
    PingBefore(Ping),
    /// Ping after the task body.
    PingAfter(Ping),
    /// Ping on success.
    PingOnSuccess(Ping),
    /// Ping on failure.
    PingOnFailure(Ping),
    /// Email output after every run.
    EmailAfter(EmailOptions),
    /// Email output on failure.
    EmailOnFailure(EmailOptions),
}

impl Extension {
    /// Local lock with the default TTL.
    pub fn without_overlapping() -> Self {
        Self::WithoutOverlapping(LockOptions::default())
    }

    /// Distributed lock with the default TTL.
    pub fn single_server() -> Self {
        Self::SingleServer(LockOptions::default())
    }

    /// Variant tag.
    pub const fn kind(&self) -> ExtensionKind {
        match self {
            Self::WithoutOverlapping(_) => ExtensionKind::WithoutOverlapping,
            Self::SingleServer(_) => ExtensionKind::SingleServer,
            Self::Between(_) => ExtensionKind::Between,
            Self::UnlessBetween(_) => ExtensionKind::UnlessBetween,
            Self::PingBefore(_) => ExtensionKind::PingBefore,
            Self::PingAfter(_) => ExtensionKind::PingAfter,
            Self::PingOnSuccess(_) => ExtensionKind::PingOnSuccess,
            Self::PingOnFailure(_) => ExtensionKind::PingOnFailure,
            Self::EmailAfter(_) => ExtensionKind::EmailAfter,
            Self::EmailOnFailure(_) => ExtensionKind::EmailOnFailure,
        }
    }

    /// Operator-facing description.
    pub fn description(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WithoutOverlapping(_) => f.write_str("Without overlapping"),
            Self::SingleServer(_) => f.write_str("Run on single server"),
            Self::Between(w) => write!(f, "Only run between {} and {}", w.start, w.end),
            Self::UnlessBetween(w) => {
                write!(f, "Only run if not between {} and {}", w.start, w.end)
            }
            Self::PingBefore(p) => write!(f, "Before Task, ping \"{}\"", p.url),
            Self::PingAfter(p) => write!(f, "After Task, ping \"{}\"", p.url),
            Self::PingOnSuccess(p) => write!(f, "On Task Success, ping \"{}\"", p.url),
            Self::PingOnFailure(p) => write!(f, "On Task Failure, ping \"{}\"", p.url),
            Self::EmailAfter(e) => match &e.to {
                Some(to) => write!(f, "After Task, email output to \"{to}\""),
                None => f.write_str("After Task, email output"),
            },
            Self::EmailOnFailure(e) => match &e.to {
                Some(to) => write!(f, "On Task Failure, email output to \"{to}\""),
                None => f.write_str("On Task Failure, email output"),
            },
        }
    }
}
