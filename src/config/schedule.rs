//! Schedule and task configuration structures.
//!
//! The JSON shape mirrors what operators write:
//!
//! ```json
//! {
//!   "single_server_lock_factory": "redis",
//!   "tasks": [
//!     {
//!       "command": ["my:command arg", "bash:/my-script"],
//!       "frequency": "0 * * * *",
//!       "without_overlapping": null,
//!       "between": { "start": 9, "end": "17:30" },
//!       "ping_on_failure": { "url": "https://example.com/failure", "method": "POST" }
//!     }
//!   ]
//! }
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};

use crate::core::{EmailOptions, Extension, LockOptions, Ping, TimeWindow, DEFAULT_TTL_SECS};

/// Environment variable naming the configuration file for [`ScheduleConfig::from_env`].
pub const CONFIG_PATH_ENV: &str = "SCHEDULE_CONFIG";

/// Local lock store selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocalStoreKind {
    /// Host-wide advisory lock files under `lock_dir`.
    #[default]
    Auto,
    /// Advisory lock files, named explicitly.
    File,
    /// In-process lock table. Runs from other processes are not excluded.
    Memory,
}

/// Locking extension parameters as configured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockConfig {
    /// Lock TTL in seconds; the schedule default applies when absent.
    #[serde(default)]
    pub ttl: Option<u64>,
}

impl LockConfig {
    fn resolve(self, default_ttl: u64) -> LockOptions {
        LockOptions {
            ttl: self.ttl.unwrap_or(default_ttl),
        }
    }
}

/// `command` entry: one command, a list, or a description → command map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CommandSpec {
    /// Single command.
    Single(String),
    /// Compound task; one task per command.
    List(Vec<String>),
    /// Compound task keyed by description.
    Described(serde_json::Map<String, serde_json::Value>),
}

impl CommandSpec {
    /// Expand into `(description, command)` pairs in declaration order.
    pub fn entries(&self) -> Result<Vec<(Option<String>, String)>, String> {
        let entries: Vec<(Option<String>, String)> = match self {
            Self::Single(command) => vec![(None, command.clone())],
            Self::List(commands) => commands.iter().map(|c| (None, c.clone())).collect(),
            Self::Described(map) => map
                .iter()
                .map(|(description, command)| {
                    command
                        .as_str()
                        .map(|c| (Some(description.clone()), c.to_string()))
                        .ok_or_else(|| format!("command for `{description}` must be a string"))
                })
                .collect::<Result<_, _>>()?,
        };
        if entries.is_empty() {
            return Err("command list is empty".into());
        }
        if let Some((_, blank)) = entries.iter().find(|(_, c)| c.trim().is_empty()) {
            return Err(format!("command `{blank}` is blank"));
        }
        Ok(entries)
    }
}

/// Maps a present key (even `null`) to `Some`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

/// Extension keys shared by task entries and the schedule root.
///
/// Extensions are attached in field order, whatever order the keys appear in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtensionsConfig {
    /// Local overlap lock; `null` enables it with the default TTL.
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub without_overlapping: Option<Option<LockConfig>>,
    /// Fleet-wide lock; `null` enables it with the default TTL.
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub only_on_single_server: Option<Option<LockConfig>>,
    /// Only run inside this window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub between: Option<TimeWindow>,
    /// Only run outside this window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unless_between: Option<TimeWindow>,
    /// Ping before the body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ping_before: Option<Ping>,
    /// Ping after the body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ping_after: Option<Ping>,
    /// Ping on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ping_on_success: Option<Ping>,
    /// Ping on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ping_on_failure: Option<Ping>,
    /// Email output after every run; `null` uses the default recipient.
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub email_after: Option<Option<EmailOptions>>,
    /// Email output on failure; `null` uses the default recipient.
    #[serde(default, deserialize_with = "present", skip_serializing_if = "Option::is_none")]
    pub email_on_failure: Option<Option<EmailOptions>>,
}

impl ExtensionsConfig {
    /// Build the extension list in the fixed attachment order.
    pub fn extensions(&self, default_ttl: u64) -> Vec<Extension> {
        let mut extensions = Vec::new();
        if let Some(lock) = self.without_overlapping {
            extensions.push(Extension::WithoutOverlapping(
                lock.unwrap_or_default().resolve(default_ttl),
            ));
        }
        if let Some(lock) = self.only_on_single_server {
            extensions.push(Extension::SingleServer(
                lock.unwrap_or_default().resolve(default_ttl),
            ));
        }
        extensions.extend(self.between.map(Extension::Between));
        extensions.extend(self.unless_between.map(Extension::UnlessBetween));
        extensions.extend(self.ping_before.clone().map(Extension::PingBefore));
        extensions.extend(self.ping_after.clone().map(Extension::PingAfter));
        extensions.extend(self.ping_on_success.clone().map(Extension::PingOnSuccess));
        extensions.extend(self.ping_on_failure.clone().map(Extension::PingOnFailure));
        if let Some(email) = &self.email_after {
            extensions.push(Extension::EmailAfter(email.clone().unwrap_or_default()));
        }
        if let Some(email) = &self.email_on_failure {
            extensions.push(Extension::EmailOnFailure(email.clone().unwrap_or_default()));
        }
        extensions
    }

    /// Validate literal parameters.
    pub fn validate(&self) -> Result<(), String> {
        for (key, lock) in [
            ("without_overlapping", self.without_overlapping),
            ("only_on_single_server", self.only_on_single_server),
        ] {
            if lock.flatten().and_then(|l| l.ttl) == Some(0) {
                return Err(format!("{key}.ttl must be greater than 0"));
            }
        }
        for (key, ping) in [
            ("ping_before", &self.ping_before),
            ("ping_after", &self.ping_after),
            ("ping_on_success", &self.ping_on_success),
            ("ping_on_failure", &self.ping_on_failure),
        ] {
            if ping.as_ref().is_some_and(|p| p.url.trim().is_empty()) {
                return Err(format!("{key}.url must not be empty"));
            }
        }
        Ok(())
    }
}

/// One configured task entry (possibly compound).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Command(s) to run.
    pub command: CommandSpec,
    /// Due expression (cron syntax, evaluated outside this crate).
    pub frequency: String,
    /// Description override for single-command entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Timezone override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    /// Extensions for every task of this entry.
    #[serde(flatten)]
    pub extensions: ExtensionsConfig,
}

impl TaskConfig {
    /// Validate the entry.
    pub fn validate(&self) -> Result<(), String> {
        if self.frequency.trim().is_empty() {
            return Err("frequency must not be empty".into());
        }
        self.command.entries()?;
        self.extensions.validate()
    }
}

/// Root schedule configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Default timezone for tasks without one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
    /// Lock TTL used when a locking extension gives none.
    #[serde(default = "default_ttl")]
    pub lock_ttl_secs: u64,
    /// Local lock store selection.
    #[serde(default)]
    pub local_lock_store: LocalStoreKind,
    /// Directory for lock files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_dir: Option<PathBuf>,
    /// Name of the operator-registered distributed lock store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub single_server_lock_factory: Option<String>,
    /// Schedule-wide extensions, applied before each task's own.
    #[serde(default)]
    pub extensions: ExtensionsConfig,
    /// Task entries in schedule order.
    #[serde(default)]
    pub tasks: Vec<TaskConfig>,
}

const fn default_ttl() -> u64 {
    DEFAULT_TTL_SECS
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            timezone: None,
            lock_ttl_secs: DEFAULT_TTL_SECS,
            local_lock_store: LocalStoreKind::Auto,
            lock_dir: None,
            single_server_lock_factory: None,
            extensions: ExtensionsConfig::default(),
            tasks: Vec::new(),
        }
    }
}

impl ScheduleConfig {
    /// Validate the schedule and every task entry.
    pub fn validate(&self) -> Result<(), String> {
        if self.lock_ttl_secs == 0 {
            return Err("lock_ttl_secs must be greater than 0".into());
        }
        if self
            .single_server_lock_factory
            .as_deref()
            .is_some_and(|name| name.trim().is_empty())
        {
            return Err("single_server_lock_factory must not be empty".into());
        }
        self.extensions
            .validate()
            .map_err(|e| format!("schedule extensions invalid: {e}"))?;
        for (index, task) in self.tasks.iter().enumerate() {
            task.validate()
                .map_err(|e| format!("task #{index} invalid: {e}"))?;
        }
        Ok(())
    }

    /// Parse scheduler configuration from a JSON string and validate.
    pub fn from_json_str(input: &str) -> Result<Self, String> {
        let cfg: Self = serde_json::from_str(input).map_err(|e| format!("parse error: {e}"))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read and validate a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, String> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
        Self::from_json_str(&raw)
    }

    /// Load `.env` if present, then read the file named by `SCHEDULE_CONFIG`.
    pub fn from_env() -> Result<Self, String> {
        let _ = dotenvy::dotenv();
        let path = std::env::var(CONFIG_PATH_ENV)
            .map_err(|_| format!("environment variable {CONFIG_PATH_ENV} is not set"))?;
        Self::from_path(path)
    }
}
