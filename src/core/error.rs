//! Error types for schedule building and pipeline execution.

use thiserror::Error;

/// Errors produced while assembling a schedule or talking to a lock backend.
#[derive(Debug, Error)]
pub enum ScheduleError {
    /// A required collaborator was not configured.
    #[error("{message}")]
    MissingDependency {
        /// Extension that needs the collaborator.
        extension: &'static str,
        /// Operator-facing remediation, naming the config path to set.
        message: String,
    },
    /// No registered handler supports an extension kind.
    #[error("no extension handler registered for \"{0}\"")]
    UnsupportedExtension(String),
    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    /// Two tasks resolved to the same identity.
    #[error("duplicate task id {id} for \"{description}\"")]
    DuplicateTask {
        /// Conflicting identity.
        id: String,
        /// Description of the second task.
        description: String,
    },
    /// Backend-specific failure with context.
    #[error("backend error: {0}")]
    Backend(String),
}

/// Signal raised by an extension hook at run time.
#[derive(Debug, Error)]
pub enum HookError {
    /// The task must not run this tick. Not a failure.
    #[error("skipped: {0}")]
    Skip(String),
    /// The hook itself failed (e.g. a notification could not be sent).
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

impl HookError {
    /// Build a skip signal.
    pub fn skip(reason: impl Into<String>) -> Self {
        Self::Skip(reason.into())
    }
}

impl From<ScheduleError> for HookError {
    fn from(err: ScheduleError) -> Self {
        Self::Failed(err.into())
    }
}

/// Application-facing result using anyhow for higher-level contexts.
pub type AppResult<T> = Result<T, anyhow::Error>;
