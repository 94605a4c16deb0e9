//! Scanner Error Types

use crate::store::StoreError;

/// Scanner error types
///
/// Each variant carries its own propagation rule: configuration and
/// repository-state errors end the scan, task errors are charged against the
/// poison budget, and exceeding the budget ends the scan.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScanError {
    /// Missing or rejected credential, unusable source definition
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// No resolvable branch, or no history where history must exist
    #[error("Repository error: {message}")]
    RepositoryState { message: String },

    /// A single task failed; the task is dropped
    #[error("Task {task} failed: {message}")]
    Task { task: String, message: String },

    /// More task failures than the poison threshold allows
    #[error("Too many task failures ({failures}, threshold {threshold})")]
    PoisonBudgetExceeded { failures: usize, threshold: usize },

    /// Shutdown was requested before the scan finished
    #[error("Scan interrupted")]
    Interrupted,

    /// Document store failure
    #[error("Store error: {message}")]
    Store { message: String },

    /// External process or filesystem failure
    #[error("IO error: {message}")]
    Io { message: String },

    /// Anything else
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Coarse classification used when reporting outcomes
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum ErrorKind {
    Configuration,
    RepositoryState,
    PerTask,
    PoisonBudget,
    Interrupted,
    Internal,
}

impl ScanError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ScanError::Configuration { .. } => ErrorKind::Configuration,
            ScanError::RepositoryState { .. } => ErrorKind::RepositoryState,
            ScanError::Task { .. } => ErrorKind::PerTask,
            ScanError::PoisonBudgetExceeded { .. } => ErrorKind::PoisonBudget,
            ScanError::Interrupted => ErrorKind::Interrupted,
            ScanError::Store { .. } | ScanError::Io { .. } | ScanError::Internal { .. } => {
                ErrorKind::Internal
            }
        }
    }

    /// Whether this error ends the enclosing scan
    pub fn is_fatal_to_scan(&self) -> bool {
        !matches!(self, ScanError::Task { .. })
    }

    pub fn task(task: impl ToString, message: impl ToString) -> Self {
        ScanError::Task {
            task: task.to_string(),
            message: message.to_string(),
        }
    }
}

impl From<StoreError> for ScanError {
    fn from(err: StoreError) -> Self {
        ScanError::Store {
            message: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for ScanError {
    fn from(err: serde_json::Error) -> Self {
        ScanError::Internal {
            message: format!("Document serialisation failed: {}", err),
        }
    }
}

impl crate::core::error_handling::ContextualError for ScanError {
    fn is_user_actionable(&self) -> bool {
        matches!(self, ScanError::Configuration { .. })
    }

    fn user_message(&self) -> Option<&str> {
        match self {
            ScanError::Configuration { message } => Some(message),
            _ => None,
        }
    }
}

pub type ScanResult<T> = Result<T, ScanError>;
