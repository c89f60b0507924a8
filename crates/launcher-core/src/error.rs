//! Error taxonomy for the launcher.

use thiserror::Error;

/// Result type alias for launcher operations.
pub type LauncherResult<T> = Result<T, LauncherError>;

/// Errors surfaced by the startup sequence and the reaper.
#[derive(Debug, Error)]
pub enum LauncherError {
    /// Missing or invalid required input. Always fatal.
    #[error("configuration error: {0}")]
    Config(String),

    /// Timeouts, refused connections and other retryable failures.
    #[error("transient error: {0}")]
    Transient(String),

    /// A lookup against the orchestration platform failed.
    #[error("platform error: {0}")]
    Platform(String),

    /// An administrative call against etcd failed.
    #[error("etcd error: {0}")]
    Etcd(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl LauncherError {
    /// Whether retrying the failed operation later can succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, LauncherError::Transient(_))
    }
}

/// How a startup step failed: keep going with a warning, or stop.
#[derive(Debug, Error)]
pub enum StepFailure {
    #[error("{0}")]
    Warn(LauncherError),
    #[error("{0}")]
    Abort(LauncherError),
}

impl StepFailure {
    pub fn warn(err: impl Into<LauncherError>) -> Self {
        StepFailure::Warn(err.into())
    }

    pub fn abort(err: impl Into<LauncherError>) -> Self {
        StepFailure::Abort(err.into())
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, StepFailure::Abort(_))
    }

    pub fn into_inner(self) -> LauncherError {
        match self {
            StepFailure::Warn(e) | StepFailure::Abort(e) => e,
        }
    }
}

/// Result of a startup step whose failure has been classified.
pub type StepResult<T> = Result<T, StepFailure>;
