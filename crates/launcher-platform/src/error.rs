//! Platform lookup errors.

use launcher_core::LauncherError;
use thiserror::Error;

pub type PlatformResult<T> = Result<T, PlatformError>;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("{kind} {name:?} not found")]
    NotFound { kind: &'static str, name: String },

    /// The API server answered with a non-success status.
    #[error("{kind} {name:?}: API server returned {status}: {message}")]
    Api {
        kind: &'static str,
        name: String,
        status: u16,
        message: String,
    },

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A response or secret value could not be interpreted.
    #[error("decode error: {0}")]
    Decode(String),

    /// In-cluster credentials or required values are missing.
    #[error("configuration error: {0}")]
    Config(String),

    #[error("blob store error: {0}")]
    BlobStore(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PlatformError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, PlatformError::NotFound { .. })
    }
}

impl From<PlatformError> for LauncherError {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::Config(msg) => LauncherError::Config(msg),
            PlatformError::Io(e) => LauncherError::Io(e),
            other => LauncherError::Platform(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_errors_stay_config_errors() {
        let err: LauncherError = PlatformError::Config("bucket name not set".into()).into();
        assert!(matches!(err, LauncherError::Config(_)));

        let err: LauncherError = PlatformError::NotFound {
            kind: "pod",
            name: "etcd-1".into(),
        }
        .into();
        assert!(matches!(err, LauncherError::Platform(_)));
    }
}
