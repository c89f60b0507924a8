//! Maintenance tool errors.

use std::time::Duration;

use launcher_core::LauncherError;
use launcher_etcd::EtcdError;
use thiserror::Error;

pub type MaintenanceResult<T> = Result<T, MaintenanceError>;

/// One endpoint's failure during a multi-endpoint operation.
#[derive(Debug)]
pub struct EndpointFailure {
    pub endpoint: String,
    pub error: String,
}

impl std::fmt::Display for EndpointFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.endpoint, self.error)
    }
}

#[derive(Debug, Error)]
pub enum MaintenanceError {
    #[error("no endpoints given")]
    NoEndpoints,

    /// Every endpoint failed to produce a snapshot.
    #[error("snapshot failed on all endpoints: {}", join(.0))]
    Snapshot(Vec<EndpointFailure>),

    #[error("defragmenting {endpoint} failed: {source}")]
    Defragment {
        endpoint: String,
        #[source]
        source: EtcdError,
    },

    #[error("no quorum write succeeded within {0:?}")]
    QuorumTimeout(Duration),

    #[error("{binary} not found")]
    MissingBinary { binary: String },

    /// The offline restore tool exited unsuccessfully.
    #[error("snapshot restore failed (exit code {code}): {stderr}")]
    Restore { code: i32, stderr: String },

    #[error(transparent)]
    Etcd(#[from] EtcdError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<MaintenanceError> for LauncherError {
    fn from(err: MaintenanceError) -> Self {
        match err {
            MaintenanceError::MissingBinary { .. } => LauncherError::Config(err.to_string()),
            MaintenanceError::Etcd(e) => e.into(),
            MaintenanceError::Io(e) => LauncherError::Io(e),
            other => LauncherError::Etcd(other.to_string()),
        }
    }
}

fn join(failures: &[EndpointFailure]) -> String {
    failures.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_error_lists_every_endpoint() {
        let err = MaintenanceError::Snapshot(vec![
            EndpointFailure {
                endpoint: "https://a:2379".into(),
                error: "connection refused".into(),
            },
            EndpointFailure {
                endpoint: "https://b:2379".into(),
                error: "timed out".into(),
            },
        ]);
        let msg = err.to_string();
        assert!(msg.contains("https://a:2379: connection refused"));
        assert!(msg.contains("https://b:2379: timed out"));
    }
}
