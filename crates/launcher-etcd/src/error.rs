//! Errors raised while talking to etcd.

use std::time::Duration;

use launcher_core::LauncherError;
use thiserror::Error;

pub type EtcdResult<T> = Result<T, EtcdError>;

#[derive(Debug, Error)]
pub enum EtcdError {
    /// Certificate or key material is missing or malformed.
    #[error("invalid TLS material: {0}")]
    Tls(String),

    /// No client could be built within the retry budget.
    #[error("failed to connect to {endpoints}: {reason}")]
    Connect { endpoints: String, reason: String },

    #[error("{op} timed out after {timeout:?}")]
    Timeout { op: &'static str, timeout: Duration },

    #[error("{op} cancelled by shutdown")]
    Cancelled { op: &'static str },

    /// The server answered but refused the request.
    #[error("{op}: permission denied: {message}")]
    PermissionDenied { op: &'static str, message: String },

    #[error("{op} failed: {source}")]
    Rpc {
        op: &'static str,
        #[source]
        source: etcd_client::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl EtcdError {
    /// Classify a client error returned by `op`.
    pub fn rpc(op: &'static str, source: etcd_client::Error) -> Self {
        if let etcd_client::Error::GRpcStatus(status) = &source {
            if status.code() == tonic::Code::PermissionDenied {
                return EtcdError::PermissionDenied {
                    op,
                    message: status.message().to_string(),
                };
            }
        }
        EtcdError::Rpc { op, source }
    }

    pub fn is_permission_denied(&self) -> bool {
        matches!(self, EtcdError::PermissionDenied { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, EtcdError::Cancelled { .. })
    }

    /// Whether the same call may succeed if retried later.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            EtcdError::Connect { .. } | EtcdError::Timeout { .. } | EtcdError::Rpc { .. }
        )
    }
}

impl From<EtcdError> for LauncherError {
    fn from(err: EtcdError) -> Self {
        match err {
            EtcdError::Tls(msg) => LauncherError::Config(msg),
            EtcdError::Io(e) => LauncherError::Io(e),
            e @ (EtcdError::Connect { .. } | EtcdError::Timeout { .. } | EtcdError::Cancelled { .. }) => {
                LauncherError::Transient(e.to_string())
            }
            other => LauncherError::Etcd(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_denied_status_is_recognised() {
        let status = tonic::Status::permission_denied("etcdserver: permission denied");
        let err = EtcdError::rpc("read", etcd_client::Error::GRpcStatus(status));
        assert!(err.is_permission_denied());
        assert!(!err.is_transient());
    }

    #[test]
    fn other_statuses_stay_rpc_errors() {
        let status = tonic::Status::unavailable("no leader");
        let err = EtcdError::rpc("member list", etcd_client::Error::GRpcStatus(status));
        assert!(matches!(err, EtcdError::Rpc { op: "member list", .. }));
        assert!(err.is_transient());
    }

    #[test]
    fn conversion_into_launcher_errors() {
        let tls: LauncherError = EtcdError::Tls("no key".into()).into();
        assert!(matches!(tls, LauncherError::Config(_)));

        let timeout: LauncherError = EtcdError::Timeout {
            op: "member add",
            timeout: Duration::from_secs(15),
        }
        .into();
        assert!(timeout.is_transient());
    }
}
