//! Snapshot-save with endpoint fallback.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use launcher_etcd::AdminApi;

use crate::error::{EndpointFailure, MaintenanceError, MaintenanceResult};

/// Which endpoint produced the snapshot, and how much was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotOutcome {
    pub endpoint: String,
    pub bytes: u64,
    /// Endpoints tried, including the successful one.
    pub attempts: usize,
}

/// Staging path the snapshot is streamed into before the final rename.
pub fn partial_path(file: &Path) -> PathBuf {
    let mut name = file.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Save a snapshot to `file`, trying `endpoints` one at a time.
///
/// The first endpoint that streams a non-empty snapshot wins; its output is
/// renamed onto `file`. Partial output of a failed endpoint is removed
/// before the next one is tried. `file` is never left empty or truncated.
pub async fn save_snapshot(admin: &dyn AdminApi, endpoints: &[String], file: &Path) -> MaintenanceResult<SnapshotOutcome> {
    if endpoints.is_empty() {
        return Err(MaintenanceError::NoEndpoints);
    }

    let part = partial_path(file);
    let mut failures = Vec::new();

    for (i, endpoint) in endpoints.iter().enumerate() {
        let error = match admin.snapshot(endpoint, &part).await {
            Ok(0) => "snapshot stream was empty".to_string(),
            Ok(bytes) => match tokio::fs::rename(&part, file).await {
                Ok(()) => {
                    info!(%endpoint, bytes, file = %file.display(), "snapshot saved");
                    return Ok(SnapshotOutcome {
                        endpoint: endpoint.clone(),
                        bytes,
                        attempts: i + 1,
                    });
                }
                Err(e) => format!("failed to move snapshot into place: {e}"),
            },
            Err(e) => e.to_string(),
        };

        warn!(%endpoint, %error, "snapshot attempt failed");
        discard(&part).await;
        failures.push(EndpointFailure {
            endpoint: endpoint.clone(),
            error,
        });
    }

    Err(MaintenanceError::Snapshot(failures))
}

async fn discard(part: &Path) {
    if let Err(e) = tokio::fs::remove_file(part).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %part.display(), error = %e, "failed to remove partial snapshot");
        }
    }
}
