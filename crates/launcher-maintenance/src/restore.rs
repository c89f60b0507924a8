//! Offline restore of a data directory from a snapshot file.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use tokio::process::Command;
use tracing::{debug, info};

use crate::error::{MaintenanceError, MaintenanceResult};

/// Everything `etcdutl snapshot restore` needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestorePlan {
    pub snapshot: PathBuf,
    pub data_dir: PathBuf,
    pub wal_dir: PathBuf,
    pub name: String,
    pub peer_urls: Vec<String>,
    pub initial_cluster: String,
    pub token: String,
}

impl RestorePlan {
    /// Arguments for `etcdutl`, hash verification always on.
    pub fn args(&self) -> Vec<String> {
        vec![
            "snapshot".into(),
            "restore".into(),
            self.snapshot.display().to_string(),
            format!("--name={}", self.name),
            format!("--data-dir={}", self.data_dir.display()),
            format!("--wal-dir={}", self.wal_dir.display()),
            format!("--initial-cluster={}", self.initial_cluster),
            format!("--initial-cluster-token={}", self.token),
            format!("--initial-advertise-peer-urls={}", self.peer_urls.join(",")),
            "--skip-hash-check=false".into(),
        ]
    }
}

pub type RestoreFuture<'a> = Pin<Box<dyn Future<Output = MaintenanceResult<()>> + Send + 'a>>;

/// Seeds a data directory from a snapshot.
pub trait SnapshotRestorer: Send + Sync {
    fn restore(&self, plan: &RestorePlan) -> RestoreFuture<'_>;
}

/// [`SnapshotRestorer`] that shells out to `etcdutl`.
#[derive(Debug, Clone)]
pub struct EtcdutlRestorer {
    binary: PathBuf,
}

impl EtcdutlRestorer {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self { binary: binary.into() }
    }
}

impl SnapshotRestorer for EtcdutlRestorer {
    fn restore(&self, plan: &RestorePlan) -> RestoreFuture<'_> {
        let plan = plan.clone();
        Box::pin(async move {
            if !self.binary.is_file() {
                return Err(MaintenanceError::MissingBinary {
                    binary: self.binary.display().to_string(),
                });
            }

            let mut cmd = Command::new(&self.binary);
            cmd.args(plan.args());
            debug!(?cmd, "running snapshot restore");

            let output = cmd.output().await?;
            if !output.status.success() {
                return Err(MaintenanceError::Restore {
                    code: output.status.code().unwrap_or(-1),
                    stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
                });
            }

            info!(data_dir = %plan.data_dir.display(), name = %plan.name, "data directory restored from snapshot");
            Ok(())
        })
    }
}
