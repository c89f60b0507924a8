//! Backup restore gate.
//!
//! A brand-new member checks for a pending restore request before etcd
//! starts. When exactly one request for its tenant is rebuilding, the data
//! directory is seeded from that backup instead of starting empty.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use launcher_core::{BootstrapKind, ClusterContext, LauncherError, LauncherResult, RestorePhase, RestoreRequest};
use launcher_maintenance::{RestorePlan, SnapshotRestorer};
use launcher_platform::{BlobSource, BlobStore, Platform};

/// Restore requests of `tenant` that are in the rebuilding phase.
pub fn active_requests<'r>(requests: &'r [RestoreRequest], tenant: &str) -> Vec<&'r RestoreRequest> {
    requests
        .iter()
        .filter(|r| r.tenant == tenant && r.phase == RestorePhase::Rebuilding)
        .collect()
}

/// Object name of a backup in the blob store.
pub fn backup_object_name(tenant: &str, backup_name: &str) -> String {
    format!("{tenant}-{backup_name}")
}

pub struct RestoreGate<'a> {
    platform: &'a dyn Platform,
    blobs: &'a dyn BlobStore,
    restorer: &'a dyn SnapshotRestorer,
    download_dir: PathBuf,
}

impl<'a> RestoreGate<'a> {
    pub fn new(
        platform: &'a dyn Platform,
        blobs: &'a dyn BlobStore,
        restorer: &'a dyn SnapshotRestorer,
        download_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            platform,
            blobs,
            restorer,
            download_dir: download_dir.into(),
        }
    }

    /// Seed the data directory if a restore is pending.
    ///
    /// Returns whether a restore was performed. Does nothing for existing
    /// clusters. More than one rebuilding request is refused before any
    /// download or deletion happens.
    pub async fn restore_if_requested(&self, ctx: &ClusterContext) -> LauncherResult<bool> {
        if ctx.bootstrap != BootstrapKind::New {
            return Ok(false);
        }

        let requests = self.platform.restore_requests(ctx.namespace()).await?;
        let request = match active_requests(&requests, &ctx.tenant).as_slice() {
            [] => {
                debug!(tenant = %ctx.tenant, "no pending restore");
                return Ok(false);
            }
            [one] => (*one).clone(),
            many => {
                let names: Vec<&str> = many.iter().map(|r| r.name.as_str()).collect();
                return Err(LauncherError::Config(format!(
                    "found {} restores in phase {}, refusing to restore anything: {}",
                    many.len(),
                    launcher_core::RESTORE_PHASE_REBUILDING,
                    names.join(", ")
                )));
            }
        };

        info!(restore = %request.name, backup = %request.backup_name, "restoring data directory from backup");

        let secret_name = request.credentials_secret.as_deref().ok_or_else(|| {
            LauncherError::Config(format!("restore {} has no download credentials secret", request.name))
        })?;
        let secret = self.platform.secret(ctx.namespace(), secret_name).await?;

        let object = backup_object_name(&ctx.tenant, &request.backup_name);
        let source = BlobSource::from_secret(&secret, object.clone())?;
        let archive = self.download_dir.join(&object);
        self.blobs.fetch_object(&source, &archive).await?;

        remove_dir_if_present(ctx.data_dir()).await?;

        let plan = RestorePlan {
            snapshot: archive.clone(),
            data_dir: ctx.data_dir.clone(),
            wal_dir: ctx.member_dir().join("wal"),
            name: ctx.pod_name.clone(),
            peer_urls: vec![ctx.local_tls_peer_url()],
            initial_cluster: ctx.initial_cluster(),
            token: ctx.token.clone(),
        };
        self.restorer.restore(&plan).await?;

        if let Err(e) = tokio::fs::remove_file(&archive).await {
            warn!(archive = %archive.display(), error = %e, "failed to remove downloaded backup");
        }

        info!(restore = %request.name, data_dir = %ctx.data_dir.display(), "restore finished");
        Ok(true)
    }
}

/// Delete `dir` and everything below it. A missing directory is fine.
pub async fn remove_dir_if_present(dir: &Path) -> LauncherResult<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {
            info!(dir = %dir.display(), "removed data directory");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
