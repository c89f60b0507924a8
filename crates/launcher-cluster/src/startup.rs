//! Pre-launch sequence.
//!
//! Resolve the cluster context, then either seed a brand-new member from a
//! pending backup or reconcile an existing member's membership. Everything
//! here finishes before the etcd process is started.

use tracing::info;

use launcher_core::{BootstrapKind, ClusterContext, LauncherConfig, LauncherResult};
use launcher_etcd::AdminApi;
use launcher_maintenance::SnapshotRestorer;
use launcher_platform::{BlobStore, Platform};

use crate::reconciler::{ReconcileOutcome, Reconciler};
use crate::resolver::{ResolverInput, resolve};
use crate::restore::RestoreGate;

/// Collaborators of the pre-launch sequence.
pub struct Startup<'a> {
    pub platform: &'a dyn Platform,
    pub blobs: &'a dyn BlobStore,
    pub restorer: &'a dyn SnapshotRestorer,
    pub admin: &'a dyn AdminApi,
    pub config: &'a LauncherConfig,
}

/// What the pre-launch sequence did.
#[derive(Debug, Clone)]
pub struct Prepared {
    pub ctx: ClusterContext,
    /// The data directory was seeded from a backup.
    pub restored: bool,
    pub membership: ReconcileOutcome,
}

impl Startup<'_> {
    pub async fn prepare(&self, input: &ResolverInput) -> LauncherResult<Prepared> {
        let ctx = resolve(self.platform, self.config, input).await?;

        let (restored, membership) = match ctx.bootstrap {
            BootstrapKind::New => {
                let gate = RestoreGate::new(self.platform, self.blobs, self.restorer, &self.config.download_dir);
                (gate.restore_if_requested(&ctx).await?, ReconcileOutcome::Skipped)
            }
            BootstrapKind::Existing => (false, Reconciler::new(self.admin, &ctx).reconcile().await?),
        };

        info!(restored, membership = ?membership, "member prepared");
        Ok(Prepared {
            ctx,
            restored,
            membership,
        })
    }
}
