//! `run`: prepare this member, launch etcd and supervise it.
//!
//! Startup is strictly sequential. Any fatal step aborts the launcher with
//! the step named in the error. Once the cluster is healthy the reaper
//! runs in the background until etcd exits or shutdown is requested. An
//! etcd exit is always fatal.

use std::sync::Arc;

use anyhow::{Context, anyhow, bail};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

use launcher_cluster::{Reaper, ResolverInput, Startup};
use launcher_core::LauncherConfig;
use launcher_etcd::{ClientFactory, EtcdAdmin, TlsMaterial, shutdown_requested};
use launcher_health::{ProbePolicy, wait_until_healthy};
use launcher_maintenance::EtcdutlRestorer;
use launcher_platform::{KubeClient, PEER_TLS_MODE_ENV, PEER_TLS_MODE_STRICT, S3BlobStore};

use crate::process::{EtcdProcess, STOP_GRACE, etcd_args};

/// Per-pod flags of the `run` subcommand.
#[derive(Debug, Clone)]
pub struct RunArgs {
    pub tenant: String,
    pub pod_name: String,
    pub pod_ip: String,
    pub token: String,
    pub api_version: String,
    pub corruption_check: bool,
    pub quota_backend_bytes: Option<u64>,
}

impl RunArgs {
    fn into_input(self, peer_tls_strict: bool) -> ResolverInput {
        ResolverInput {
            tenant: self.tenant,
            pod_name: self.pod_name,
            pod_ip: self.pod_ip,
            token: self.token,
            api_version: self.api_version,
            corruption_check: self.corruption_check,
            quota_backend_bytes: self.quota_backend_bytes,
            peer_tls_strict,
        }
    }
}

/// Wait for the reaper task. A panic inside it is reported as an error.
async fn join_reaper(handle: JoinHandle<()>) -> anyhow::Result<()> {
    match handle.await {
        Ok(()) => Ok(()),
        Err(e) if e.is_cancelled() => Ok(()),
        Err(e) => {
            error!(error = %e, "dead member reaper panicked");
            Err(anyhow!(e).context("dead member reaper"))
        }
    }
}

fn peer_tls_strict_from_env() -> bool {
    std::env::var(PEER_TLS_MODE_ENV).is_ok_and(|v| v == PEER_TLS_MODE_STRICT)
}

pub async fn run(config: &LauncherConfig, args: RunArgs, mut shutdown: watch::Receiver<bool>) -> anyhow::Result<()> {
    info!(tenant = %args.tenant, pod = %args.pod_name, "etcd launcher starting");

    let input = args.into_input(peer_tls_strict_from_env());
    input.validate().context("validating command line")?;

    let tls = TlsMaterial::load(&config.tls).context("loading etcd client TLS material")?;
    let admin = Arc::new(EtcdAdmin::new(ClientFactory::new(tls, shutdown.clone())));
    let platform = Arc::new(KubeClient::in_cluster().context("building in-cluster API client")?);
    let blobs = S3BlobStore::new();
    let restorer = EtcdutlRestorer::new(&config.binaries.etcdutl);

    // ── Prepare member ─────────────────────────────────────────

    let startup = Startup {
        platform: platform.as_ref(),
        blobs: &blobs,
        restorer: &restorer,
        admin: admin.as_ref(),
        config,
    };
    let prepared = startup.prepare(&input).await.context("preparing etcd member")?;
    let ctx = Arc::new(prepared.ctx);

    // ── Launch etcd ────────────────────────────────────────────

    let mut etcd = EtcdProcess::spawn(&config.binaries.etcd, &etcd_args(&ctx, ctx.topology, &config.tls))
        .context("starting etcd")?;
    info!(pid = ?etcd.id(), "etcd started");

    // ── Health gate ────────────────────────────────────────────

    let endpoints = ctx.domain.client_endpoints(ctx.topology.member_count);
    tokio::select! {
        state = wait_until_healthy(admin.as_ref(), &endpoints, ProbePolicy::health_gate()) => {
            if !state.is_confirmed() {
                bail!("etcd cluster did not become healthy within 60s");
            }
        }
        status = etcd.wait() => {
            let status = status.context("waiting for etcd")?;
            bail!("etcd exited during startup: {status}");
        }
        _ = shutdown_requested(&mut shutdown) => {
            info!("shutdown requested during startup, stopping etcd");
            etcd.terminate(STOP_GRACE).await.context("stopping etcd")?;
            return Ok(());
        }
    }

    // ── Reaper ─────────────────────────────────────────────────

    let (topology_tx, _) = watch::channel(ctx.topology);
    let reaper = Reaper::new(admin.clone(), platform.clone(), ctx.clone(), topology_tx);
    let reaper_handle = tokio::spawn(reaper.run(shutdown.clone()));

    // ── Supervise ──────────────────────────────────────────────

    let result = tokio::select! {
        status = etcd.wait() => {
            reaper_handle.abort();
            match status {
                Ok(status) => Err(anyhow!("etcd exited: {status}")),
                Err(e) => Err(anyhow!(e).context("waiting for etcd")),
            }
        }
        _ = shutdown_requested(&mut shutdown) => {
            info!("stopping etcd");
            let status = etcd.terminate(STOP_GRACE).await.context("stopping etcd")?;
            info!(%status, "etcd stopped");
            join_reaper(reaper_handle).await
        }
    };

    if let Err(e) = &result {
        error!(error = %e, "etcd launcher stopping");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reaper_panic_is_reported() {
        let handle = tokio::spawn(async { panic!("reaper blew up") });
        let err = join_reaper(handle).await.unwrap_err();
        assert!(format!("{err:#}").contains("dead member reaper"));
    }

    #[tokio::test]
    async fn finished_or_aborted_reaper_is_fine() {
        join_reaper(tokio::spawn(async {})).await.unwrap();

        let handle = tokio::spawn(std::future::pending::<()>());
        handle.abort();
        join_reaper(handle).await.unwrap();
    }
}
