//! Operator one-shots: `is-running`, `snapshot`, `defrag`.
//!
//! Each works against the client endpoints of every expected member of the
//! tenant cluster.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, bail};
use tokio::sync::watch;
use tracing::info;

use launcher_cluster::fetch_member_count;
use launcher_core::{LauncherConfig, ServiceDomain};
use launcher_etcd::{ClientFactory, EtcdAdmin, TlsMaterial};
use launcher_maintenance::{DEFRAG_PAUSE, defragment_all, save_snapshot, wait_for_quorum};
use launcher_platform::{KubeClient, Platform};

pub struct Tools {
    admin: EtcdAdmin,
    endpoints: Vec<String>,
}

/// Client endpoints of every expected member of `tenant`.
pub async fn cluster_endpoints(platform: &dyn Platform, tenant: &str) -> anyhow::Result<Vec<String>> {
    if tenant.trim().is_empty() {
        bail!("--cluster is required");
    }
    let control = platform
        .control_object(tenant)
        .await
        .with_context(|| format!("looking up cluster {tenant}"))?;
    if control.namespace.is_empty() {
        bail!("cluster {tenant} has no namespace assigned yet");
    }
    let domain = ServiceDomain::new(control.namespace);
    let count = fetch_member_count(platform, domain.namespace())
        .await
        .context("looking up cluster size")?;
    Ok(domain.client_endpoints(count.max(1)))
}

impl Tools {
    pub async fn connect(config: &LauncherConfig, tenant: &str, shutdown: watch::Receiver<bool>) -> anyhow::Result<Self> {
        let tls = TlsMaterial::load(&config.tls).context("loading etcd client TLS material")?;
        let platform = KubeClient::in_cluster().context("building in-cluster API client")?;
        let endpoints = cluster_endpoints(&platform, tenant).await?;
        Ok(Self {
            admin: EtcdAdmin::new(ClientFactory::new(tls, shutdown)),
            endpoints,
        })
    }

    pub async fn is_running(&self, timeout: Duration) -> anyhow::Result<()> {
        wait_for_quorum(&self.admin, &self.endpoints, timeout)
            .await
            .context("waiting for quorum")?;
        info!("etcd cluster accepts writes");
        Ok(())
    }

    pub async fn snapshot(&self, file: &Path) -> anyhow::Result<()> {
        let outcome = save_snapshot(&self.admin, &self.endpoints, file)
            .await
            .context("saving snapshot")?;
        info!(
            endpoint = %outcome.endpoint,
            bytes = outcome.bytes,
            file = %file.display(),
            "snapshot saved"
        );
        Ok(())
    }

    pub async fn defrag(&self) -> anyhow::Result<()> {
        defragment_all(&self.admin, &self.endpoints, DEFRAG_PAUSE)
            .await
            .context("defragmenting cluster")?;
        info!(members = self.endpoints.len(), "defragmentation finished");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use launcher_core::RestoreRequest;
    use launcher_platform::{ControlObject, PlatformError, PlatformFuture, PodInfo};

    struct Control {
        namespace: &'static str,
        replicas: Option<u32>,
    }

    impl Platform for Control {
        fn control_object(&self, _: &str) -> PlatformFuture<'_, ControlObject> {
            let obj = ControlObject {
                namespace: self.namespace.to_string(),
                etcd_initialized: true,
            };
            Box::pin(async move { Ok(obj) })
        }

        fn replica_count(&self, _: &str) -> PlatformFuture<'_, Option<u32>> {
            let replicas = self.replicas;
            Box::pin(async move { Ok(replicas) })
        }

        fn pod(&self, _: &str, name: &str) -> PlatformFuture<'_, PodInfo> {
            let name = name.to_string();
            Box::pin(async move { Err(PlatformError::NotFound { kind: "pod", name }) })
        }

        fn restore_requests(&self, _: &str) -> PlatformFuture<'_, Vec<RestoreRequest>> {
            Box::pin(async { Ok(vec![]) })
        }

        fn secret(&self, _: &str, name: &str) -> PlatformFuture<'_, HashMap<String, String>> {
            let name = name.to_string();
            Box::pin(async move { Err(PlatformError::NotFound { kind: "secret", name }) })
        }
    }

    #[tokio::test]
    async fn endpoints_follow_replica_count() {
        let platform = Control {
            namespace: "cluster-abc",
            replicas: Some(5),
        };
        let endpoints = cluster_endpoints(&platform, "abc").await.unwrap();
        assert_eq!(endpoints.len(), 5);
        assert_eq!(endpoints[4], "https://etcd-4.etcd.cluster-abc.svc.cluster.local:2379");

        let unset = Control {
            namespace: "cluster-abc",
            replicas: None,
        };
        assert_eq!(cluster_endpoints(&unset, "abc").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn tenant_without_namespace_is_rejected() {
        let platform = Control {
            namespace: "",
            replicas: Some(3),
        };
        assert!(cluster_endpoints(&platform, "abc").await.is_err());
        assert!(cluster_endpoints(&platform, " ").await.is_err());
    }
}
