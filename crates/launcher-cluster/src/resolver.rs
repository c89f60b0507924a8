//! Cluster configuration resolver.
//!
//! Turns command-line identity plus a few platform lookups into the
//! immutable [`ClusterContext`] every later step works from.

use tracing::{debug, info, warn};

use launcher_core::addressing::{peer_urls_for_host, plaintext_peer_url, pod_name, tls_peer_url};
use launcher_core::{
    AddressingMode, ApiVersion, BootstrapKind, ClusterContext, DEFAULT_CLUSTER_SIZE, InitialMember, LauncherConfig,
    LauncherError, LauncherResult, ServiceDomain, Topology,
};
use launcher_platform::{Platform, PodInfo};

/// Per-pod values handed to the launcher on the command line.
#[derive(Debug, Clone, Default)]
pub struct ResolverInput {
    pub tenant: String,
    pub pod_name: String,
    pub pod_ip: String,
    pub token: String,
    /// etcdctl API version, `2` or `3`.
    pub api_version: String,
    pub corruption_check: bool,
    pub quota_backend_bytes: Option<u64>,
    /// `PEER_TLS_MODE=strict` is set for this process.
    pub peer_tls_strict: bool,
}

impl ResolverInput {
    /// Reject empty identity values and unsupported API versions.
    pub fn validate(&self) -> LauncherResult<ApiVersion> {
        let required = [
            ("cluster", &self.tenant),
            ("pod-name", &self.pod_name),
            ("pod-ip", &self.pod_ip),
            ("token", &self.token),
        ];
        for (flag, value) in required {
            if value.trim().is_empty() {
                return Err(LauncherError::Config(format!("--{flag} is required")));
            }
        }
        self.api_version.parse()
    }
}

/// Peer addressing for a bootstrap kind.
///
/// New clusters start TLS-only. Existing clusters keep plaintext peers
/// unless strict mode was requested.
pub fn addressing_mode(bootstrap: BootstrapKind, peer_tls_strict: bool) -> AddressingMode {
    match bootstrap {
        BootstrapKind::New => AddressingMode::TlsOnly,
        BootstrapKind::Existing if peer_tls_strict => AddressingMode::TlsOnly,
        BootstrapKind::Existing => AddressingMode::PlaintextAndTls,
    }
}

/// Initial-cluster entry for one expected replica.
///
/// With a pod to inspect, a plaintext URL is listed unless the pod runs in
/// strict mode and a TLS URL is listed when the pod carries the TLS-peer
/// annotation. Without a pod, or when that yields nothing, a single URL
/// matching `mode` is guessed.
pub fn initial_member(name: &str, host: &str, pod: Option<PodInfo>, mode: AddressingMode) -> InitialMember {
    let mut peer_urls = Vec::new();
    if let Some(info) = pod {
        if !info.strict_tls {
            peer_urls.push(plaintext_peer_url(host));
        }
        if info.tls_peer_annotation {
            peer_urls.push(tls_peer_url(host));
        }
    }

    let guessed = peer_urls.is_empty();
    if guessed {
        peer_urls = match mode {
            AddressingMode::TlsOnly => vec![tls_peer_url(host)],
            AddressingMode::PlaintextAndTls => vec![plaintext_peer_url(host)],
        };
    }

    InitialMember {
        name: name.to_string(),
        peer_urls,
        guessed,
    }
}

/// Target member count from the replica object, defaulting to 3.
pub async fn fetch_member_count(platform: &dyn Platform, namespace: &str) -> LauncherResult<usize> {
    let replicas = platform.replica_count(namespace).await?;
    Ok(replicas.map_or(DEFAULT_CLUSTER_SIZE, |n| n as usize))
}

/// Compute the initial member list by inspecting each expected pod.
pub async fn initial_members(
    platform: &dyn Platform,
    domain: &ServiceDomain,
    count: usize,
    mode: AddressingMode,
) -> Vec<InitialMember> {
    let mut members = Vec::with_capacity(count);
    for index in 0..count {
        let name = pod_name(index);
        let pod = match platform.pod(domain.namespace(), &name).await {
            Ok(info) => Some(info),
            Err(e) if e.is_not_found() => {
                debug!(pod = %name, "pod does not exist yet, guessing peer URLs");
                None
            }
            Err(e) => {
                warn!(pod = %name, error = %e, "failed to look up pod, guessing peer URLs");
                None
            }
        };
        members.push(initial_member(&name, &domain.host(&name), pod, mode));
    }
    members
}

/// Build the [`ClusterContext`] for this process.
pub async fn resolve(platform: &dyn Platform, config: &LauncherConfig, input: &ResolverInput) -> LauncherResult<ClusterContext> {
    input.validate()?;

    let control = platform.control_object(&input.tenant).await?;
    if control.namespace.is_empty() {
        return Err(LauncherError::Config(format!(
            "cluster {} has no namespace assigned yet",
            input.tenant
        )));
    }
    let domain = ServiceDomain::new(control.namespace);

    let member_count = fetch_member_count(platform, domain.namespace()).await?;
    let bootstrap = if control.etcd_initialized {
        BootstrapKind::Existing
    } else {
        BootstrapKind::New
    };
    let addressing = addressing_mode(bootstrap, input.peer_tls_strict);
    let topology = Topology::new(member_count, addressing);

    let initial_members = initial_members(platform, &domain, topology.member_count, addressing).await;

    let ctx = ClusterContext {
        tenant: input.tenant.clone(),
        domain,
        pod_name: input.pod_name.clone(),
        pod_ip: input.pod_ip.clone(),
        data_dir: config.data_dir(&input.pod_name),
        token: input.token.clone(),
        corruption_check: input.corruption_check,
        quota_backend_bytes: input.quota_backend_bytes,
        bootstrap,
        initial_members,
        topology,
    };

    info!(
        tenant = %ctx.tenant,
        namespace = %ctx.namespace(),
        pod = %ctx.pod_name,
        members = ctx.topology.member_count,
        bootstrap = %ctx.bootstrap,
        addressing = %ctx.topology.addressing,
        initial_cluster = %ctx.initial_cluster(),
        "resolved cluster configuration"
    );

    Ok(ctx)
}

/// Peer URLs this pod should advertise under `mode`.
pub fn desired_peer_urls(ctx: &ClusterContext, mode: AddressingMode) -> Vec<String> {
    peer_urls_for_host(&ctx.local_host(), mode)
}
