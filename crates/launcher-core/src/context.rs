//! The resolved per-process cluster context.

use std::path::{Path, PathBuf};

use crate::addressing::ServiceDomain;
use crate::types::{AddressingMode, BootstrapKind, InitialMember, render_initial_cluster};

/// The part of the context that changes while the process runs.
///
/// The reaper is its only writer; everybody else reads a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Topology {
    /// Target member count, always ≥ 1.
    pub member_count: usize,
    pub addressing: AddressingMode,
}

impl Topology {
    pub fn new(member_count: usize, addressing: AddressingMode) -> Self {
        Self {
            member_count: member_count.max(1),
            addressing,
        }
    }

    /// Copy with a refreshed member count.
    pub fn with_member_count(self, member_count: usize) -> Self {
        Self::new(member_count, self.addressing)
    }
}

/// Everything the launcher resolved about this member at startup.
#[derive(Debug, Clone)]
pub struct ClusterContext {
    pub tenant: String,
    pub domain: ServiceDomain,
    pub pod_name: String,
    pub pod_ip: String,
    pub data_dir: PathBuf,
    pub token: String,
    pub corruption_check: bool,
    pub quota_backend_bytes: Option<u64>,
    pub bootstrap: BootstrapKind,
    pub initial_members: Vec<InitialMember>,
    /// Topology as resolved at startup.
    pub topology: Topology,
}

impl ClusterContext {
    pub fn namespace(&self) -> &str {
        self.domain.namespace()
    }

    /// Fully qualified hostname of this member.
    pub fn local_host(&self) -> String {
        self.domain.host(&self.pod_name)
    }

    /// Peer URLs this member advertises under `mode`.
    pub fn local_peer_urls(&self, mode: AddressingMode) -> Vec<String> {
        self.domain.peer_urls(&self.pod_name, mode)
    }

    /// The single TLS peer URL used when seeding from a backup.
    pub fn local_tls_peer_url(&self) -> String {
        crate::addressing::tls_peer_url(&self.local_host())
    }

    /// `--initial-cluster` value.
    pub fn initial_cluster(&self) -> String {
        render_initial_cluster(&self.initial_members)
    }

    /// Directory etcd creates once it has state (`<data-dir>/member`).
    pub fn member_dir(&self) -> PathBuf {
        self.data_dir.join("member")
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}
