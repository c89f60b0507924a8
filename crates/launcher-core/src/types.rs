//! Domain types shared by the launcher crates.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LauncherError;

/// Default member count when the replica object does not set one.
pub const DEFAULT_CLUSTER_SIZE: usize = 3;

/// Restore phase in which a new member must seed itself from a backup.
pub const RESTORE_PHASE_REBUILDING: &str = "StsRebuilding";

// ── Addressing ─────────────────────────────────────────────────────

/// Whether members advertise plaintext and TLS peer URLs, or TLS only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AddressingMode {
    PlaintextAndTls,
    TlsOnly,
}

impl AddressingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AddressingMode::PlaintextAndTls => "plaintext-and-tls",
            AddressingMode::TlsOnly => "tls-only",
        }
    }

    pub fn is_tls_only(&self) -> bool {
        matches!(self, AddressingMode::TlsOnly)
    }
}

impl fmt::Display for AddressingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Value etcd receives as `--initial-cluster-state`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BootstrapKind {
    New,
    Existing,
}

impl BootstrapKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BootstrapKind::New => "new",
            BootstrapKind::Existing => "existing",
        }
    }
}

impl fmt::Display for BootstrapKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// etcdctl API version accepted on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiVersion {
    V2,
    V3,
}

impl FromStr for ApiVersion {
    type Err = LauncherError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "2" => Ok(ApiVersion::V2),
            "3" => Ok(ApiVersion::V3),
            other => Err(LauncherError::Config(format!(
                "--api-version is either 2 or 3, got {other:?}"
            ))),
        }
    }
}

// ── Initial cluster ────────────────────────────────────────────────

/// One expected replica in the initial cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitialMember {
    /// Logical member name (`etcd-<index>`).
    pub name: String,
    /// One or two peer URLs, plaintext first.
    pub peer_urls: Vec<String>,
    /// True when the URLs were derived without a pod to inspect.
    pub guessed: bool,
}

/// Render an initial member list the way etcd expects it:
/// `etcd-0=http://...,etcd-0=https://...,etcd-1=https://...`.
pub fn render_initial_cluster(members: &[InitialMember]) -> String {
    members
        .iter()
        .flat_map(|m| m.peer_urls.iter().map(move |url| format!("{}={url}", m.name)))
        .collect::<Vec<_>>()
        .join(",")
}

// ── Membership ─────────────────────────────────────────────────────

/// Mirror of one etcd membership entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberRecord {
    pub id: u64,
    /// Empty until the member has started at least once.
    pub name: String,
    pub peer_urls: Vec<String>,
    pub client_urls: Vec<String>,
}

impl MemberRecord {
    /// Hostname of the first advertised peer URL, if it parses.
    pub fn peer_host(&self) -> Option<&str> {
        self.peer_urls.first().and_then(|u| url_host(u))
    }

    /// Hostnames of every advertised peer URL. Unparseable URLs yield `None`.
    pub fn peer_hosts(&self) -> impl Iterator<Item = Option<&str>> {
        self.peer_urls.iter().map(|u| url_host(u))
    }

    /// Most recently added client URL (the FQDN endpoint etcd lists last).
    pub fn latest_client_url(&self) -> Option<&str> {
        self.client_urls.last().map(String::as_str)
    }
}

/// Extract the host part of `scheme://host:port[/path]`.
///
/// Bracketed IPv6 hosts are returned without brackets.
pub fn url_host(url: &str) -> Option<&str> {
    let (_, rest) = url.split_once("://")?;
    let authority = rest.split(['/', '?', '#']).next()?;
    let authority = authority.rsplit_once('@').map_or(authority, |(_, a)| a);

    if let Some(v6) = authority.strip_prefix('[') {
        return v6.split_once(']').map(|(host, _)| host).filter(|h| !h.is_empty());
    }

    let host = authority.split_once(':').map_or(authority, |(h, _)| h);
    (!host.is_empty()).then_some(host)
}

// ── Restore requests ───────────────────────────────────────────────

/// Lifecycle phase of a restore request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestorePhase {
    Started,
    Rebuilding,
    Completed,
    Other(String),
}

impl RestorePhase {
    pub fn parse(phase: &str) -> Self {
        match phase {
            "Started" => RestorePhase::Started,
            RESTORE_PHASE_REBUILDING => RestorePhase::Rebuilding,
            "Completed" => RestorePhase::Completed,
            other => RestorePhase::Other(other.to_string()),
        }
    }
}

/// A pending backup-seed request for a tenant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreRequest {
    /// Object name of the request.
    pub name: String,
    /// Backup identifier inside the blob store.
    pub backup_name: String,
    pub phase: RestorePhase,
    /// Tenant cluster the request belongs to.
    pub tenant: String,
    /// Secret holding blob store credentials, in the tenant namespace.
    pub credentials_secret: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(name: &str, urls: &[&str]) -> InitialMember {
        InitialMember {
            name: name.to_string(),
            peer_urls: urls.iter().map(|u| u.to_string()).collect(),
            guessed: false,
        }
    }

    #[test]
    fn initial_cluster_renders_one_pair_per_url() {
        let members = vec![
            member("etcd-0", &["http://a:2380", "https://a:2381"]),
            member("etcd-1", &["https://b:2381"]),
        ];
        assert_eq!(
            render_initial_cluster(&members),
            "etcd-0=http://a:2380,etcd-0=https://a:2381,etcd-1=https://b:2381"
        );
    }

    #[test]
    fn url_host_variants() {
        assert_eq!(url_host("https://etcd-0.etcd.ns.svc.cluster.local:2381"), Some("etcd-0.etcd.ns.svc.cluster.local"));
        assert_eq!(url_host("http://10.0.0.1"), Some("10.0.0.1"));
        assert_eq!(url_host("https://[fd00::1]:2379/x"), Some("fd00::1"));
        assert_eq!(url_host("not a url"), None);
        assert_eq!(url_host("https://:2379"), None);
    }

    #[test]
    fn api_version_accepts_only_2_and_3() {
        assert_eq!("3".parse::<ApiVersion>().unwrap(), ApiVersion::V3);
        assert_eq!("2".parse::<ApiVersion>().unwrap(), ApiVersion::V2);
        assert!(matches!("4".parse::<ApiVersion>(), Err(LauncherError::Config(_))));
    }

    #[test]
    fn restore_phase_parsing() {
        assert_eq!(RestorePhase::parse("StsRebuilding"), RestorePhase::Rebuilding);
        assert_eq!(RestorePhase::parse("Completed"), RestorePhase::Completed);
        assert_eq!(RestorePhase::parse("Weird"), RestorePhase::Other("Weird".into()));
    }

    #[test]
    fn latest_client_url_is_last() {
        let m = MemberRecord {
            id: 1,
            name: "etcd-0".into(),
            peer_urls: vec![],
            client_urls: vec!["https://10.0.0.1:2379".into(), "https://etcd-0.etcd.ns.svc.cluster.local:2379".into()],
        };
        assert_eq!(m.latest_client_url(), Some("https://etcd-0.etcd.ns.svc.cluster.local:2379"));
    }
}
