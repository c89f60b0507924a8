//! Peer and client addressing rules.
//!
//! Every member is reachable through the headless service as
//! `<pod>.<service>.<namespace>.svc.cluster.local`. Plaintext peers listen
//! on 2380, TLS peers on 2381, clients on 2379.

use crate::types::AddressingMode;

pub const CLIENT_PORT: u16 = 2379;
pub const PLAINTEXT_PEER_PORT: u16 = 2380;
pub const TLS_PEER_PORT: u16 = 2381;
pub const METRICS_PORT: u16 = 2378;

/// Loopback client endpoint of the local member.
pub const LOCAL_ENDPOINT: &str = "https://127.0.0.1:2379";

/// Default headless service and StatefulSet name.
pub const DEFAULT_SERVICE_NAME: &str = "etcd";

/// Name of the pod at `index` in the StatefulSet.
pub fn pod_name(index: usize) -> String {
    format!("{DEFAULT_SERVICE_NAME}-{index}")
}

pub fn plaintext_peer_url(host: &str) -> String {
    format!("http://{host}:{PLAINTEXT_PEER_PORT}")
}

pub fn tls_peer_url(host: &str) -> String {
    format!("https://{host}:{TLS_PEER_PORT}")
}

/// Peer URLs a member on `host` should advertise under `mode`.
pub fn peer_urls_for_host(host: &str, mode: AddressingMode) -> Vec<String> {
    match mode {
        AddressingMode::PlaintextAndTls => vec![plaintext_peer_url(host), tls_peer_url(host)],
        AddressingMode::TlsOnly => vec![tls_peer_url(host)],
    }
}

/// DNS domain under which the members of one tenant are addressable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDomain {
    namespace: String,
    service: String,
}

impl ServiceDomain {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            service: DEFAULT_SERVICE_NAME.to_string(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Fully qualified hostname of `pod`.
    pub fn host(&self, pod: &str) -> String {
        format!("{pod}.{}.{}.svc.cluster.local", self.service, self.namespace)
    }

    pub fn peer_urls(&self, pod: &str, mode: AddressingMode) -> Vec<String> {
        peer_urls_for_host(&self.host(pod), mode)
    }

    pub fn client_url(&self, pod: &str) -> String {
        format!("https://{}:{CLIENT_PORT}", self.host(pod))
    }

    /// Hostnames of all `n` expected members.
    pub fn expected_hosts(&self, n: usize) -> Vec<String> {
        (0..n).map(|i| self.host(&pod_name(i))).collect()
    }

    /// Client endpoints of all `n` expected members, in index order.
    pub fn client_endpoints(&self, n: usize) -> Vec<String> {
        (0..n).map(|i| self.client_url(&pod_name(i))).collect()
    }
}
