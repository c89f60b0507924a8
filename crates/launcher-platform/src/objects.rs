//! Wire shapes of the Kubernetes objects the launcher reads.
//!
//! Only the fields the launcher looks at are modelled; everything else in
//! the API server's response is ignored.

use std::collections::HashMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;

use launcher_core::{RestorePhase, RestoreRequest};

use crate::error::{PlatformError, PlatformResult};

/// Condition on the tenant object that marks etcd as bootstrapped.
pub const CONDITION_ETCD_INITIALIZED: &str = "EtcdClusterInitialized";

/// Pod annotation present once a member listens on the TLS peer port.
pub const TLS_PEER_ANNOTATION: &str = "etcd.kubermatic.k8c.io/tls-peer-enabled";

/// Environment variable that forces TLS-only peer traffic.
pub const PEER_TLS_MODE_ENV: &str = "PEER_TLS_MODE";
pub const PEER_TLS_MODE_STRICT: &str = "strict";

/// Name of the etcd container inside member pods.
pub const ETCD_CONTAINER: &str = "etcd";

#[derive(Debug, Default, Deserialize)]
pub struct ObjectMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub annotations: HashMap<String, String>,
}

// ── Tenant control object ──────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ClusterObject {
    #[serde(default)]
    pub status: ClusterStatus,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterStatus {
    #[serde(default)]
    pub namespace_name: String,
    #[serde(default)]
    pub conditions: HashMap<String, ClusterCondition>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ClusterCondition {
    #[serde(default)]
    pub status: String,
}

/// What the launcher needs from the tenant control object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlObject {
    pub namespace: String,
    pub etcd_initialized: bool,
}

impl From<ClusterObject> for ControlObject {
    fn from(obj: ClusterObject) -> Self {
        let etcd_initialized = obj
            .status
            .conditions
            .get(CONDITION_ETCD_INITIALIZED)
            .is_some_and(|c| c.status == "True");
        ControlObject {
            namespace: obj.status.namespace_name,
            etcd_initialized,
        }
    }
}

// ── StatefulSet ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct StatefulSetObject {
    #[serde(default)]
    pub spec: StatefulSetSpec,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatefulSetSpec {
    pub replicas: Option<u32>,
}

// ── Pod ────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PodObject {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: PodSpec,
}

#[derive(Debug, Default, Deserialize)]
pub struct PodSpec {
    #[serde(default)]
    pub containers: Vec<Container>,
}

#[derive(Debug, Deserialize)]
pub struct Container {
    pub name: String,
    #[serde(default)]
    pub env: Vec<EnvVar>,
}

#[derive(Debug, Deserialize)]
pub struct EnvVar {
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
}

/// Peer-addressing hints read from a member pod.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PodInfo {
    /// The pod carries the TLS-peer annotation.
    pub tls_peer_annotation: bool,
    /// The etcd container runs with `PEER_TLS_MODE=strict`.
    pub strict_tls: bool,
}

impl From<PodObject> for PodInfo {
    fn from(pod: PodObject) -> Self {
        let strict_tls = pod
            .spec
            .containers
            .iter()
            .filter(|c| c.name == ETCD_CONTAINER)
            .flat_map(|c| c.env.iter())
            .any(|e| e.name == PEER_TLS_MODE_ENV && e.value.as_deref() == Some(PEER_TLS_MODE_STRICT));
        PodInfo {
            tls_peer_annotation: pod.metadata.annotations.contains_key(TLS_PEER_ANNOTATION),
            strict_tls,
        }
    }
}

// ── Secret ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SecretObject {
    #[serde(default)]
    pub data: HashMap<String, String>,
}

impl SecretObject {
    /// Decode every base64 value into a UTF-8 string.
    pub fn decode(self) -> PlatformResult<HashMap<String, String>> {
        self.data
            .into_iter()
            .map(|(k, v)| {
                let bytes = STANDARD
                    .decode(v.as_bytes())
                    .map_err(|e| PlatformError::Decode(format!("secret key {k}: {e}")))?;
                let value = String::from_utf8(bytes)
                    .map_err(|e| PlatformError::Decode(format!("secret key {k}: {e}")))?;
                Ok((k, value))
            })
            .collect()
    }
}

// ── Restore requests ───────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct EtcdRestoreList {
    #[serde(default)]
    pub items: Vec<EtcdRestoreObject>,
}

#[derive(Debug, Deserialize)]
pub struct EtcdRestoreObject {
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: EtcdRestoreSpec,
    #[serde(default)]
    pub status: EtcdRestoreStatus,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EtcdRestoreSpec {
    #[serde(default)]
    pub cluster: ObjectReference,
    #[serde(default)]
    pub backup_name: String,
    #[serde(default)]
    pub backup_download_credentials_secret: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct ObjectReference {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct EtcdRestoreStatus {
    #[serde(default)]
    pub phase: String,
}

impl From<EtcdRestoreObject> for RestoreRequest {
    fn from(obj: EtcdRestoreObject) -> Self {
        let secret = obj.spec.backup_download_credentials_secret;
        RestoreRequest {
            name: obj.metadata.name,
            backup_name: obj.spec.backup_name,
            phase: RestorePhase::parse(&obj.status.phase),
            tenant: obj.spec.cluster.name,
            credentials_secret: (!secret.is_empty()).then_some(secret),
        }
    }
}
