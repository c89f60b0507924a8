//! launcher.toml configuration parser.
//!
//! Everything here is constant for a deployment (file paths mounted into the
//! pod, binary locations). Per-pod values arrive as command-line flags.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherConfig {
    pub tls: TlsPaths,
    pub binaries: BinaryPaths,
    /// Parent directory of every member's data directory.
    pub data_root: PathBuf,
    /// Where downloaded backup archives are staged before restore.
    pub download_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsPaths {
    pub ca_cert: PathBuf,
    /// Client identity used for administrative calls.
    pub client_cert: PathBuf,
    pub client_key: PathBuf,
    /// Server and peer identity handed to the etcd process.
    pub server_cert: PathBuf,
    pub server_key: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BinaryPaths {
    pub etcd: PathBuf,
    pub etcdutl: PathBuf,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            tls: TlsPaths::default(),
            binaries: BinaryPaths::default(),
            data_root: PathBuf::from("/var/run/etcd"),
            download_dir: PathBuf::from("/tmp"),
        }
    }
}

impl Default for TlsPaths {
    fn default() -> Self {
        Self {
            ca_cert: PathBuf::from("/etc/etcd/pki/ca/ca.crt"),
            client_cert: PathBuf::from("/etc/etcd/pki/client/apiserver-etcd-client.crt"),
            client_key: PathBuf::from("/etc/etcd/pki/client/apiserver-etcd-client.key"),
            server_cert: PathBuf::from("/etc/etcd/pki/tls/etcd-tls.crt"),
            server_key: PathBuf::from("/etc/etcd/pki/tls/etcd-tls.key"),
        }
    }
}

impl Default for BinaryPaths {
    fn default() -> Self {
        Self {
            etcd: PathBuf::from("/usr/local/bin/etcd"),
            etcdutl: PathBuf::from("/usr/local/bin/etcdutl"),
        }
    }
}

impl LauncherConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: LauncherConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Data directory owned by `pod_name`.
    ///
    /// Keeps the trailing separator etcd has always been given.
    pub fn data_dir(&self, pod_name: &str) -> PathBuf {
        self.data_root.join(format!("pod_{pod_name}/"))
    }
}
