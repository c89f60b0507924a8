//! Mutual-TLS client material.
//!
//! The CA bundle, client certificate and client key are read once at
//! startup and validated before any network call is attempted.

use std::path::Path;

use etcd_client::{Certificate, Identity, TlsOptions};
use rustls_pemfile::Item;
use tracing::debug;

use launcher_core::config::TlsPaths;

use crate::error::{EtcdError, EtcdResult};

/// PEM-encoded CA bundle plus client identity.
#[derive(Clone)]
pub struct TlsMaterial {
    ca_pem: Vec<u8>,
    cert_pem: Vec<u8>,
    key_pem: Vec<u8>,
}

impl std::fmt::Debug for TlsMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsMaterial")
            .field("ca_pem", &self.ca_pem.len())
            .field("cert_pem", &self.cert_pem.len())
            .field("key_pem", &"<redacted>")
            .finish()
    }
}

impl TlsMaterial {
    /// Read and validate the client material from `paths`.
    pub fn load(paths: &TlsPaths) -> EtcdResult<Self> {
        let ca_pem = read(&paths.ca_cert)?;
        let cert_pem = read(&paths.client_cert)?;
        let key_pem = read(&paths.client_key)?;
        let material = Self::from_pem(ca_pem, cert_pem, key_pem)?;
        debug!(ca = %paths.ca_cert.display(), cert = %paths.client_cert.display(), "loaded client TLS material");
        Ok(material)
    }

    pub fn from_pem(ca_pem: Vec<u8>, cert_pem: Vec<u8>, key_pem: Vec<u8>) -> EtcdResult<Self> {
        let ca_count = count_certificates(&ca_pem)?;
        if ca_count == 0 {
            return Err(EtcdError::Tls("CA bundle contains no certificate".into()));
        }
        if count_certificates(&cert_pem)? == 0 {
            return Err(EtcdError::Tls("client certificate file contains no certificate".into()));
        }
        match count_private_keys(&key_pem)? {
            1 => {}
            0 => return Err(EtcdError::Tls("client key file contains no private key".into())),
            n => return Err(EtcdError::Tls(format!("client key file contains {n} private keys, expected one"))),
        }

        Ok(Self { ca_pem, cert_pem, key_pem })
    }

    /// Client TLS options for etcd connections.
    pub fn options(&self) -> TlsOptions {
        TlsOptions::new()
            .ca_certificate(Certificate::from_pem(&self.ca_pem))
            .identity(Identity::from_pem(&self.cert_pem, &self.key_pem))
    }
}

fn read(path: &Path) -> EtcdResult<Vec<u8>> {
    std::fs::read(path).map_err(|e| EtcdError::Tls(format!("failed to read {}: {e}", path.display())))
}

fn pem_items(pem: &[u8]) -> EtcdResult<Vec<Item>> {
    let mut reader = pem;
    rustls_pemfile::read_all(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| EtcdError::Tls(format!("malformed PEM: {e}")))
}

fn count_certificates(pem: &[u8]) -> EtcdResult<usize> {
    Ok(pem_items(pem)?
        .iter()
        .filter(|item| matches!(item, Item::X509Certificate(_)))
        .count())
}

fn count_private_keys(pem: &[u8]) -> EtcdResult<usize> {
    Ok(pem_items(pem)?
        .iter()
        .filter(|item| matches!(item, Item::Pkcs1Key(_) | Item::Pkcs8Key(_) | Item::Sec1Key(_)))
        .count())
}
