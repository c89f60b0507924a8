//! Read-only Kubernetes API access.
//!
//! The launcher runs in-cluster and authenticates with its service account
//! token. Only a handful of GETs are needed, so the client talks to the REST
//! API directly.

use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::debug;

use launcher_core::RestoreRequest;
use launcher_core::addressing::DEFAULT_SERVICE_NAME;

use crate::error::{PlatformError, PlatformResult};
use crate::objects::{
    ClusterObject, ControlObject, EtcdRestoreList, PodInfo, PodObject, SecretObject, StatefulSetObject,
};

const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub type PlatformFuture<'a, T> = Pin<Box<dyn Future<Output = PlatformResult<T>> + Send + 'a>>;

/// Lookups against the orchestration platform.
pub trait Platform: Send + Sync {
    /// Namespace and bootstrap state of `tenant`.
    fn control_object(&self, tenant: &str) -> PlatformFuture<'_, ControlObject>;

    /// Desired replica count of the etcd StatefulSet, `None` when unset.
    fn replica_count(&self, namespace: &str) -> PlatformFuture<'_, Option<u32>>;

    /// Addressing hints of pod `name`. A missing pod is [`PlatformError::NotFound`].
    fn pod(&self, namespace: &str, name: &str) -> PlatformFuture<'_, PodInfo>;

    fn restore_requests(&self, namespace: &str) -> PlatformFuture<'_, Vec<RestoreRequest>>;

    /// Decoded data of secret `name`.
    fn secret(&self, namespace: &str, name: &str) -> PlatformFuture<'_, HashMap<String, String>>;
}

/// [`Platform`] over the Kubernetes REST API.
pub struct KubeClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl KubeClient {
    /// Build a client from the pod's service account and the
    /// `KUBERNETES_SERVICE_HOST`/`KUBERNETES_SERVICE_PORT` variables.
    pub fn in_cluster() -> PlatformResult<Self> {
        let host = std::env::var("KUBERNETES_SERVICE_HOST")
            .map_err(|_| PlatformError::Config("KUBERNETES_SERVICE_HOST is not set".into()))?;
        let port = std::env::var("KUBERNETES_SERVICE_PORT").unwrap_or_else(|_| "443".into());
        let host = if host.contains(':') { format!("[{host}]") } else { host };
        Self::from_service_account(format!("https://{host}:{port}"), Path::new(SERVICE_ACCOUNT_DIR))
    }

    /// Build a client for `base_url` with the token and CA found in `dir`.
    pub fn from_service_account(base_url: String, dir: &Path) -> PlatformResult<Self> {
        let token = std::fs::read_to_string(dir.join("token"))
            .map_err(|e| PlatformError::Config(format!("failed to read service account token: {e}")))?;
        let ca = std::fs::read(dir.join("ca.crt"))
            .map_err(|e| PlatformError::Config(format!("failed to read service account CA: {e}")))?;
        let ca = reqwest::Certificate::from_pem(&ca)
            .map_err(|e| PlatformError::Config(format!("invalid service account CA: {e}")))?;

        let http = reqwest::Client::builder()
            .add_root_certificate(ca)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.trim().to_string(),
        })
    }

    async fn get<T: DeserializeOwned>(&self, kind: &'static str, name: &str, path: &str) -> PlatformResult<T> {
        let url = format!("{}{path}", self.base_url);
        debug!(%url, kind, "platform lookup");
        let resp = self.http.get(&url).bearer_auth(&self.token).send().await?;

        let status = resp.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(PlatformError::NotFound {
                kind,
                name: name.to_string(),
            });
        }
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(PlatformError::Api {
                kind,
                name: name.to_string(),
                status: status.as_u16(),
                message,
            });
        }

        resp.json::<T>()
            .await
            .map_err(|e| PlatformError::Decode(format!("{kind} {name}: {e}")))
    }
}

impl Platform for KubeClient {
    fn control_object(&self, tenant: &str) -> PlatformFuture<'_, ControlObject> {
        let tenant = tenant.to_string();
        Box::pin(async move {
            let path = format!("/apis/kubermatic.k8c.io/v1/clusters/{tenant}");
            let obj: ClusterObject = self.get("cluster", &tenant, &path).await?;
            Ok(obj.into())
        })
    }

    fn replica_count(&self, namespace: &str) -> PlatformFuture<'_, Option<u32>> {
        let namespace = namespace.to_string();
        Box::pin(async move {
            let path = format!("/apis/apps/v1/namespaces/{namespace}/statefulsets/{DEFAULT_SERVICE_NAME}");
            let sts: StatefulSetObject = self.get("statefulset", DEFAULT_SERVICE_NAME, &path).await?;
            Ok(sts.spec.replicas)
        })
    }

    fn pod(&self, namespace: &str, name: &str) -> PlatformFuture<'_, PodInfo> {
        let namespace = namespace.to_string();
        let name = name.to_string();
        Box::pin(async move {
            let path = format!("/api/v1/namespaces/{namespace}/pods/{name}");
            let pod: PodObject = self.get("pod", &name, &path).await?;
            Ok(pod.into())
        })
    }

    fn restore_requests(&self, namespace: &str) -> PlatformFuture<'_, Vec<RestoreRequest>> {
        let namespace = namespace.to_string();
        Box::pin(async move {
            let path = format!("/apis/kubermatic.k8c.io/v1/namespaces/{namespace}/etcdrestores");
            let list: EtcdRestoreList = self.get("etcdrestores", &namespace, &path).await?;
            Ok(list.items.into_iter().map(Into::into).collect())
        })
    }

    fn secret(&self, namespace: &str, name: &str) -> PlatformFuture<'_, HashMap<String, String>> {
        let namespace = namespace.to_string();
        let name = name.to_string();
        Box::pin(async move {
            let path = format!("/api/v1/namespaces/{namespace}/secrets/{name}");
            let secret: SecretObject = self.get("secret", &name, &path).await?;
            secret.decode()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_service_account_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = KubeClient::from_service_account("https://10.0.0.1:443".into(), dir.path())
            .err()
            .unwrap();
        assert!(matches!(err, PlatformError::Config(_)));
    }
}
