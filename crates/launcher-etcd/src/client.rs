//! Short-lived etcd client construction.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use etcd_client::{Client, ConnectOptions};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::{EtcdError, EtcdResult};
use crate::tls::TlsMaterial;

/// Per-connection dial timeout.
pub const DIAL_TIMEOUT: Duration = Duration::from_secs(2);
/// Pause between connection attempts.
pub const CONNECT_RETRY_INTERVAL: Duration = Duration::from_secs(5);
/// Total time spent trying to connect before giving up.
pub const CONNECT_RETRY_BUDGET: Duration = Duration::from_secs(60);

/// Builds clients against arbitrary endpoint sets.
///
/// Every client is bound to the process shutdown signal: once shutdown is
/// requested, pending connects and calls fail with [`EtcdError::Cancelled`].
#[derive(Clone)]
pub struct ClientFactory {
    tls: Arc<TlsMaterial>,
    shutdown: watch::Receiver<bool>,
    retry_interval: Duration,
    retry_budget: Duration,
}

impl ClientFactory {
    pub fn new(tls: TlsMaterial, shutdown: watch::Receiver<bool>) -> Self {
        Self {
            tls: Arc::new(tls),
            shutdown,
            retry_interval: CONNECT_RETRY_INTERVAL,
            retry_budget: CONNECT_RETRY_BUDGET,
        }
    }

    fn options(&self) -> ConnectOptions {
        ConnectOptions::new()
            .with_connect_timeout(DIAL_TIMEOUT)
            .with_tls(self.tls.options())
    }

    /// Connect once, without retrying.
    pub async fn connect_once(&self, endpoints: &[String]) -> EtcdResult<Client> {
        let fut = async {
            Client::connect(endpoints, Some(self.options()))
                .await
                .map_err(|e| EtcdError::Connect {
                    endpoints: endpoints.join(","),
                    reason: e.to_string(),
                })
        };
        self.cancellable("connect", fut).await
    }

    /// Connect, retrying every 5s for up to 60s.
    pub async fn connect(&self, endpoints: &[String]) -> EtcdResult<Client> {
        let started = Instant::now();
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.connect_once(endpoints).await {
                Ok(client) => {
                    debug!(endpoints = %endpoints.join(","), attempt, "etcd client connected");
                    return Ok(client);
                }
                Err(e @ EtcdError::Cancelled { .. }) => return Err(e),
                Err(e) => {
                    if started.elapsed() + self.retry_interval > self.retry_budget {
                        return Err(e);
                    }
                    warn!(endpoints = %endpoints.join(","), attempt, error = %e, "etcd connect failed, retrying");
                    self.cancellable("connect", async {
                        tokio::time::sleep(self.retry_interval).await;
                        Ok(())
                    })
                    .await?;
                }
            }
        }
    }

    /// Run `fut` under `timeout`, racing it against shutdown.
    pub async fn bounded<T, F>(&self, op: &'static str, timeout: Duration, fut: F) -> EtcdResult<T>
    where
        F: Future<Output = EtcdResult<T>>,
    {
        self.cancellable(op, async {
            tokio::time::timeout(timeout, fut)
                .await
                .map_err(|_| EtcdError::Timeout { op, timeout })?
        })
        .await
    }

    /// Race `fut` against the shutdown signal.
    pub async fn cancellable<T, F>(&self, op: &'static str, fut: F) -> EtcdResult<T>
    where
        F: Future<Output = EtcdResult<T>>,
    {
        let mut shutdown = self.shutdown.clone();
        if *shutdown.borrow() {
            return Err(EtcdError::Cancelled { op });
        }
        tokio::select! {
            res = fut => res,
            _ = shutdown_requested(&mut shutdown) => Err(EtcdError::Cancelled { op }),
        }
    }
}

/// Resolves once shutdown is requested. Never resolves if the sender is gone
/// without having requested it.
pub async fn shutdown_requested(rx: &mut watch::Receiver<bool>) {
    if rx.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn material() -> TlsMaterial {
        let key = rcgen::KeyPair::generate().unwrap();
        let cert = rcgen::CertificateParams::new(vec!["etcd".to_string()])
            .unwrap()
            .self_signed(&key)
            .unwrap();
        TlsMaterial::from_pem(cert.pem().into(), cert.pem().into(), key.serialize_pem().into()).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn bounded_reports_timeout() {
        let (_tx, rx) = watch::channel(false);
        let factory = ClientFactory::new(material(), rx);
        let res: EtcdResult<()> = factory
            .bounded("member list", Duration::from_secs(5), async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(())
            })
            .await;
        assert!(matches!(res, Err(EtcdError::Timeout { op: "member list", .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_cancels_pending_calls() {
        let (tx, rx) = watch::channel(false);
        let factory = ClientFactory::new(material(), rx);
        let call = tokio::spawn(async move {
            factory
                .bounded("member remove", Duration::from_secs(30), async {
                    tokio::time::sleep(Duration::from_secs(20)).await;
                    Ok(())
                })
                .await
        });
        tokio::time::sleep(Duration::from_secs(1)).await;
        tx.send(true).unwrap();
        let res = call.await.unwrap();
        assert!(matches!(res, Err(EtcdError::Cancelled { op: "member remove" })));
    }

    #[tokio::test]
    async fn calls_after_shutdown_fail_fast() {
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();
        let factory = ClientFactory::new(material(), rx);
        let res = factory.cancellable("status", async { Ok(()) }).await;
        assert!(res.unwrap_err().is_cancelled());
    }

    #[tokio::test]
    async fn dropped_sender_does_not_cancel() {
        let (tx, rx) = watch::channel(false);
        drop(tx);
        let factory = ClientFactory::new(material(), rx);
        let res = factory.cancellable("status", async { Ok(7) }).await;
        assert_eq!(res.unwrap(), 7);
    }
}
