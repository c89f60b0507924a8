//! `is-running`: wait until the cluster accepts a write.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{debug, info};

use launcher_etcd::AdminApi;
use launcher_health::{ProbePolicy, Verdict, run_probe};

use crate::error::{MaintenanceError, MaintenanceResult};

pub const QUORUM_CHECK_KEY: &str = "kubermatic/quorum-check";
pub const QUORUM_WRITE_INTERVAL: Duration = Duration::from_secs(1);
pub const DEFAULT_QUORUM_TIMEOUT: Duration = Duration::from_secs(30);

/// Write [`QUORUM_CHECK_KEY`] once per second until one write succeeds.
///
/// A successful write proves a quorum is serving requests.
pub async fn wait_for_quorum(admin: &dyn AdminApi, endpoints: &[String], timeout: Duration) -> MaintenanceResult<()> {
    if endpoints.is_empty() {
        return Err(MaintenanceError::NoEndpoints);
    }

    let policy = ProbePolicy::polling(QUORUM_WRITE_INTERVAL, timeout);
    let state = run_probe(policy, |attempt| async move {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        match admin.put(endpoints, QUORUM_CHECK_KEY, &stamp.to_string()).await {
            Ok(()) => Verdict::Confirmed,
            Err(e) => {
                debug!(attempt, error = %e, "quorum write failed");
                Verdict::Pending
            }
        }
    })
    .await;

    if state.is_confirmed() {
        info!("cluster accepted a quorum write");
        Ok(())
    } else {
        Err(MaintenanceError::QuorumTimeout(timeout))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeAdmin;

    #[tokio::test(start_paused = true)]
    async fn succeeds_once_a_write_lands() {
        let admin = FakeAdmin::default().failing_puts(3);
        wait_for_quorum(&admin, &["https://etcd-0:2379".into()], DEFAULT_QUORUM_TIMEOUT)
            .await
            .unwrap();
        assert_eq!(admin.put_calls(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_the_timeout() {
        let admin = FakeAdmin::default().failing_puts(u32::MAX);
        let err = wait_for_quorum(&admin, &["https://etcd-0:2379".into()], Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(err, MaintenanceError::QuorumTimeout(_)));
        assert_eq!(admin.put_calls(), 5);
    }
}
