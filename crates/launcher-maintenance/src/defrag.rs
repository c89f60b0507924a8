//! Sequential defragmentation of every member.

use std::time::Duration;

use tracing::{error, info};

use launcher_etcd::AdminApi;

use crate::error::{MaintenanceError, MaintenanceResult};

/// Pause between two members so the cluster never loses more than one at a time.
pub const DEFRAG_PAUSE: Duration = Duration::from_secs(5);

/// Defragment `endpoints` one after another, in the given order.
///
/// The first failure aborts the run; later endpoints are not touched.
pub async fn defragment_all(admin: &dyn AdminApi, endpoints: &[String], pause: Duration) -> MaintenanceResult<()> {
    if endpoints.is_empty() {
        return Err(MaintenanceError::NoEndpoints);
    }

    for (i, endpoint) in endpoints.iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(pause).await;
        }
        info!(%endpoint, "defragmenting");
        if let Err(source) = admin.defragment(endpoint).await {
            error!(%endpoint, error = %source, "defragmentation failed, aborting");
            return Err(MaintenanceError::Defragment {
                endpoint: endpoint.clone(),
                source,
            });
        }
    }

    info!(members = endpoints.len(), "defragmentation finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeAdmin;

    fn endpoints() -> Vec<String> {
        vec!["https://etcd-0:2379".into(), "https://etcd-1:2379".into(), "https://etcd-2:2379".into()]
    }

    #[tokio::test(start_paused = true)]
    async fn visits_every_endpoint_in_order() {
        let admin = FakeAdmin::default();
        let started = tokio::time::Instant::now();
        defragment_all(&admin, &endpoints(), DEFRAG_PAUSE).await.unwrap();
        assert_eq!(admin.defrag_calls(), endpoints());
        assert_eq!(started.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn first_failure_aborts_the_run() {
        let eps = endpoints();
        let admin = FakeAdmin::default().failing_defrag(&eps[1]);
        let err = defragment_all(&admin, &eps, DEFRAG_PAUSE).await.unwrap_err();
        assert!(matches!(err, MaintenanceError::Defragment { ref endpoint, .. } if endpoint == &eps[1]));
        assert_eq!(admin.defrag_calls(), vec![eps[0].clone(), eps[1].clone()]);
    }
}
