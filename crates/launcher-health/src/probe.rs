//! Liveness and leadership probes over the admin API.

use tracing::{debug, info, warn};

use launcher_etcd::{AdminApi, EndpointStatus, EtcdResult};

use crate::checker::{ProbePolicy, ProbeState, Verdict, run_probe};

/// Key read by the liveness probe. It does not need to exist.
pub const HEALTH_KEY: &str = "healthy";

/// Whether any of `endpoints` answers a read.
///
/// A permission-denied answer still proves the server is serving requests,
/// so it counts as healthy. Every other failure is "not yet healthy".
pub async fn is_healthy(admin: &dyn AdminApi, endpoints: &[String]) -> bool {
    match admin.read_key(endpoints, HEALTH_KEY).await {
        Ok(()) => true,
        Err(e) if e.is_permission_denied() => true,
        Err(e) => {
            debug!(endpoints = %endpoints.join(","), error = %e, "endpoint not healthy yet");
            false
        }
    }
}

/// Map one status answer onto the probe state machine.
pub fn leadership_verdict(status: &EtcdResult<EndpointStatus>) -> Verdict {
    match status {
        Ok(s) if s.leader == 0 => Verdict::Pending,
        Ok(s) if s.is_leader() => Verdict::Confirmed,
        Ok(_) => Verdict::Refuted,
        Err(_) => Verdict::Pending,
    }
}

/// Whether the member behind `local_endpoint` currently leads the cluster.
///
/// Never assumes leadership: errors and exhaustion both yield `false`.
pub async fn is_leader(admin: &dyn AdminApi, local_endpoint: &str, policy: ProbePolicy) -> bool {
    let state = run_probe(policy, |attempt| async move {
        let status = admin.status(local_endpoint).await;
        if let Err(e) = &status {
            debug!(attempt, error = %e, "status probe failed");
        }
        leadership_verdict(&status)
    })
    .await;
    state.is_confirmed()
}

/// Poll `endpoints` until healthy or the policy's budget is spent.
pub async fn wait_until_healthy(admin: &dyn AdminApi, endpoints: &[String], policy: ProbePolicy) -> ProbeState {
    let state = run_probe(policy, |_| async move {
        if is_healthy(admin, endpoints).await {
            Verdict::Confirmed
        } else {
            Verdict::Pending
        }
    })
    .await;

    match state {
        ProbeState::ConfirmedHealthy => info!(endpoints = %endpoints.join(","), "etcd is healthy"),
        other => warn!(endpoints = %endpoints.join(","), state = ?other, "etcd did not become healthy"),
    }
    state
}
