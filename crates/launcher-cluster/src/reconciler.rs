//! Membership reconciler for members of an existing cluster.
//!
//! Runs once before etcd starts:
//!
//! 1. bring this member's advertised peer URLs in line with the addressing mode
//! 2. look up this member in the member list
//! 3. remove a listed member whose local data directory is gone
//! 4. join as a new member when not listed

use std::collections::BTreeSet;

use tracing::{info, warn};

use launcher_core::{BootstrapKind, ClusterContext, LauncherError, MemberRecord, StepFailure, StepResult};
use launcher_etcd::AdminApi;

use crate::resolver::desired_peer_urls;
use crate::restore::remove_dir_if_present;

/// What a peer URL sync has to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PeerUrlPlan {
    /// The advertised URLs already match.
    InSync,
    /// Member `id` must advertise `peer_urls`.
    Update { id: u64, peer_urls: Vec<String> },
    /// This pod has no named entry in the member list.
    NotListed,
}

/// Decide whether the member named `pod_name` needs a peer URL update.
///
/// URL sets are compared without regard to order.
pub fn plan_peer_url_sync(members: &[MemberRecord], pod_name: &str, desired: &[String]) -> PeerUrlPlan {
    let Some(member) = members.iter().find(|m| m.name == pod_name) else {
        return PeerUrlPlan::NotListed;
    };
    let current: BTreeSet<&str> = member.peer_urls.iter().map(String::as_str).collect();
    let wanted: BTreeSet<&str> = desired.iter().map(String::as_str).collect();
    if current == wanted {
        PeerUrlPlan::InSync
    } else {
        PeerUrlPlan::Update {
            id: member.id,
            peer_urls: desired.to_vec(),
        }
    }
}

/// Find this pod's entry by name, or by peer hostname for a member that was
/// added but never started (and so has no name yet).
pub fn find_local_member<'m>(members: &'m [MemberRecord], pod_name: &str, local_host: &str) -> Option<&'m MemberRecord> {
    members
        .iter()
        .find(|m| m.name == pod_name)
        .or_else(|| members.iter().find(|m| m.peer_hosts().any(|h| h == Some(local_host))))
}

/// How reconciliation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Not an existing cluster; nothing to do.
    Skipped,
    /// Already a healthy member with local state.
    AlreadyMember { id: u64 },
    /// Joined as a new member (after removing a stale entry if `replaced`).
    Joined { id: u64, replaced: Option<u64> },
    /// The member list could not be read; startup continues without joining.
    LookupFailed,
}

pub struct Reconciler<'a> {
    admin: &'a dyn AdminApi,
    ctx: &'a ClusterContext,
    endpoints: Vec<String>,
}

impl<'a> Reconciler<'a> {
    pub fn new(admin: &'a dyn AdminApi, ctx: &'a ClusterContext) -> Self {
        let endpoints = ctx.domain.client_endpoints(ctx.topology.member_count);
        Self { admin, ctx, endpoints }
    }

    /// Best-effort peer URL sync. Returns whether an update was issued.
    pub async fn sync_peer_urls(&self) -> StepResult<bool> {
        let members = self.admin.member_list(&self.endpoints).await.map_err(StepFailure::warn)?;
        let desired = desired_peer_urls(self.ctx, self.ctx.topology.addressing);

        match plan_peer_url_sync(&members, &self.ctx.pod_name, &desired) {
            PeerUrlPlan::InSync | PeerUrlPlan::NotListed => Ok(false),
            PeerUrlPlan::Update { id, peer_urls } => {
                info!(member_id = id, peer_urls = ?peer_urls, "updating advertised peer URLs");
                self.admin
                    .member_update(&self.endpoints, id, &peer_urls)
                    .await
                    .map_err(StepFailure::warn)?;
                Ok(true)
            }
        }
    }

    /// This pod's membership entry, if any. Lookup failures are warnings.
    pub async fn lookup_local_member(&self) -> StepResult<Option<MemberRecord>> {
        let members = self.admin.member_list(&self.endpoints).await.map_err(StepFailure::warn)?;
        Ok(find_local_member(&members, &self.ctx.pod_name, &self.ctx.local_host()).cloned())
    }

    /// Whether the local data directory still holds member state.
    pub async fn has_local_state(&self) -> bool {
        tokio::fs::try_exists(self.ctx.member_dir()).await.unwrap_or(false)
    }

    /// Remove a stale membership entry. Failure is fatal.
    pub async fn remove_stale_member(&self, member: &MemberRecord) -> StepResult<()> {
        info!(member_id = member.id, name = %member.name, "removing stale member without local data");
        self.admin
            .member_remove(&self.endpoints, member.id)
            .await
            .map_err(StepFailure::abort)
    }

    /// Join the cluster as a new member, starting from an empty data directory.
    pub async fn join(&self) -> StepResult<MemberRecord> {
        remove_dir_if_present(self.ctx.data_dir()).await.map_err(StepFailure::Abort)?;

        let peer_urls = desired_peer_urls(self.ctx, self.ctx.topology.addressing);
        let member = self
            .admin
            .member_add(&self.endpoints, &peer_urls)
            .await
            .map_err(StepFailure::abort)?;
        info!(member_id = member.id, peer_urls = ?peer_urls, "joined cluster");
        Ok(member)
    }

    /// Run every reconciliation step. Only fatal failures are returned.
    pub async fn reconcile(&self) -> Result<ReconcileOutcome, LauncherError> {
        if self.ctx.bootstrap != BootstrapKind::Existing {
            return Ok(ReconcileOutcome::Skipped);
        }

        check(self.sync_peer_urls().await, "peer URL sync")?;

        let local = match check(self.lookup_local_member().await, "membership lookup")? {
            Some(found) => found,
            None => return Ok(ReconcileOutcome::LookupFailed),
        };

        let replaced = match local {
            Some(member) if self.has_local_state().await => {
                info!(member_id = member.id, "already a cluster member");
                return Ok(ReconcileOutcome::AlreadyMember { id: member.id });
            }
            Some(member) => {
                self.remove_stale_member(&member).await.map_err(StepFailure::into_inner)?;
                Some(member.id)
            }
            None => None,
        };

        let joined = self.join().await.map_err(StepFailure::into_inner)?;
        Ok(ReconcileOutcome::Joined {
            id: joined.id,
            replaced,
        })
    }
}

/// Log a warning and continue, or propagate an abort.
fn check<T>(result: StepResult<T>, step: &str) -> Result<Option<T>, LauncherError> {
    match result {
        Ok(v) => Ok(Some(v)),
        Err(StepFailure::Warn(e)) => {
            warn!(step, error = %e, "continuing after failed step");
            Ok(None)
        }
        Err(StepFailure::Abort(e)) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(id: u64, name: &str, peers: &[&str]) -> MemberRecord {
        MemberRecord {
            id,
            name: name.into(),
            peer_urls: peers.iter().map(|p| p.to_string()).collect(),
            client_urls: vec![],
        }
    }

    #[test]
    fn in_sync_regardless_of_order() {
        let members = vec![member(1, "etcd-0", &["https://h:2381", "http://h:2380"])];
        let desired = vec!["http://h:2380".to_string(), "https://h:2381".to_string()];
        assert_eq!(plan_peer_url_sync(&members, "etcd-0", &desired), PeerUrlPlan::InSync);
    }

    #[test]
    fn plaintext_only_member_gets_tls_added() {
        let members = vec![member(7, "etcd-0", &["http://h:2380"])];
        let desired = vec!["http://h:2380".to_string(), "https://h:2381".to_string()];
        assert_eq!(
            plan_peer_url_sync(&members, "etcd-0", &desired),
            PeerUrlPlan::Update {
                id: 7,
                peer_urls: desired.clone()
            }
        );
    }

    #[test]
    fn strict_mode_drops_plaintext() {
        let members = vec![member(7, "etcd-0", &["http://h:2380", "https://h:2381"])];
        let desired = vec!["https://h:2381".to_string()];
        assert!(matches!(
            plan_peer_url_sync(&members, "etcd-0", &desired),
            PeerUrlPlan::Update { id: 7, .. }
        ));
    }

    #[test]
    fn unnamed_member_matches_by_host() {
        let host = "etcd-2.etcd.ns.svc.cluster.local";
        let members = vec![
            member(1, "etcd-0", &["https://etcd-0.etcd.ns.svc.cluster.local:2381"]),
            member(3, "", &["https://etcd-2.etcd.ns.svc.cluster.local:2381"]),
        ];
        assert_eq!(find_local_member(&members, "etcd-2", host).map(|m| m.id), Some(3));
        assert!(find_local_member(&members, "etcd-1", "etcd-1.etcd.ns.svc.cluster.local").is_none());
        assert_eq!(plan_peer_url_sync(&members, "etcd-2", &[]), PeerUrlPlan::NotListed);
    }
}
