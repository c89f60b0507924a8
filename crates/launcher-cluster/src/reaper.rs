//! Dead-member reaper.
//!
//! Every 30 seconds the reaper refreshes the target member count, looks for
//! membership entries that no expected replica backs, and, if this member
//! currently leads, removes the ones that stay unreachable for 15 seconds.
//! A pass that cannot read the member count removes nothing. A failed tick
//! is logged and the loop carries on.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use launcher_core::addressing::LOCAL_ENDPOINT;
use launcher_core::{ClusterContext, LauncherResult, MemberRecord, Topology};
use launcher_etcd::{AdminApi, shutdown_requested};
use launcher_health::{ProbePolicy, ProbeState, Verdict, is_healthy, is_leader, run_probe};
use launcher_platform::Platform;

use crate::resolver::fetch_member_count;

pub const REAPER_INTERVAL: Duration = Duration::from_secs(30);

/// Members no expected replica accounts for.
///
/// A member is unwanted when it advertises anything but one or two peer
/// URLs, or when any of its peer hosts is outside `expected_hosts`.
pub fn unwanted_members(members: &[MemberRecord], expected_hosts: &[String]) -> Vec<MemberRecord> {
    let expected: HashSet<&str> = expected_hosts.iter().map(String::as_str).collect();
    members
        .iter()
        .filter(|m| {
            let count_ok = matches!(m.peer_urls.len(), 1 | 2);
            !count_ok || m.peer_hosts().any(|host| host.is_none_or(|h| !expected.contains(h)))
        })
        .cloned()
        .collect()
}

/// Result of one reaper pass.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TickReport {
    /// Member count used for this pass.
    pub member_count: usize,
    /// Unwanted members found.
    pub unwanted: Vec<u64>,
    /// False when unwanted members existed but this member is not leader.
    pub leader: bool,
    /// Members removed.
    pub removed: Vec<u64>,
    /// Unwanted members that answered and were kept.
    pub kept: Vec<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Liveness {
    Responding,
    Gone,
    Silent,
}

pub struct Reaper {
    admin: Arc<dyn AdminApi>,
    platform: Arc<dyn Platform>,
    ctx: Arc<ClusterContext>,
    topology: watch::Sender<Topology>,
    interval: Duration,
    leadership: ProbePolicy,
    liveness: ProbePolicy,
}

impl Reaper {
    pub fn new(
        admin: Arc<dyn AdminApi>,
        platform: Arc<dyn Platform>,
        ctx: Arc<ClusterContext>,
        topology: watch::Sender<Topology>,
    ) -> Self {
        Self {
            admin,
            platform,
            ctx,
            topology,
            interval: REAPER_INTERVAL,
            leadership: ProbePolicy::leadership(),
            liveness: ProbePolicy::dead_member(),
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Re-read the target member count and publish it.
    async fn refresh_topology(&self) -> LauncherResult<Topology> {
        let current = *self.topology.borrow();
        let count = fetch_member_count(self.platform.as_ref(), self.ctx.namespace()).await?;
        let next = current.with_member_count(count);
        if next != current {
            info!(from = current.member_count, to = next.member_count, "cluster size changed");
        }
        self.topology.send_replace(next);
        Ok(next)
    }

    /// One reaper pass.
    ///
    /// Without a fresh member count nothing is judged unwanted: the pass
    /// fails before membership is even listed.
    pub async fn tick(&self) -> LauncherResult<TickReport> {
        let topology = self.refresh_topology().await?;
        let mut report = TickReport {
            member_count: topology.member_count,
            ..Default::default()
        };

        let endpoints = self.ctx.domain.client_endpoints(topology.member_count);
        let members = self.admin.member_list(&endpoints).await?;
        let unwanted = unwanted_members(&members, &self.ctx.domain.expected_hosts(topology.member_count));
        report.unwanted = unwanted.iter().map(|m| m.id).collect();
        if unwanted.is_empty() {
            return Ok(report);
        }

        if !is_leader(self.admin.as_ref(), LOCAL_ENDPOINT, self.leadership).await {
            debug!(unwanted = unwanted.len(), "not the leader, leaving membership alone");
            return Ok(report);
        }
        report.leader = true;

        for candidate in unwanted {
            if candidate.name == self.ctx.pod_name {
                continue;
            }
            info!(member_id = candidate.id, name = %candidate.name, "checking cluster member for removal");

            match self.liveness_of(&endpoints, candidate.id).await {
                Liveness::Responding => {
                    info!(member_id = candidate.id, name = %candidate.name, "member is responding, keeping it");
                    report.kept.push(candidate.id);
                }
                Liveness::Gone => debug!(member_id = candidate.id, "member already gone"),
                Liveness::Silent => {
                    info!(member_id = candidate.id, name = %candidate.name, "member is not responding, removing from cluster");
                    match self.admin.member_remove(&endpoints, candidate.id).await {
                        Ok(()) => report.removed.push(candidate.id),
                        Err(e) => error!(member_id = candidate.id, error = %e, "failed to remove member"),
                    }
                }
            }
        }

        Ok(report)
    }

    /// Poll member `id` until it answers, leaves the cluster or the liveness
    /// window closes.
    ///
    /// The record is re-read on every poll, so a member that publishes its
    /// first client URL during the window still gets probed. Until then it
    /// counts as not answering.
    async fn liveness_of(&self, endpoints: &[String], id: u64) -> Liveness {
        let admin = self.admin.as_ref();
        let state = run_probe(self.liveness, |attempt| async move {
            let member = match admin.member_list(endpoints).await {
                Ok(list) => list.into_iter().find(|m| m.id == id),
                Err(e) => {
                    debug!(member_id = id, attempt, error = %e, "failed to re-read member");
                    return Verdict::Pending;
                }
            };
            let Some(member) = member else {
                return Verdict::Refuted;
            };
            let Some(url) = member.latest_client_url() else {
                debug!(member_id = id, attempt, "member has no client URL yet");
                return Verdict::Pending;
            };
            if is_healthy(admin, &[url.to_string()]).await {
                Verdict::Confirmed
            } else {
                Verdict::Pending
            }
        })
        .await;

        match state {
            ProbeState::ConfirmedHealthy => Liveness::Responding,
            ProbeState::ConfirmedUnhealthy => Liveness::Gone,
            ProbeState::TimedOut | ProbeState::Probing { .. } => Liveness::Silent,
        }
    }

    /// Run until shutdown. An in-flight pass is abandoned on shutdown.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(interval_secs = self.interval.as_secs(), "dead member reaper started");

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {
                    tokio::select! {
                        res = self.tick() => match res {
                            Ok(report) if !report.removed.is_empty() => {
                                info!(removed = ?report.removed, "removed dead members");
                            }
                            Ok(report) => debug!(?report, "reaper pass finished"),
                            Err(e) => warn!(error = %e, "reaper pass failed"),
                        },
                        _ = shutdown_requested(&mut shutdown) => {
                            info!("reaper shutting down, abandoning current pass");
                            break;
                        }
                    }
                }
                _ = shutdown_requested(&mut shutdown) => {
                    info!("reaper shutting down");
                    break;
                }
            }
        }
    }
}
