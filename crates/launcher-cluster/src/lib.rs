//! launcher-cluster — membership management for one etcd member.
//!
//! Decides how this member enters the cluster and keeps the membership list
//! clean while it runs.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────── before etcd starts ─────────────────────────┐
//! │  resolver ──► ClusterContext                                         │
//! │                 │                                                    │
//! │        New ─────┴───── Existing                                      │
//! │         │                  │                                         │
//! │   RestoreGate         Reconciler                                     │
//! │   (seed from backup)  (sync peer URLs, drop stale entry, join)       │
//! └──────────────────────────────────────────────────────────────────────┘
//! ┌──────────────────────── while etcd runs ────────────────────────────┐
//! │  Reaper (every 30s)                                                  │
//! │    refresh member count ──► Topology watch                           │
//! │    list members ──► unwanted? ──► leader? ──► dead 15s? ──► remove   │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```

pub mod reaper;
pub mod reconciler;
pub mod resolver;
pub mod restore;
pub mod startup;

pub use reaper::{REAPER_INTERVAL, Reaper, TickReport, unwanted_members};
pub use reconciler::{PeerUrlPlan, ReconcileOutcome, Reconciler, find_local_member, plan_peer_url_sync};
pub use resolver::{ResolverInput, addressing_mode, desired_peer_urls, fetch_member_count, initial_member, resolve};
pub use restore::{RestoreGate, active_requests, backup_object_name, remove_dir_if_present};
pub use startup::{Prepared, Startup};
