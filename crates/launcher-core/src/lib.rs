//! launcher-core — shared types for the etcd cluster launcher.
//!
//! Holds everything the other launcher crates agree on: the resolved
//! per-process [`ClusterContext`], membership mirrors, the peer addressing
//! rules that turn pod names into URLs, deployment-level configuration, and
//! the error taxonomy used by the startup sequence.
//!
//! # Layout
//!
//! ```text
//! ClusterContext (immutable, built once by the resolver)
//!   ├── identity: tenant, namespace, pod name/IP, token, data dir
//!   ├── bootstrap: New | Existing
//!   ├── initial members: etcd-0..etcd-(n-1) → peer URLs
//!   └── Topology (member count + addressing mode)
//!         └── refreshed by the reaper, published over a watch channel
//! ```

pub mod addressing;
pub mod config;
pub mod context;
pub mod error;
pub mod types;

pub use addressing::ServiceDomain;
pub use config::LauncherConfig;
pub use context::{ClusterContext, Topology};
pub use error::{LauncherError, LauncherResult, StepFailure, StepResult};
pub use types::*;
