//! launcher-maintenance — operator-invoked one-shot tools.
//!
//! - [`save_snapshot`]: stream a snapshot from the first endpoint that
//!   answers, falling back through the rest.
//! - [`defragment_all`]: defragment every member sequentially.
//! - [`wait_for_quorum`]: block until the cluster accepts a write.
//! - [`SnapshotRestorer`]: seed a data directory offline from a snapshot.

pub mod defrag;
pub mod error;
pub mod quorum;
pub mod restore;
pub mod snapshot;

#[cfg(test)]
mod testing;

pub use defrag::{DEFRAG_PAUSE, defragment_all};
pub use error::{EndpointFailure, MaintenanceError, MaintenanceResult};
pub use quorum::{DEFAULT_QUORUM_TIMEOUT, QUORUM_CHECK_KEY, wait_for_quorum};
pub use restore::{EtcdutlRestorer, RestoreFuture, RestorePlan, SnapshotRestorer};
pub use snapshot::{SnapshotOutcome, save_snapshot};
