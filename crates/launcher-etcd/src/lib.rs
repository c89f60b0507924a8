//! launcher-etcd — administrative access to etcd.
//!
//! Every call follows the same shape:
//!
//! ```text
//! ClientFactory::connect(endpoints)   2s dial, retried every 5s for ≤60s
//!   └── one RPC under its own deadline (list 5s, add 15s, remove 30s, ...)
//!         └── raced against the process shutdown signal
//! client dropped
//! ```
//!
//! Callers depend on the [`AdminApi`] trait so membership logic can be
//! exercised against in-memory fakes.

pub mod admin;
pub mod client;
pub mod error;
pub mod tls;

pub use admin::{AdminApi, AdminFuture, EndpointStatus, EtcdAdmin};
pub use client::{ClientFactory, shutdown_requested};
pub use error::{EtcdError, EtcdResult};
pub use tls::TlsMaterial;
