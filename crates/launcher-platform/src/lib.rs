//! launcher-platform — what the launcher reads from its surroundings.
//!
//! - [`Platform`]: read-only Kubernetes lookups (tenant object, etcd
//!   StatefulSet, member pods, restore requests, credential secrets).
//! - [`BlobStore`]: download of backup archives from S3-compatible storage.
//!
//! Both are traits so the cluster logic can run against fakes.

pub mod blob;
pub mod error;
pub mod kube;
pub mod objects;

pub use blob::{BlobFuture, BlobSource, BlobStore, S3BlobStore};
pub use error::{PlatformError, PlatformResult};
pub use kube::{KubeClient, Platform, PlatformFuture};
pub use objects::{ControlObject, PEER_TLS_MODE_ENV, PEER_TLS_MODE_STRICT, PodInfo, TLS_PEER_ANNOTATION};
