//! Administrative API surface used by the launcher.
//!
//! [`AdminApi`] is the seam between the membership logic and etcd. The
//! production implementation, [`EtcdAdmin`], opens a fresh client for every
//! call, performs exactly one operation and drops the client again. The
//! connect counts against the call's deadline. Probing calls (member list,
//! status, read) dial once; the rest keep retrying until their deadline.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tracing::debug;

use launcher_core::MemberRecord;

use crate::client::ClientFactory;
use crate::error::{EtcdError, EtcdResult};

pub const MEMBER_LIST_TIMEOUT: Duration = Duration::from_secs(5);
pub const MEMBER_ADD_TIMEOUT: Duration = Duration::from_secs(15);
pub const MEMBER_REMOVE_TIMEOUT: Duration = Duration::from_secs(30);
pub const MEMBER_UPDATE_TIMEOUT: Duration = Duration::from_secs(10);
pub const READ_TIMEOUT: Duration = Duration::from_secs(5);
pub const STATUS_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFRAGMENT_TIMEOUT: Duration = Duration::from_secs(30);
pub const SNAPSHOT_TIMEOUT: Duration = Duration::from_secs(300);
pub const PUT_TIMEOUT: Duration = Duration::from_secs(5);

pub type AdminFuture<'a, T> = Pin<Box<dyn Future<Output = EtcdResult<T>> + Send + 'a>>;

/// Status of a single endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointStatus {
    /// ID of the member that answered.
    pub member_id: u64,
    /// Current leader as seen by that member; 0 while there is none.
    pub leader: u64,
}

impl EndpointStatus {
    pub fn is_leader(&self) -> bool {
        self.leader != 0 && self.leader == self.member_id
    }
}

/// Membership and maintenance calls against an etcd cluster.
pub trait AdminApi: Send + Sync {
    fn member_list(&self, endpoints: &[String]) -> AdminFuture<'_, Vec<MemberRecord>>;

    /// Add a member advertising `peer_urls`. Returns the new record.
    fn member_add(&self, endpoints: &[String], peer_urls: &[String]) -> AdminFuture<'_, MemberRecord>;

    fn member_remove(&self, endpoints: &[String], id: u64) -> AdminFuture<'_, ()>;

    fn member_update(&self, endpoints: &[String], id: u64, peer_urls: &[String]) -> AdminFuture<'_, ()>;

    /// Read `key`; used as a liveness probe.
    fn read_key(&self, endpoints: &[String], key: &str) -> AdminFuture<'_, ()>;

    fn status(&self, endpoint: &str) -> AdminFuture<'_, EndpointStatus>;

    fn defragment(&self, endpoint: &str) -> AdminFuture<'_, ()>;

    /// Stream a snapshot from `endpoint` into `dest`, returning the byte count.
    fn snapshot(&self, endpoint: &str, dest: &Path) -> AdminFuture<'_, u64>;

    fn put(&self, endpoints: &[String], key: &str, value: &str) -> AdminFuture<'_, ()>;
}

fn to_record(member: &etcd_client::Member) -> MemberRecord {
    MemberRecord {
        id: member.id(),
        name: member.name().to_string(),
        peer_urls: member.peer_urls().to_vec(),
        client_urls: member.client_urls().to_vec(),
    }
}

/// [`AdminApi`] over real etcd clients.
#[derive(Clone)]
pub struct EtcdAdmin {
    factory: ClientFactory,
}

impl EtcdAdmin {
    pub fn new(factory: ClientFactory) -> Self {
        Self { factory }
    }

    pub fn factory(&self) -> &ClientFactory {
        &self.factory
    }
}

impl AdminApi for EtcdAdmin {
    fn member_list(&self, endpoints: &[String]) -> AdminFuture<'_, Vec<MemberRecord>> {
        let endpoints = endpoints.to_vec();
        Box::pin(async move {
            let resp = self
                .factory
                .bounded("member list", MEMBER_LIST_TIMEOUT, async {
                    let mut client = self.factory.connect_once(&endpoints).await?;
                    client.member_list().await.map_err(|e| EtcdError::rpc("member list", e))
                })
                .await?;
            Ok(resp.members().iter().map(to_record).collect())
        })
    }

    fn member_add(&self, endpoints: &[String], peer_urls: &[String]) -> AdminFuture<'_, MemberRecord> {
        let endpoints = endpoints.to_vec();
        let peer_urls = peer_urls.to_vec();
        Box::pin(async move {
            let resp = self
                .factory
                .bounded("member add", MEMBER_ADD_TIMEOUT, async {
                    let mut client = self.factory.connect(&endpoints).await?;
                    client
                        .member_add(peer_urls.clone(), None)
                        .await
                        .map_err(|e| EtcdError::rpc("member add", e))
                })
                .await?;
            let record = resp.member().map(to_record).unwrap_or(MemberRecord {
                id: 0,
                name: String::new(),
                peer_urls,
                client_urls: Vec::new(),
            });
            debug!(member_id = record.id, "member added");
            Ok(record)
        })
    }

    fn member_remove(&self, endpoints: &[String], id: u64) -> AdminFuture<'_, ()> {
        let endpoints = endpoints.to_vec();
        Box::pin(async move {
            self.factory
                .bounded("member remove", MEMBER_REMOVE_TIMEOUT, async {
                    let mut client = self.factory.connect(&endpoints).await?;
                    client.member_remove(id).await.map_err(|e| EtcdError::rpc("member remove", e))
                })
                .await?;
            Ok(())
        })
    }

    fn member_update(&self, endpoints: &[String], id: u64, peer_urls: &[String]) -> AdminFuture<'_, ()> {
        let endpoints = endpoints.to_vec();
        let peer_urls = peer_urls.to_vec();
        Box::pin(async move {
            self.factory
                .bounded("member update", MEMBER_UPDATE_TIMEOUT, async {
                    let mut client = self.factory.connect(&endpoints).await?;
                    client
                        .member_update(id, peer_urls)
                        .await
                        .map_err(|e| EtcdError::rpc("member update", e))
                })
                .await?;
            Ok(())
        })
    }

    fn read_key(&self, endpoints: &[String], key: &str) -> AdminFuture<'_, ()> {
        let endpoints = endpoints.to_vec();
        let key = key.to_string();
        Box::pin(async move {
            self.factory
                .bounded("read", READ_TIMEOUT, async {
                    let mut client = self.factory.connect_once(&endpoints).await?;
                    client.get(key, None).await.map_err(|e| EtcdError::rpc("read", e))?;
                    Ok(())
                })
                .await
        })
    }

    fn status(&self, endpoint: &str) -> AdminFuture<'_, EndpointStatus> {
        let endpoints = vec![endpoint.to_string()];
        Box::pin(async move {
            let resp = self
                .factory
                .bounded("status", STATUS_TIMEOUT, async {
                    let mut client = self.factory.connect_once(&endpoints).await?;
                    client.status().await.map_err(|e| EtcdError::rpc("status", e))
                })
                .await?;
            Ok(EndpointStatus {
                member_id: resp.header().map(|h| h.member_id()).unwrap_or(0),
                leader: resp.leader(),
            })
        })
    }

    fn defragment(&self, endpoint: &str) -> AdminFuture<'_, ()> {
        let endpoints = vec![endpoint.to_string()];
        Box::pin(async move {
            self.factory
                .bounded("defragment", DEFRAGMENT_TIMEOUT, async {
                    let mut client = self.factory.connect(&endpoints).await?;
                    client.defragment().await.map_err(|e| EtcdError::rpc("defragment", e))
                })
                .await?;
            Ok(())
        })
    }

    fn snapshot(&self, endpoint: &str, dest: &Path) -> AdminFuture<'_, u64> {
        let endpoints = vec![endpoint.to_string()];
        let dest: PathBuf = dest.to_path_buf();
        Box::pin(async move {
            self.factory
                .bounded("snapshot", SNAPSHOT_TIMEOUT, async {
                    let mut client = self.factory.connect(&endpoints).await?;
                    let mut stream = client.snapshot().await.map_err(|e| EtcdError::rpc("snapshot", e))?;
                    let mut file = tokio::fs::File::create(&dest).await?;
                    let mut written = 0u64;
                    while let Some(chunk) = stream.message().await.map_err(|e| EtcdError::rpc("snapshot", e))? {
                        file.write_all(chunk.blob()).await?;
                        written += chunk.blob().len() as u64;
                    }
                    file.flush().await?;
                    file.sync_all().await?;
                    Ok(written)
                })
                .await
        })
    }

    fn put(&self, endpoints: &[String], key: &str, value: &str) -> AdminFuture<'_, ()> {
        let endpoints = endpoints.to_vec();
        let key = key.to_string();
        let value = value.to_string();
        Box::pin(async move {
            self.factory
                .bounded("put", PUT_TIMEOUT, async {
                    let mut client = self.factory.connect(&endpoints).await?;
                    client.put(key, value, None).await.map_err(|e| EtcdError::rpc("put", e))
                })
                .await?;
            Ok(())
        })
    }
}
