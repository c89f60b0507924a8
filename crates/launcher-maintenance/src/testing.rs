//! In-memory admin API for maintenance tests.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;

use launcher_core::MemberRecord;
use launcher_etcd::{AdminApi, AdminFuture, EndpointStatus, EtcdError};

#[derive(Default)]
pub struct FakeAdmin {
    /// Endpoint → snapshot bytes; `None` fails after a partial write.
    snapshots: HashMap<String, Option<Vec<u8>>>,
    defrag_failures: HashSet<String>,
    put_failures: Mutex<u32>,
    snapshot_calls: Mutex<Vec<String>>,
    defrag_calls: Mutex<Vec<String>>,
    put_calls: Mutex<u32>,
}

impl FakeAdmin {
    pub fn with_snapshot_data(mut self, endpoint: &str, data: &[u8]) -> Self {
        self.snapshots.insert(endpoint.to_string(), Some(data.to_vec()));
        self
    }

    pub fn failing_snapshot(mut self, endpoint: &str) -> Self {
        self.snapshots.insert(endpoint.to_string(), None);
        self
    }

    pub fn failing_defrag(mut self, endpoint: &str) -> Self {
        self.defrag_failures.insert(endpoint.to_string());
        self
    }

    pub fn failing_puts(self, n: u32) -> Self {
        *self.put_failures.lock().unwrap() = n;
        self
    }

    pub fn snapshot_calls(&self) -> Vec<String> {
        self.snapshot_calls.lock().unwrap().clone()
    }

    pub fn defrag_calls(&self) -> Vec<String> {
        self.defrag_calls.lock().unwrap().clone()
    }

    pub fn put_calls(&self) -> u32 {
        *self.put_calls.lock().unwrap()
    }
}

fn refused(endpoint: &str) -> EtcdError {
    EtcdError::Connect {
        endpoints: endpoint.to_string(),
        reason: "connection refused".into(),
    }
}

fn unused<T: Send + 'static>() -> AdminFuture<'static, T> {
    Box::pin(async { Err(EtcdError::Tls("unused in maintenance tests".into())) })
}

impl AdminApi for FakeAdmin {
    fn member_list(&self, _: &[String]) -> AdminFuture<'_, Vec<MemberRecord>> {
        unused()
    }

    fn member_add(&self, _: &[String], _: &[String]) -> AdminFuture<'_, MemberRecord> {
        unused()
    }

    fn member_remove(&self, _: &[String], _: u64) -> AdminFuture<'_, ()> {
        unused()
    }

    fn member_update(&self, _: &[String], _: u64, _: &[String]) -> AdminFuture<'_, ()> {
        unused()
    }

    fn read_key(&self, _: &[String], _: &str) -> AdminFuture<'_, ()> {
        Box::pin(async { Ok(()) })
    }

    fn status(&self, _: &str) -> AdminFuture<'_, EndpointStatus> {
        unused()
    }

    fn defragment(&self, endpoint: &str) -> AdminFuture<'_, ()> {
        self.defrag_calls.lock().unwrap().push(endpoint.to_string());
        let fail = self.defrag_failures.contains(endpoint);
        let err = refused(endpoint);
        Box::pin(async move { if fail { Err(err) } else { Ok(()) } })
    }

    fn snapshot(&self, endpoint: &str, dest: &Path) -> AdminFuture<'_, u64> {
        self.snapshot_calls.lock().unwrap().push(endpoint.to_string());
        let outcome = self.snapshots.get(endpoint).cloned().flatten();
        let err = refused(endpoint);
        let dest = dest.to_path_buf();
        Box::pin(async move {
            match outcome {
                Some(data) => {
                    tokio::fs::write(&dest, &data).await?;
                    Ok(data.len() as u64)
                }
                None => {
                    tokio::fs::write(&dest, b"partial").await?;
                    Err(err)
                }
            }
        })
    }

    fn put(&self, _: &[String], _: &str, _: &str) -> AdminFuture<'_, ()> {
        *self.put_calls.lock().unwrap() += 1;
        let mut remaining = self.put_failures.lock().unwrap();
        let fail = *remaining > 0;
        if fail {
            *remaining -= 1;
        }
        Box::pin(async move {
            if fail {
                Err(EtcdError::Timeout {
                    op: "put",
                    timeout: std::time::Duration::from_secs(5),
                })
            } else {
                Ok(())
            }
        })
    }
}
