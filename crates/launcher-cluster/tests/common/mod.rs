//! In-memory fakes shared by the membership integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use launcher_core::addressing::{LOCAL_ENDPOINT, pod_name};
use launcher_core::{
    AddressingMode, BootstrapKind, ClusterContext, InitialMember, MemberRecord, RestorePhase, RestoreRequest,
    ServiceDomain, Topology,
};
use launcher_etcd::{AdminApi, AdminFuture, EndpointStatus, EtcdError};
use launcher_maintenance::{RestoreFuture, RestorePlan, SnapshotRestorer};
use launcher_platform::{
    BlobFuture, BlobSource, BlobStore, ControlObject, Platform, PlatformError, PlatformFuture, PodInfo,
};

pub const NAMESPACE: &str = "cluster-abc";
pub const TENANT: &str = "abc";

pub fn domain() -> ServiceDomain {
    ServiceDomain::new(NAMESPACE)
}

pub fn host(pod: &str) -> String {
    domain().host(pod)
}

pub fn member(id: u64, pod: &str, mode: AddressingMode) -> MemberRecord {
    MemberRecord {
        id,
        name: pod.to_string(),
        peer_urls: domain().peer_urls(pod, mode),
        client_urls: vec![domain().client_url(pod)],
    }
}

/// Context of `pod` in an `n`-member cluster with data under `data_root`.
pub fn context(pod: &str, n: usize, bootstrap: BootstrapKind, mode: AddressingMode, data_root: &Path) -> ClusterContext {
    let domain = domain();
    let initial_members = (0..n)
        .map(|i| {
            let name = pod_name(i);
            InitialMember {
                peer_urls: domain.peer_urls(&name, mode),
                name,
                guessed: false,
            }
        })
        .collect();
    ClusterContext {
        tenant: TENANT.into(),
        domain,
        pod_name: pod.into(),
        pod_ip: "10.0.0.1".into(),
        data_dir: data_root.join(format!("pod_{pod}")),
        token: TENANT.into(),
        corruption_check: false,
        quota_backend_bytes: None,
        bootstrap,
        initial_members,
        topology: Topology::new(n, mode),
    }
}

// ── Admin API ──────────────────────────────────────────────────────

/// A membership-changing call observed by [`FakeEtcd`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Add(Vec<String>),
    Remove(u64),
    Update(u64, Vec<String>),
}

/// Single in-memory cluster answering every admin call.
pub struct FakeEtcd {
    members: Mutex<Vec<MemberRecord>>,
    next_id: Mutex<u64>,
    calls: Mutex<Vec<Call>>,
    list_calls: Mutex<u32>,
    list_fails: Mutex<bool>,
    /// Client URLs that answer reads.
    live: Mutex<HashSet<String>>,
    /// Status reported by the local endpoint; `None` fails the call.
    local_status: Mutex<Option<EndpointStatus>>,
}

impl FakeEtcd {
    pub fn new(members: Vec<MemberRecord>) -> Self {
        let next_id = members.iter().map(|m| m.id).max().unwrap_or(0) + 100;
        Self {
            members: Mutex::new(members),
            next_id: Mutex::new(next_id),
            calls: Mutex::default(),
            list_calls: Mutex::default(),
            list_fails: Mutex::default(),
            live: Mutex::default(),
            local_status: Mutex::default(),
        }
    }

    pub fn members(&self) -> Vec<MemberRecord> {
        self.members.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn removes(&self) -> Vec<u64> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Remove(id) => Some(id),
                _ => None,
            })
            .collect()
    }

    pub fn list_calls(&self) -> u32 {
        *self.list_calls.lock().unwrap()
    }

    pub fn fail_listing(&self) {
        *self.list_fails.lock().unwrap() = true;
    }

    /// Member `id` starts advertising `urls`.
    pub fn set_client_urls(&self, id: u64, urls: &[String]) {
        if let Some(m) = self.members.lock().unwrap().iter_mut().find(|m| m.id == id) {
            m.client_urls = urls.to_vec();
        }
    }

    pub fn set_live(&self, url: &str) {
        self.live.lock().unwrap().insert(url.to_string());
    }

    /// The local member leads with id `id`.
    pub fn lead_as(&self, id: u64) {
        *self.local_status.lock().unwrap() = Some(EndpointStatus { member_id: id, leader: id });
    }

    /// The local member `id` follows `leader`.
    pub fn follow(&self, id: u64, leader: u64) {
        *self.local_status.lock().unwrap() = Some(EndpointStatus { member_id: id, leader });
    }
}

fn refused(endpoints: &str) -> EtcdError {
    EtcdError::Connect {
        endpoints: endpoints.to_string(),
        reason: "connection refused".into(),
    }
}

impl AdminApi for FakeEtcd {
    fn member_list(&self, endpoints: &[String]) -> AdminFuture<'_, Vec<MemberRecord>> {
        *self.list_calls.lock().unwrap() += 1;
        let result = if *self.list_fails.lock().unwrap() {
            Err(refused(&endpoints.join(",")))
        } else {
            Ok(self.members())
        };
        Box::pin(async move { result })
    }

    fn member_add(&self, _: &[String], peer_urls: &[String]) -> AdminFuture<'_, MemberRecord> {
        let mut next = self.next_id.lock().unwrap();
        let record = MemberRecord {
            id: *next,
            name: String::new(),
            peer_urls: peer_urls.to_vec(),
            client_urls: vec![],
        };
        *next += 1;
        self.members.lock().unwrap().push(record.clone());
        self.calls.lock().unwrap().push(Call::Add(peer_urls.to_vec()));
        Box::pin(async move { Ok(record) })
    }

    fn member_remove(&self, _: &[String], id: u64) -> AdminFuture<'_, ()> {
        self.members.lock().unwrap().retain(|m| m.id != id);
        self.calls.lock().unwrap().push(Call::Remove(id));
        Box::pin(async { Ok(()) })
    }

    fn member_update(&self, _: &[String], id: u64, peer_urls: &[String]) -> AdminFuture<'_, ()> {
        if let Some(m) = self.members.lock().unwrap().iter_mut().find(|m| m.id == id) {
            m.peer_urls = peer_urls.to_vec();
        }
        self.calls.lock().unwrap().push(Call::Update(id, peer_urls.to_vec()));
        Box::pin(async { Ok(()) })
    }

    fn read_key(&self, endpoints: &[String], _: &str) -> AdminFuture<'_, ()> {
        let live = self.live.lock().unwrap();
        let result = if endpoints.iter().any(|e| live.contains(e)) {
            Ok(())
        } else {
            Err(EtcdError::Timeout {
                op: "get",
                timeout: Duration::from_secs(5),
            })
        };
        Box::pin(async move { result })
    }

    fn status(&self, endpoint: &str) -> AdminFuture<'_, EndpointStatus> {
        let result = match *self.local_status.lock().unwrap() {
            Some(status) if endpoint == LOCAL_ENDPOINT => Ok(status),
            _ => Err(refused(endpoint)),
        };
        Box::pin(async move { result })
    }

    fn defragment(&self, endpoint: &str) -> AdminFuture<'_, ()> {
        let err = refused(endpoint);
        Box::pin(async move { Err(err) })
    }

    fn snapshot(&self, endpoint: &str, _: &Path) -> AdminFuture<'_, u64> {
        let err = refused(endpoint);
        Box::pin(async move { Err(err) })
    }

    fn put(&self, _: &[String], _: &str, _: &str) -> AdminFuture<'_, ()> {
        Box::pin(async { Ok(()) })
    }
}

// ── Platform ───────────────────────────────────────────────────────

pub struct FakePlatform {
    pub control: Mutex<ControlObject>,
    pub replicas: Mutex<Option<u32>>,
    pub replicas_fail: Mutex<bool>,
    pub pods: Mutex<HashMap<String, PodInfo>>,
    pub restores: Mutex<Vec<RestoreRequest>>,
    pub secrets: Mutex<HashMap<String, HashMap<String, String>>>,
}

impl FakePlatform {
    pub fn new(etcd_initialized: bool, replicas: u32) -> Self {
        Self {
            control: Mutex::new(ControlObject {
                namespace: NAMESPACE.into(),
                etcd_initialized,
            }),
            replicas: Mutex::new(Some(replicas)),
            replicas_fail: Mutex::default(),
            pods: Mutex::default(),
            restores: Mutex::default(),
            secrets: Mutex::default(),
        }
    }

    pub fn set_replicas(&self, n: u32) {
        *self.replicas.lock().unwrap() = Some(n);
    }

    pub fn add_pod(&self, name: &str, info: PodInfo) {
        self.pods.lock().unwrap().insert(name.to_string(), info);
    }

    pub fn add_restore(&self, name: &str, backup: &str, phase: RestorePhase) {
        self.restores.lock().unwrap().push(RestoreRequest {
            name: name.into(),
            backup_name: backup.into(),
            phase,
            tenant: TENANT.into(),
            credentials_secret: Some("s3-credentials".into()),
        });
    }

    pub fn add_secret(&self, name: &str, data: &[(&str, &str)]) {
        let data = data.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        self.secrets.lock().unwrap().insert(name.to_string(), data);
    }
}

impl Platform for FakePlatform {
    fn control_object(&self, _: &str) -> PlatformFuture<'_, ControlObject> {
        let control = self.control.lock().unwrap().clone();
        Box::pin(async move { Ok(control) })
    }

    fn replica_count(&self, _: &str) -> PlatformFuture<'_, Option<u32>> {
        let result = if *self.replicas_fail.lock().unwrap() {
            Err(PlatformError::Api {
                kind: "statefulset",
                name: "etcd".into(),
                status: 503,
                message: "unavailable".into(),
            })
        } else {
            Ok(*self.replicas.lock().unwrap())
        };
        Box::pin(async move { result })
    }

    fn pod(&self, _: &str, name: &str) -> PlatformFuture<'_, PodInfo> {
        let result = self.pods.lock().unwrap().get(name).copied().ok_or(PlatformError::NotFound {
            kind: "pod",
            name: name.to_string(),
        });
        Box::pin(async move { result })
    }

    fn restore_requests(&self, _: &str) -> PlatformFuture<'_, Vec<RestoreRequest>> {
        let restores = self.restores.lock().unwrap().clone();
        Box::pin(async move { Ok(restores) })
    }

    fn secret(&self, _: &str, name: &str) -> PlatformFuture<'_, HashMap<String, String>> {
        let result = self.secrets.lock().unwrap().get(name).cloned().ok_or(PlatformError::NotFound {
            kind: "secret",
            name: name.to_string(),
        });
        Box::pin(async move { result })
    }
}

// ── Blob store and restorer ────────────────────────────────────────

#[derive(Default)]
pub struct FakeBlobs {
    pub fetched: Mutex<Vec<(BlobSource, PathBuf)>>,
}

impl FakeBlobs {
    pub fn fetch_count(&self) -> usize {
        self.fetched.lock().unwrap().len()
    }
}

impl BlobStore for FakeBlobs {
    fn fetch_object(&self, source: &BlobSource, dest: &Path) -> BlobFuture<'_, u64> {
        self.fetched.lock().unwrap().push((source.clone(), dest.to_path_buf()));
        let dest = dest.to_path_buf();
        Box::pin(async move {
            tokio::fs::write(&dest, b"snapshot").await?;
            Ok(8)
        })
    }
}

#[derive(Default)]
pub struct FakeRestorer {
    pub plans: Mutex<Vec<RestorePlan>>,
    /// Whether the snapshot file was on disk when each restore ran.
    pub snapshot_present: Mutex<Vec<bool>>,
}

impl SnapshotRestorer for FakeRestorer {
    fn restore(&self, plan: &RestorePlan) -> RestoreFuture<'_> {
        self.plans.lock().unwrap().push(plan.clone());
        self.snapshot_present.lock().unwrap().push(plan.snapshot.exists());
        let member_dir = plan.data_dir.join("member");
        Box::pin(async move {
            tokio::fs::create_dir_all(member_dir).await?;
            Ok(())
        })
    }
}
