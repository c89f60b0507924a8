//! The etcd server as an owned child process.

use std::path::Path;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use anyhow::{Context, bail};
use tokio::process::{Child, Command};
use tracing::{info, warn};

use launcher_core::addressing::{CLIENT_PORT, METRICS_PORT, PLAINTEXT_PEER_PORT, TLS_PEER_PORT};
use launcher_core::config::TlsPaths;
use launcher_core::{AddressingMode, ClusterContext, Topology};

/// How long etcd gets to exit after SIGTERM before it is killed.
pub const STOP_GRACE: Duration = Duration::from_secs(30);

/// Command line for the etcd server.
pub fn etcd_args(ctx: &ClusterContext, topology: Topology, tls: &TlsPaths) -> Vec<String> {
    let ip = &ctx.pod_ip;
    let mut args = vec![
        format!("--name={}", ctx.pod_name),
        format!("--data-dir={}", ctx.data_dir.display()),
        format!("--initial-cluster={}", ctx.initial_cluster()),
        format!("--initial-cluster-token={}", ctx.token),
        format!("--initial-cluster-state={}", ctx.bootstrap),
        format!(
            "--advertise-client-urls={},https://{ip}:{CLIENT_PORT}",
            ctx.domain.client_url(&ctx.pod_name)
        ),
        format!("--listen-client-urls=https://{ip}:{CLIENT_PORT},https://127.0.0.1:{CLIENT_PORT}"),
        format!("--listen-metrics-urls=http://{ip}:{METRICS_PORT},http://127.0.0.1:{METRICS_PORT}"),
        "--client-cert-auth".to_string(),
        format!("--trusted-ca-file={}", tls.ca_cert.display()),
        format!("--cert-file={}", tls.server_cert.display()),
        format!("--key-file={}", tls.server_key.display()),
        format!("--peer-cert-file={}", tls.server_cert.display()),
        format!("--peer-key-file={}", tls.server_key.display()),
        format!("--peer-trusted-ca-file={}", tls.ca_cert.display()),
        "--auto-compaction-retention=8".to_string(),
    ];

    let advertise = ctx.local_peer_urls(topology.addressing).join(",");
    match topology.addressing {
        AddressingMode::TlsOnly => {
            args.push(format!("--listen-peer-urls=https://{ip}:{TLS_PEER_PORT}"));
            args.push(format!("--initial-advertise-peer-urls={advertise}"));
            args.push("--peer-client-cert-auth".to_string());
        }
        AddressingMode::PlaintextAndTls => {
            args.push(format!(
                "--listen-peer-urls=http://{ip}:{PLAINTEXT_PEER_PORT},https://{ip}:{TLS_PEER_PORT}"
            ));
            args.push(format!("--initial-advertise-peer-urls={advertise}"));
        }
    }

    if ctx.corruption_check {
        args.push("--experimental-initial-corrupt-check=true".to_string());
        args.push("--experimental-corrupt-check-time=240m".to_string());
    }
    if let Some(quota) = ctx.quota_backend_bytes {
        args.push(format!("--quota-backend-bytes={quota}"));
    }

    args
}

/// A running etcd server. Killed if dropped while still running.
pub struct EtcdProcess {
    child: Child,
}

impl EtcdProcess {
    /// Start `binary` with `args`, inheriting stdio and environment.
    pub fn spawn(binary: &Path, args: &[String]) -> anyhow::Result<Self> {
        if !binary.exists() {
            bail!("etcd executable {} not found", binary.display());
        }

        info!(binary = %binary.display(), args = %args.join(" "), "starting etcd");
        let child = Command::new(binary)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawning {}", binary.display()))?;

        Ok(Self { child })
    }

    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Resolves when etcd exits.
    pub async fn wait(&mut self) -> std::io::Result<ExitStatus> {
        self.child.wait().await
    }

    /// Ask etcd to stop, killing it if it has not exited within `grace`.
    pub async fn terminate(&mut self, grace: Duration) -> std::io::Result<ExitStatus> {
        if let Some(pid) = self.child.id().and_then(|p| i32::try_from(p).ok()) {
            // SAFETY: pid belongs to a child we own and have not reaped yet.
            let rc = unsafe { libc::kill(pid, libc::SIGTERM) };
            if rc != 0 {
                warn!(pid, error = %std::io::Error::last_os_error(), "failed to send SIGTERM to etcd");
            }
        }

        match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(status) => status,
            Err(_) => {
                warn!(grace_secs = grace.as_secs(), "etcd did not stop in time, killing it");
                self.child.kill().await?;
                self.child.wait().await
            }
        }
    }
}
