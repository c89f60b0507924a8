//! etcd-launcher — sidecar that bootstraps and supervises one etcd member.
//!
//! Runs as the entrypoint of every etcd pod of a tenant control plane:
//! - resolves identity, cluster size and peer addressing
//! - seeds a brand-new member from a pending backup
//! - repairs or joins membership of an existing cluster
//! - launches etcd and waits for the cluster to become healthy
//! - reaps dead membership entries while etcd runs
//!
//! It also carries the operator one-shots `is-running`, `snapshot` and
//! `defrag`.
//!
//! # Usage
//!
//! ```text
//! etcd-launcher --cluster abc run --pod-name etcd-0 --pod-ip 10.0.0.1 --token abc
//! etcd-launcher --cluster abc snapshot --file /backup/snapshot.db
//! ```

mod process;
mod run;
mod tools;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::watch;
use tracing::{info, warn};

use launcher_core::LauncherConfig;
use launcher_maintenance::DEFAULT_QUORUM_TIMEOUT;

#[derive(Parser)]
#[command(name = "etcd-launcher", about = "etcd member launcher", version, propagate_version = true)]
struct Cli {
    /// Deployment configuration file (TLS paths, binaries, data root).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Name of the tenant cluster this etcd belongs to.
    #[arg(long, global = true)]
    cluster: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Prepare this member, launch etcd and supervise it.
    Run {
        /// Name of this etcd pod.
        #[arg(long)]
        pod_name: String,

        /// IP address of this etcd pod.
        #[arg(long)]
        pod_ip: String,

        /// Initial cluster token.
        #[arg(long)]
        token: String,

        /// etcdctl API version (2 or 3).
        #[arg(long, default_value = "3")]
        api_version: String,

        /// Enable etcd's experimental corruption check.
        #[arg(long)]
        enable_corruption_check: bool,

        /// Backend quota in bytes.
        #[arg(long)]
        quota_backend_bytes: Option<u64>,
    },
    /// Wait until a write reaches quorum.
    IsRunning {
        #[arg(long, default_value_t = DEFAULT_QUORUM_TIMEOUT.as_secs())]
        timeout_secs: u64,
    },
    /// Save a snapshot from the first endpoint that can produce one.
    Snapshot {
        #[arg(long)]
        file: PathBuf,
    },
    /// Defragment every member, one at a time.
    Defrag,
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,etcd_launcher=debug,launcher=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Flip the shutdown channel on SIGINT or SIGTERM.
fn spawn_signal_handler(shutdown_tx: watch::Sender<bool>) {
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });
}

async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "failed to install SIGTERM handler, listening for SIGINT only");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = terminate.recv() => {}
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let config = match &cli.config {
        Some(path) => LauncherConfig::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => LauncherConfig::default(),
    };

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    spawn_signal_handler(shutdown_tx);

    let tenant = cli.cluster.unwrap_or_default();

    match cli.command {
        Command::Run {
            pod_name,
            pod_ip,
            token,
            api_version,
            enable_corruption_check,
            quota_backend_bytes,
        } => {
            let args = run::RunArgs {
                tenant,
                pod_name,
                pod_ip,
                token,
                api_version,
                corruption_check: enable_corruption_check,
                quota_backend_bytes,
            };
            run::run(&config, args, shutdown_rx).await
        }
        Command::IsRunning { timeout_secs } => {
            let tools = tools::Tools::connect(&config, &tenant, shutdown_rx).await?;
            tools.is_running(Duration::from_secs(timeout_secs)).await
        }
        Command::Snapshot { file } => {
            let tools = tools::Tools::connect(&config, &tenant, shutdown_rx).await?;
            tools.snapshot(&file).await
        }
        Command::Defrag => {
            let tools = tools::Tools::connect(&config, &tenant, shutdown_rx).await?;
            tools.defrag().await
        }
    }
}
