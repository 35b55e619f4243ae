//! Connection lifecycle manager.
//!
//! Owns the in-memory registry of active channels, one per cluster. The
//! registry is the only shared mutable state in the crate and nothing outside
//! this module mutates it: entries are created by [`ConnectionManager::connect`]
//! and destroyed either by [`ConnectionManager::disconnect`] or by the
//! eviction task watching each channel's closed signal.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::config::{ClusterConfig, Settings};
use crate::error::{ManagerError, ProvisionError};
use crate::exec::{self, ExecOutput, Structured};
use crate::provision::Provisioner;
use crate::ssh::{CommandChannel, Connector, SshConnector};
use crate::store::{ClusterStore, ConnectionRecord};

/// Result of a successful connect, as returned to the route layer.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectStatus {
    pub cluster_id: String,
    pub status: String,
    pub connected_at: DateTime<Utc>,
}

/// Result of a test-before-save flow. Never an `Err`; failures come back
/// as `success: false` with the cause in `message`.
#[derive(Debug, Clone, Serialize)]
pub struct TestOutcome {
    pub success: bool,
    pub message: String,
}

/// In-memory record pairing a cluster with its open channel.
struct ActiveConnection<C> {
    cluster_id: String,
    channel: C,
    /// Snapshot of the config at connect time; later store edits do not
    /// retroactively apply to a live channel.
    config: ClusterConfig,
    connected_at: DateTime<Utc>,
}

impl<C> ActiveConnection<C> {
    fn status(&self) -> ConnectStatus {
        ConnectStatus {
            cluster_id: self.cluster_id.clone(),
            status: "connected".to_string(),
            connected_at: self.connected_at,
        }
    }
}

type Registry<C> = Arc<Mutex<HashMap<String, Arc<ActiveConnection<C>>>>>;

/// The connection lifecycle manager. Generic over the store and the
/// connector so the whole lifecycle is testable without a network.
pub struct ConnectionManager<S: ClusterStore, C: Connector> {
    store: Arc<S>,
    connector: C,
    settings: Settings,
    registry: Registry<C::Channel>,
    /// Per-cluster connect locks: concurrent `connect(id)` calls collapse
    /// onto one in-flight attempt instead of opening duplicate channels.
    connect_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

/// The production wiring: russh-backed connector.
pub type SshConnectionManager<S> = ConnectionManager<S, SshConnector>;

impl<S: ClusterStore, C: Connector> ConnectionManager<S, C> {
    pub fn new(store: Arc<S>, connector: C, settings: Settings) -> Self {
        Self {
            store,
            connector,
            settings,
            registry: Arc::new(Mutex::new(HashMap::new())),
            connect_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Connect to a registered cluster, or reuse the existing channel.
    ///
    /// State machine per cluster: Disconnected → Connecting → Connected.
    /// Any failure during Connecting leaves the cluster fully Disconnected:
    /// no registry entry, no connection record.
    pub async fn connect(&self, id: &str) -> Result<ConnectStatus, ManagerError> {
        if let Some(existing) = self.lookup(id).await {
            tracing::debug!("cluster '{}' already connected; reusing channel", id);
            return Ok(existing.status());
        }

        let lock = self.connect_lock(id).await;
        let _guard = lock.lock().await;

        // A collapsed duplicate: the in-flight attempt we waited on finished.
        if let Some(existing) = self.lookup(id).await {
            return Ok(existing.status());
        }

        let config = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| ManagerError::NotFound(id.to_string()))?;

        tracing::info!("connecting to cluster '{}' via {}", id, config.ssh.addr());

        // Path validation is local; do it before paying for a handshake.
        let provisioner = Provisioner::new(
            &self.settings.remote_config_path,
            self.settings.command_timeout(),
        )?;

        let channel = self
            .connector
            .open(&config.ssh, self.settings.connect_timeout())
            .await?;

        if let Err(e) = provisioner.provision(&channel, &config.remote_config).await {
            channel.close().await;
            return Err(e.into());
        }

        let connected_at = Utc::now();
        let record = ConnectionRecord {
            cluster_id: id.to_string(),
            connected_at,
            last_activity: connected_at,
        };

        let bookkeeping = async {
            self.store.touch_last_activity(id).await?;
            self.store.save_connection_record(&record).await
        };
        if let Err(e) = bookkeeping.await {
            channel.close().await;
            return Err(e.into());
        }

        let conn = Arc::new(ActiveConnection {
            cluster_id: id.to_string(),
            channel,
            config,
            connected_at,
        });

        self.registry
            .lock()
            .await
            .insert(id.to_string(), conn.clone());
        self.spawn_eviction(conn.clone());

        tracing::info!("cluster '{}' connected", id);
        Ok(conn.status())
    }

    /// Close a cluster's channel and evict it. Best-effort: an unknown id is
    /// a no-op and cleanup failures are logged, never surfaced.
    pub async fn disconnect(&self, id: &str) {
        let conn = self.registry.lock().await.remove(id);
        let Some(conn) = conn else {
            tracing::debug!("disconnect for unknown cluster '{}' ignored", id);
            return;
        };

        conn.channel.close().await;
        if let Err(e) = self.store.remove_connection_record(id).await {
            tracing::warn!("failed to remove connection record for '{}': {}", id, e);
        }
        tracing::info!("cluster '{}' disconnected", id);
    }

    /// Run a command, returning the full captured result. A non-zero exit
    /// code is part of the result, not an error.
    pub async fn run_shell(&self, id: &str, command: &str) -> Result<ExecOutput, ManagerError> {
        let conn = self
            .lookup(id)
            .await
            .ok_or_else(|| ManagerError::NotConnected(id.to_string()))?;

        let output = exec::run(&conn.channel, command, self.settings.command_timeout()).await?;
        self.touch_activity(id).await;
        Ok(output)
    }

    /// Run a retrieval command and parse its stdout as JSON (falling back to
    /// raw text). Non-zero exit is an error here.
    pub async fn run_structured(&self, id: &str, command: &str) -> Result<Structured, ManagerError> {
        let conn = self
            .lookup(id)
            .await
            .ok_or_else(|| ManagerError::NotConnected(id.to_string()))?;

        let value =
            exec::run_structured(&conn.channel, command, self.settings.command_timeout()).await?;
        self.touch_activity(id).await;
        Ok(value)
    }

    /// Validate a candidate configuration end to end without persisting
    /// anything: shorter connect timeout, provisioning into a scratch path,
    /// read-only verification, channel always closed afterwards. The store
    /// is never touched.
    pub async fn test_candidate(&self, candidate: &ClusterConfig) -> TestOutcome {
        match self.try_candidate(candidate).await {
            Ok(message) => TestOutcome {
                success: true,
                message,
            },
            Err(e) => {
                tracing::info!("test connection for '{}' failed: {}", candidate.id, e);
                TestOutcome {
                    success: false,
                    message: e.to_string(),
                }
            }
        }
    }

    async fn try_candidate(&self, candidate: &ClusterConfig) -> Result<String, ManagerError> {
        if let Err(e) = candidate.validate() {
            return Err(ProvisionError::Validation(e.to_string()).into());
        }

        // Scratch location is unique per attempt; the real config path on the
        // bastion is never touched by a test.
        let scratch = format!("/tmp/clusterlink-verify-{}", Uuid::new_v4());
        let path = format!("{}/config", scratch);
        let provisioner = Provisioner::new(&path, self.settings.command_timeout())?;

        let channel = self
            .connector
            .open(&candidate.ssh, self.settings.test_timeout())
            .await?;

        let result = async {
            provisioner
                .provision(&channel, &candidate.remote_config)
                .await?;

            let verify = format!("test -s \"{}\"", path);
            let output = exec::run(&channel, &verify, self.settings.command_timeout()).await?;
            if !output.success() {
                return Err(ManagerError::Provision(ProvisionError::Script {
                    exit_code: output.exit_code,
                    stderr: output.stderr,
                }));
            }
            Ok(())
        }
        .await;

        let cleanup = format!("rm -rf \"{}\"", scratch);
        if let Err(e) = exec::run(&channel, &cleanup, self.settings.command_timeout()).await {
            tracing::debug!("scratch cleanup on {} failed: {}", candidate.ssh.addr(), e);
        }
        channel.close().await;

        result.map(|_| format!("connected to {} and verified remote config", candidate.ssh.addr()))
    }

    /// Snapshot of currently connected clusters, for the dashboard listing.
    pub async fn active_clusters(&self) -> Vec<ConnectStatus> {
        let map = self.registry.lock().await;
        let mut list: Vec<ConnectStatus> = map.values().map(|conn| conn.status()).collect();
        list.sort_by(|a, b| a.cluster_id.cmp(&b.cluster_id));
        list
    }

    /// Clear connection records with no live channel behind them.
    ///
    /// Run once at startup: records surviving a restart are orphans, since a
    /// fresh process cannot own any live channel. Returns how many were
    /// cleared.
    pub async fn reconcile_stale_records(&self) -> Result<usize, ManagerError> {
        let records = self.store.connection_records().await?;
        let mut cleared = 0;
        for record in records {
            if self.lookup(&record.cluster_id).await.is_some() {
                continue;
            }
            match self.store.remove_connection_record(&record.cluster_id).await {
                Ok(()) => cleared += 1,
                Err(e) => {
                    tracing::warn!("failed to clear stale record '{}': {}", record.cluster_id, e);
                }
            }
        }
        if cleared > 0 {
            tracing::info!("cleared {} stale connection record(s)", cleared);
        }
        Ok(cleared)
    }

    async fn lookup(&self, id: &str) -> Option<Arc<ActiveConnection<C::Channel>>> {
        self.registry.lock().await.get(id).cloned()
    }

    async fn connect_lock(&self, id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.connect_locks.lock().await;
        locks
            .entry(id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn touch_activity(&self, id: &str) {
        if let Err(e) = self.store.touch_last_activity(id).await {
            tracing::debug!("failed to touch last activity for '{}': {}", id, e);
        }
    }

    /// Watch the channel's closed signal and evict the registry entry when it
    /// fires, whether the close was caller-initiated or a network drop.
    /// Pointer identity guards against evicting a successor connection that
    /// reused the same cluster id.
    fn spawn_eviction(&self, conn: Arc<ActiveConnection<C::Channel>>) {
        let registry = self.registry.clone();
        let store = self.store.clone();

        tokio::spawn(async move {
            let mut closed = conn.channel.closed();
            // An error means the sender side is gone; either way the channel
            // is no longer usable.
            let _ = closed.wait_for(|closed| *closed).await;

            let evicted = {
                let mut map = registry.lock().await;
                match map.get(&conn.cluster_id) {
                    Some(existing) if Arc::ptr_eq(existing, &conn) => {
                        map.remove(&conn.cluster_id);
                        true
                    }
                    _ => false,
                }
            };

            if evicted {
                tracing::info!(
                    "channel to {} for cluster '{}' closed; evicted from registry",
                    conn.config.ssh.addr(),
                    conn.cluster_id
                );
                if let Err(e) = store.remove_connection_record(&conn.cluster_id).await {
                    tracing::warn!(
                        "failed to remove connection record for '{}': {}",
                        conn.cluster_id,
                        e
                    );
                }
            }
        });
    }
}
