//! Test support: a scriptable mock connector/channel pair and an in-memory
//! cluster store with call counters.
//!
//! The mocks implement the same traits the russh-backed implementations do,
//! so the whole connection lifecycle can be exercised in-process, without a
//! network or an SSH server. Used by the crate's own tests; exported because
//! downstream services reuse them to test their route layers.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;

use crate::config::{ClusterConfig, SshTarget};
use crate::error::{ExecError, SshError, StoreError};
use crate::exec::ExecOutput;
use crate::ssh::{CommandChannel, Connector};
use crate::store::{ClusterStore, ConnectionRecord};

fn ok_output() -> ExecOutput {
    ExecOutput {
        exit_code: 0,
        stdout: String::new(),
        stderr: String::new(),
    }
}

// ---------------------------------------------------------------- channel

struct MockChannelState {
    closed_tx: watch::Sender<bool>,
    closed_rx: watch::Receiver<bool>,
    exec_count: AtomicUsize,
    responses: Mutex<Vec<(String, ExecOutput)>>,
    hang_until_closed: AtomicBool,
}

/// Scriptable in-process channel.
///
/// Commands resolve against prefix-matched canned responses (default: exit 0,
/// empty output). Cloning shares state, so a test can keep a handle to a
/// channel the manager owns and simulate a remote close on it.
#[derive(Clone)]
pub struct MockChannel {
    state: Arc<MockChannelState>,
}

impl MockChannel {
    pub fn new() -> Self {
        let (closed_tx, closed_rx) = watch::channel(false);
        Self {
            state: Arc::new(MockChannelState {
                closed_tx,
                closed_rx,
                exec_count: AtomicUsize::new(0),
                responses: Mutex::new(Vec::new()),
                hang_until_closed: AtomicBool::new(false),
            }),
        }
    }

    /// Respond with `output` to any command starting with `prefix`.
    pub fn respond_to(&self, prefix: &str, output: ExecOutput) {
        self.state
            .responses
            .lock()
            .push((prefix.to_string(), output));
    }

    /// How many commands were executed over this channel.
    pub fn exec_count(&self) -> usize {
        self.state.exec_count.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        *self.state.closed_rx.borrow()
    }

    /// Simulate the remote side dropping the transport.
    pub fn simulate_remote_close(&self) {
        let _ = self.state.closed_tx.send(true);
    }

    /// Make every subsequent exec block until the channel closes, for
    /// mid-command teardown tests.
    pub fn hang_until_closed(&self) {
        self.state.hang_until_closed.store(true, Ordering::SeqCst);
    }
}

impl Default for MockChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandChannel for MockChannel {
    fn exec(
        &self,
        command: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<ExecOutput, ExecError>> + Send {
        let state = self.state.clone();
        let command = command.to_string();

        async move {
            if *state.closed_rx.borrow() {
                return Err(ExecError::ChannelClosed);
            }
            state.exec_count.fetch_add(1, Ordering::SeqCst);

            if state.hang_until_closed.load(Ordering::SeqCst) {
                let mut rx = state.closed_rx.clone();
                return match tokio::time::timeout(timeout, rx.wait_for(|closed| *closed)).await {
                    Ok(_) => Err(ExecError::ChannelClosed),
                    Err(_) => Err(ExecError::Timeout(timeout)),
                };
            }

            let output = {
                let responses = state.responses.lock();
                responses
                    .iter()
                    .find(|(prefix, _)| command.starts_with(prefix.as_str()))
                    .map(|(_, output)| output.clone())
                    .unwrap_or_else(ok_output)
            };
            Ok(output)
        }
    }

    fn closed(&self) -> watch::Receiver<bool> {
        self.state.closed_rx.clone()
    }

    fn close(&self) -> impl Future<Output = ()> + Send {
        let state = self.state.clone();
        async move {
            let _ = state.closed_tx.send(true);
        }
    }
}

// -------------------------------------------------------------- connector

/// How a [`MockConnector`] should fail opens, if at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailMode {
    #[default]
    None,
    Auth,
    Network,
    Timeout,
}

struct MockConnectorState {
    open_count: AtomicUsize,
    fail_mode: Mutex<FailMode>,
    open_delay: Mutex<Option<Duration>>,
    script: Mutex<Vec<(String, ExecOutput)>>,
    hang_commands: AtomicBool,
    channels: Mutex<Vec<MockChannel>>,
}

/// Connector that hands out [`MockChannel`]s and counts handshakes.
#[derive(Clone)]
pub struct MockConnector {
    state: Arc<MockConnectorState>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self {
            state: Arc::new(MockConnectorState {
                open_count: AtomicUsize::new(0),
                fail_mode: Mutex::new(FailMode::None),
                open_delay: Mutex::new(None),
                script: Mutex::new(Vec::new()),
                hang_commands: AtomicBool::new(false),
                channels: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Number of authentication handshakes attempted.
    pub fn open_count(&self) -> usize {
        self.state.open_count.load(Ordering::SeqCst)
    }

    pub fn fail_with(&self, mode: FailMode) {
        *self.state.fail_mode.lock() = mode;
    }

    /// Delay every open, to widen the window in which concurrent connect
    /// calls overlap.
    pub fn delay_opens(&self, delay: Duration) {
        *self.state.open_delay.lock() = Some(delay);
    }

    /// Script a canned response onto every channel opened from now on.
    pub fn respond_to(&self, prefix: &str, output: ExecOutput) {
        self.state.script.lock().push((prefix.to_string(), output));
    }

    /// Make commands on newly opened channels hang until channel close.
    pub fn hang_commands(&self) {
        self.state.hang_commands.store(true, Ordering::SeqCst);
    }

    /// Handle to the most recently opened channel.
    pub fn last_channel(&self) -> Option<MockChannel> {
        self.state.channels.lock().last().cloned()
    }
}

impl Default for MockConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl Connector for MockConnector {
    type Channel = MockChannel;

    fn open(
        &self,
        target: &SshTarget,
        _timeout: Duration,
    ) -> impl Future<Output = Result<MockChannel, SshError>> + Send {
        let state = self.state.clone();
        let host = target.host.clone();
        let port = target.port;
        let addr = target.addr();

        async move {
            state.open_count.fetch_add(1, Ordering::SeqCst);

            let delay = *state.open_delay.lock();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }

            let fail_mode = *state.fail_mode.lock();
            match fail_mode {
                FailMode::None => {}
                FailMode::Auth => {
                    return Err(SshError::AuthenticationFailed(
                        "mock: rejected by server".to_string(),
                    ));
                }
                FailMode::Network => {
                    return Err(SshError::ConnectionFailed {
                        host,
                        port,
                        reason: "mock: host unreachable".to_string(),
                    });
                }
                FailMode::Timeout => return Err(SshError::Timeout(addr)),
            }

            let channel = MockChannel::new();
            for (prefix, output) in state.script.lock().iter() {
                channel.respond_to(prefix, output.clone());
            }
            if state.hang_commands.load(Ordering::SeqCst) {
                channel.hang_until_closed();
            }
            state.channels.lock().push(channel.clone());
            Ok(channel)
        }
    }
}

// ------------------------------------------------------------------ store

struct MemoryStoreState {
    clusters: RwLock<HashMap<String, ClusterConfig>>,
    records: RwLock<HashMap<String, ConnectionRecord>>,
    calls: AtomicUsize,
}

/// In-memory [`ClusterStore`] with a total-call counter, used to assert
/// which flows touch persistence and which must not.
#[derive(Clone)]
pub struct MemoryClusterStore {
    state: Arc<MemoryStoreState>,
}

impl MemoryClusterStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(MemoryStoreState {
                clusters: RwLock::new(HashMap::new()),
                records: RwLock::new(HashMap::new()),
                calls: AtomicUsize::new(0),
            }),
        }
    }

    /// Insert a cluster without counting a store call (test setup).
    pub fn seed(&self, config: ClusterConfig) {
        self.state
            .clusters
            .write()
            .insert(config.id.clone(), config);
    }

    /// Insert a connection record without counting a store call (test setup).
    pub fn seed_record(&self, record: ConnectionRecord) {
        self.state
            .records
            .write()
            .insert(record.cluster_id.clone(), record);
    }

    /// Total number of store operations performed through the trait.
    pub fn call_count(&self) -> usize {
        self.state.calls.load(Ordering::SeqCst)
    }

    pub fn record_count(&self) -> usize {
        self.state.records.read().len()
    }

    pub fn has_record(&self, cluster_id: &str) -> bool {
        self.state.records.read().contains_key(cluster_id)
    }

    fn count(&self) {
        self.state.calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl Default for MemoryClusterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ClusterStore for MemoryClusterStore {
    fn get(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<ClusterConfig>, StoreError>> + Send {
        self.count();
        let result = self.state.clusters.read().get(id).cloned();
        async move { Ok(result) }
    }

    fn save(&self, config: &ClusterConfig) -> impl Future<Output = Result<(), StoreError>> + Send {
        self.count();
        self.state
            .clusters
            .write()
            .insert(config.id.clone(), config.clone());
        async move { Ok(()) }
    }

    fn delete(&self, id: &str) -> impl Future<Output = Result<bool, StoreError>> + Send {
        self.count();
        let removed = self.state.clusters.write().remove(id).is_some();
        async move { Ok(removed) }
    }

    fn save_connection_record(
        &self,
        record: &ConnectionRecord,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        self.count();
        self.state
            .records
            .write()
            .insert(record.cluster_id.clone(), record.clone());
        async move { Ok(()) }
    }

    fn remove_connection_record(
        &self,
        cluster_id: &str,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        self.count();
        self.state.records.write().remove(cluster_id);
        async move { Ok(()) }
    }

    fn connection_records(
        &self,
    ) -> impl Future<Output = Result<Vec<ConnectionRecord>, StoreError>> + Send {
        self.count();
        let records: Vec<ConnectionRecord> = self.state.records.read().values().cloned().collect();
        async move { Ok(records) }
    }

    fn touch_last_activity(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        self.count();
        let now = Utc::now();
        if let Some(config) = self.state.clusters.write().get_mut(id) {
            config.last_accessed = now;
        }
        if let Some(record) = self.state.records.write().get_mut(id) {
            record.last_activity = now;
        }
        async move { Ok(()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_channel_default_response_is_success() {
        let channel = MockChannel::new();
        let output = channel.exec("true", Duration::from_secs(1)).await.unwrap();
        assert!(output.success());
        assert_eq!(channel.exec_count(), 1);
    }

    #[tokio::test]
    async fn mock_channel_prefix_matching() {
        let channel = MockChannel::new();
        channel.respond_to(
            "kubectl get",
            ExecOutput {
                exit_code: 0,
                stdout: "{}".to_string(),
                stderr: String::new(),
            },
        );

        let output = channel
            .exec("kubectl get pods -o json", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(output.stdout, "{}");
    }

    #[tokio::test]
    async fn mock_channel_rejects_exec_after_close() {
        let channel = MockChannel::new();
        channel.close().await;
        let err = channel.exec("true", Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, ExecError::ChannelClosed));
        assert_eq!(channel.exec_count(), 0);
    }

    #[tokio::test]
    async fn mock_connector_counts_opens_and_records_channels() {
        let connector = MockConnector::new();
        let target = SshTarget {
            host: "10.0.0.5".to_string(),
            username: "ubuntu".to_string(),
            port: 22,
            private_key: secrecy::SecretString::from("Zm9v"),
        };

        let channel = connector.open(&target, Duration::from_secs(1)).await.unwrap();
        assert_eq!(connector.open_count(), 1);
        assert!(connector.last_channel().is_some());
        channel.close().await;
        assert!(connector.last_channel().unwrap().is_closed());
    }

    #[tokio::test]
    async fn memory_store_counts_every_call() {
        let store = MemoryClusterStore::new();
        assert_eq!(store.call_count(), 0);
        let _ = store.get("missing").await.unwrap();
        let _ = store.connection_records().await.unwrap();
        assert_eq!(store.call_count(), 2);
    }

    #[tokio::test]
    async fn memory_store_record_lifecycle() {
        let store = MemoryClusterStore::new();
        let record = ConnectionRecord {
            cluster_id: "prod-east".to_string(),
            connected_at: Utc::now(),
            last_activity: Utc::now(),
        };
        store.save_connection_record(&record).await.unwrap();
        assert!(store.has_record("prod-east"));
        store.remove_connection_record("prod-east").await.unwrap();
        assert!(!store.has_record("prod-east"));
    }
}
