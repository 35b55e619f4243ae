use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use russh::client::Handle;
use russh::{Channel, ChannelMsg, Disconnect};
use tokio::sync::{Mutex, watch};
use tokio::time::timeout;

use crate::error::ExecError;
use crate::exec::ExecOutput;
use crate::security_log;

use super::CommandChannel;
use super::handler::ClientHandler;

/// Live channel to a bastion host.
///
/// Holds the authenticated russh handle plus a monitor task that owns a
/// long-lived session channel; when that channel reports EOF or close the
/// transport is gone and the `closed` watch flips, which is what drives
/// registry eviction upstream.
pub struct SshChannel {
    handle: Arc<Mutex<Handle<ClientHandler>>>,
    closed_rx: watch::Receiver<bool>,
    host: Arc<str>,
    port: u16,
    disconnect_logged: AtomicBool,
}

impl std::fmt::Debug for SshChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshChannel")
            .field("host", &self.host)
            .field("port", &self.port)
            .finish()
    }
}

impl SshChannel {
    /// Wrap an authenticated handle and spawn the liveness monitor task.
    pub fn new(
        handle: Handle<ClientHandler>,
        mut monitor: Channel<russh::client::Msg>,
        host: Arc<str>,
        port: u16,
    ) -> Self {
        let (closed_tx, closed_rx) = watch::channel(false);
        let handle = Arc::new(Mutex::new(handle));

        let monitor_host = host.clone();
        tokio::spawn(async move {
            loop {
                match monitor.wait().await {
                    Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) => {
                        tracing::debug!("monitor channel closed for {}:{}", monitor_host, port);
                        break;
                    }
                    None => {
                        tracing::debug!("transport gone for {}:{}", monitor_host, port);
                        break;
                    }
                    Some(_) => {}
                }
            }
            let _ = closed_tx.send(true);
        });

        Self {
            handle,
            closed_rx,
            host,
            port,
            disconnect_logged: AtomicBool::new(false),
        }
    }

    pub fn host(&self) -> &str {
        self.host.as_ref()
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    async fn disconnect(&self, requested: bool) {
        if !self.disconnect_logged.swap(true, Ordering::SeqCst) {
            security_log::log_disconnect(self.host.as_ref(), self.port, requested);
        }
        let handle = self.handle.lock().await;
        if let Err(e) = handle
            .disconnect(Disconnect::ByApplication, "disconnect requested", "en")
            .await
        {
            tracing::debug!("disconnect of {}:{} returned: {}", self.host, self.port, e);
        }
    }
}

impl CommandChannel for SshChannel {
    fn exec(
        &self,
        command: &str,
        timeout_after: Duration,
    ) -> impl Future<Output = Result<ExecOutput, ExecError>> + Send {
        let handle = self.handle.clone();
        let command = command.to_string();

        async move {
            let run = async {
                let guard = handle.lock().await;
                let mut channel = guard
                    .channel_open_session()
                    .await
                    .map_err(|e| ExecError::ExecRequest(format!("failed to open channel: {}", e)))?;
                drop(guard);

                channel
                    .exec(true, command.as_str())
                    .await
                    .map_err(|e| ExecError::ExecRequest(format!("exec request rejected: {}", e)))?;

                let mut stdout = String::new();
                let mut stderr = String::new();
                let mut exit_code: Option<i32> = None;

                loop {
                    match channel.wait().await {
                        Some(ChannelMsg::Data { data }) => {
                            if let Ok(s) = std::str::from_utf8(&data) {
                                stdout.push_str(s);
                            }
                        }
                        Some(ChannelMsg::ExtendedData { data, .. }) => {
                            if let Ok(s) = std::str::from_utf8(&data) {
                                stderr.push_str(s);
                            }
                        }
                        Some(ChannelMsg::ExitStatus { exit_status }) => {
                            exit_code = Some(exit_status as i32);
                        }
                        Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => {
                            break;
                        }
                        Some(_) => {}
                    }
                }

                // No exit status means the transport died under the command.
                match exit_code {
                    Some(exit_code) => Ok(ExecOutput {
                        exit_code,
                        stdout,
                        stderr,
                    }),
                    None => Err(ExecError::ChannelClosed),
                }
            };

            match timeout(timeout_after, run).await {
                Ok(result) => result,
                Err(_) => Err(ExecError::Timeout(timeout_after)),
            }
        }
    }

    fn closed(&self) -> watch::Receiver<bool> {
        self.closed_rx.clone()
    }

    fn close(&self) -> impl Future<Output = ()> + Send {
        async move { self.disconnect(true).await }
    }
}

impl Drop for SshChannel {
    fn drop(&mut self) {
        if *self.closed_rx.borrow() {
            return;
        }
        if !self.disconnect_logged.swap(true, Ordering::SeqCst) {
            security_log::log_disconnect(self.host.as_ref(), self.port, false);
        }
        let handle = self.handle.clone();
        let host = self.host.to_string();
        let port = self.port;
        match tokio::runtime::Handle::try_current() {
            Ok(rt) => {
                rt.spawn(async move {
                    let guard = handle.lock().await;
                    let _ = guard
                        .disconnect(Disconnect::ByApplication, "channel dropped", "en")
                        .await;
                    tracing::debug!("channel cleanup: disconnected {}:{}", host, port);
                });
            }
            Err(_) => {
                tracing::debug!("channel dropped without a Tokio runtime; disconnect skipped");
            }
        }
    }
}
