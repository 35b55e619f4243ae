//! SSH layer: the secure-channel primitive behind trait seams.
//!
//! The manager is generic over [`Connector`] and [`CommandChannel`] so the
//! connection lifecycle can be exercised without a network (see
//! [`crate::testing`]). The production implementation is russh-backed:
//! [`connector::SshConnector`] opens and authenticates, [`channel::SshChannel`]
//! executes commands and reports transport loss.

pub mod channel;
pub mod connector;
pub mod handler;

pub use channel::SshChannel;
pub use connector::SshConnector;

use std::future::Future;
use std::time::Duration;

use tokio::sync::watch;

use crate::config::SshTarget;
use crate::error::{ExecError, SshError};
use crate::exec::ExecOutput;

/// An authenticated, bidirectional command-execution session on a bastion.
pub trait CommandChannel: Send + Sync + 'static {
    /// Run one command, streaming stdout/stderr until the exec sub-channel
    /// closes. The channel refusing to start the process is
    /// [`ExecError::ExecRequest`]; the transport going away mid-command is
    /// [`ExecError::ChannelClosed`].
    fn exec(
        &self,
        command: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<ExecOutput, ExecError>> + Send;

    /// Receiver that flips to `true` once the underlying transport is gone,
    /// whether by remote close, network drop, or a local [`close`](Self::close).
    fn closed(&self) -> watch::Receiver<bool>;

    /// Tear the connection down. Best-effort: closing an already-dead
    /// channel is not an error.
    fn close(&self) -> impl Future<Output = ()> + Send;
}

/// Opens authenticated channels to bastion hosts.
pub trait Connector: Send + Sync + 'static {
    type Channel: CommandChannel;

    /// Open and authenticate a channel. `timeout` bounds the whole connect
    /// phase; on expiry the partial transport is dropped.
    fn open(
        &self,
        target: &SshTarget,
        timeout: Duration,
    ) -> impl Future<Output = Result<Self::Channel, SshError>> + Send;
}
