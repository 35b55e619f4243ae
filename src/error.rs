use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Settings-file errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read settings file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Failed to write settings file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// SSH connection errors surfaced by the connector
#[derive(Error, Debug)]
pub enum SshError {
    #[error("Connection failed to {host}:{port}: {reason}")]
    ConnectionFailed {
        host: String,
        port: u16,
        reason: String,
    },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Invalid private key material: {0}")]
    KeyMaterial(String),

    #[error("Timeout connecting to {0}")]
    Timeout(String),

    #[error("Channel error: {0}")]
    Channel(String),

    #[error("russh error: {0}")]
    Russh(String),
}

impl From<russh::Error> for SshError {
    fn from(err: russh::Error) -> Self {
        SshError::Russh(err.to_string())
    }
}

/// Remote command execution errors.
///
/// A non-zero exit code is NOT an error for plain execution; it is an
/// inspectable part of [`crate::exec::ExecOutput`]. `NonZeroExit` is raised
/// only by the structured variant, which needs parseable stdout.
#[derive(Error, Debug)]
pub enum ExecError {
    #[error("Failed to start remote command: {0}")]
    ExecRequest(String),

    #[error("Channel closed before the command completed")]
    ChannelClosed,

    #[error("Command timed out after {0:?}")]
    Timeout(Duration),

    #[error("Command exited with status {exit_code}: {stderr}")]
    NonZeroExit { exit_code: i32, stderr: String },
}

/// Remote configuration provisioning errors
#[derive(Error, Debug)]
pub enum ProvisionError {
    /// The blob failed the local pre-flight check; nothing was sent over
    /// the channel.
    #[error("Remote config validation failed: {0}")]
    Validation(String),

    #[error("Provisioning script failed with exit code {exit_code}: {stderr}")]
    Script { exit_code: i32, stderr: String },

    #[error("Provisioning command failed: {0}")]
    Exec(#[from] ExecError),
}

/// Cluster store errors (the store itself is an external collaborator)
#[derive(Error, Debug)]
#[error("Store error: {0}")]
pub struct StoreError(pub String);

/// Errors surfaced by the connection lifecycle manager
#[derive(Error, Debug)]
pub enum ManagerError {
    #[error("Cluster not found: {0}")]
    NotFound(String),

    #[error("No active connection for cluster: {0}")]
    NotConnected(String),

    #[error(transparent)]
    Ssh(#[from] SshError),

    #[error(transparent)]
    Provision(#[from] ProvisionError),

    #[error(transparent)]
    Exec(#[from] ExecError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
