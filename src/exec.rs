//! Command execution over an established channel.
//!
//! [`run`] returns the full captured result; a non-zero exit code is part of
//! that result, not an error. [`run_structured`] is the retrieval variant the
//! dashboard uses for `-o json` commands: it treats non-zero exit as an error
//! and parses stdout as JSON, falling back to the trimmed raw text.

use std::time::Duration;

use serde::Serialize;

use crate::error::ExecError;
use crate::ssh::CommandChannel;

/// Result of executing a command, including output and exit code
#[derive(Debug, Clone, Serialize)]
pub struct ExecOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Parsed result of a structured command.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Structured {
    Json(serde_json::Value),
    Raw { raw: String },
}

/// Run one command over the channel and capture its result.
pub async fn run<C: CommandChannel>(
    channel: &C,
    command: &str,
    timeout: Duration,
) -> Result<ExecOutput, ExecError> {
    tracing::debug!("executing remote command ({} bytes)", command.len());

    let output = channel.exec(command, timeout).await?;

    if !output.success() {
        tracing::debug!("remote command exited with status {}", output.exit_code);
    }

    Ok(output)
}

/// Run one command and parse its stdout as JSON.
///
/// Unparseable stdout is returned as `Structured::Raw` with trimmed text; a
/// non-zero exit code is an error because the caller asked for data.
pub async fn run_structured<C: CommandChannel>(
    channel: &C,
    command: &str,
    timeout: Duration,
) -> Result<Structured, ExecError> {
    let output = run(channel, command, timeout).await?;

    if !output.success() {
        return Err(ExecError::NonZeroExit {
            exit_code: output.exit_code,
            stderr: output.stderr,
        });
    }

    match serde_json::from_str(&output.stdout) {
        Ok(value) => Ok(Structured::Json(value)),
        Err(_) => Ok(Structured::Raw {
            raw: output.stdout.trim().to_string(),
        }),
    }
}
