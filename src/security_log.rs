//! Security event logging for audit trails.
//!
//! Structured logging functions for security-relevant events: bastion
//! authentication attempts, connection establishment and teardown, and
//! observed host keys.
//!
//! All security events are logged with `target: "security"` to allow
//! filtering in production environments:
//!
//! ```bash
//! RUST_LOG=security=info
//! ```

use tracing::{info, warn};

/// Log an SSH authentication attempt against a bastion host.
pub fn log_auth_attempt(host: &str, port: u16, username: &str) {
    info!(
        target: "security",
        event = "auth_attempt",
        host = %host,
        port = port,
        username = %username,
        "bastion authentication attempt"
    );
}

/// Log a successful bastion authentication.
pub fn log_auth_success(host: &str, port: u16, username: &str) {
    info!(
        target: "security",
        event = "auth_success",
        host = %host,
        port = port,
        username = %username,
        "bastion authentication succeeded"
    );
}

/// Log a failed bastion authentication attempt.
pub fn log_auth_failure(host: &str, port: u16, username: &str, reason: &str) {
    warn!(
        target: "security",
        event = "auth_failure",
        host = %host,
        port = port,
        username = %username,
        reason = %reason,
        "bastion authentication failed"
    );
}

/// Log the host key presented by a bastion.
///
/// Bastions are operator-controlled, so the key is accepted; the fingerprint
/// goes to the audit trail for after-the-fact verification.
pub fn log_host_key_observed(host: &str, port: u16, fingerprint: &str) {
    info!(
        target: "security",
        event = "host_key_observed",
        host = %host,
        port = port,
        fingerprint = %fingerprint,
        "bastion host key observed"
    );
}

/// Log a bastion channel teardown.
pub fn log_disconnect(host: &str, port: u16, requested: bool) {
    info!(
        target: "security",
        event = "disconnect",
        host = %host,
        port = port,
        requested = requested,
        "bastion channel closed"
    );
}
