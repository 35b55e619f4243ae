//! Input validation for caller-provided configuration and command values.
//!
//! Provides validation functions for hostnames, ports, usernames, and for the
//! identifiers (namespaces, resource names) that get interpolated into remote
//! command strings. Anything interpolated into a shell invocation must either
//! pass an allow-list check here or go through [`shell_single_quote`].

use std::net::IpAddr;

use regex::Regex;
use std::sync::LazyLock;

/// Validation error with field context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

// Pre-compiled regex patterns for validation
static DNS_LABEL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?$").unwrap());

static USERNAME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z_][a-zA-Z0-9_-]{0,31}$").unwrap());

// Kubernetes object names and namespaces: lowercase RFC 1123 subdomain shape.
static IDENTIFIER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]([a-z0-9.-]*[a-z0-9])?$").unwrap());

// Remote file paths embedded double-quoted in provisioning commands. `$` is
// allowed so operators can configure `$HOME/.kube/config`; quoting and
// substitution metacharacters are not.
static REMOTE_PATH_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_./$~-]+$").unwrap());

/// Validate a hostname (DNS name or IP address).
///
/// Accepts:
/// - IPv4 addresses (e.g., "192.168.1.1")
/// - IPv6 addresses (e.g., "::1", "2001:db8::1")
/// - DNS hostnames (RFC 1123 compliant)
///
/// # Errors
///
/// Returns `ValidationError` if the hostname is empty, too long, or malformed.
pub fn validate_hostname(hostname: &str) -> Result<(), ValidationError> {
    let hostname = hostname.trim();

    if hostname.is_empty() {
        return Err(ValidationError {
            field: "hostname".to_string(),
            message: "Hostname is required".to_string(),
        });
    }

    // Check total length (DNS max is 253 characters)
    if hostname.len() > 253 {
        return Err(ValidationError {
            field: "hostname".to_string(),
            message: "Hostname exceeds maximum length of 253 characters".to_string(),
        });
    }

    // Try parsing as IP address first
    if hostname.parse::<IpAddr>().is_ok() {
        return Ok(());
    }

    // Validate as DNS hostname (RFC 1123)
    validate_dns_hostname(hostname)
}

/// Validate a DNS hostname according to RFC 1123.
fn validate_dns_hostname(hostname: &str) -> Result<(), ValidationError> {
    let labels: Vec<&str> = hostname.split('.').collect();

    if labels.is_empty() {
        return Err(ValidationError {
            field: "hostname".to_string(),
            message: "Invalid hostname format".to_string(),
        });
    }

    for label in labels {
        // Each label must be 1-63 characters
        if label.is_empty() || label.len() > 63 {
            return Err(ValidationError {
                field: "hostname".to_string(),
                message: "Hostname labels must be 1-63 characters".to_string(),
            });
        }

        if !DNS_LABEL_REGEX.is_match(label) {
            return Err(ValidationError {
                field: "hostname".to_string(),
                message: format!(
                    "Invalid hostname label '{}': must start and end with alphanumeric, may contain hyphens",
                    label
                ),
            });
        }
    }

    Ok(())
}

/// Validate a port number.
///
/// # Errors
///
/// Returns `ValidationError` if the port is 0.
pub fn validate_port(port: u16) -> Result<(), ValidationError> {
    if port == 0 {
        return Err(ValidationError {
            field: "port".to_string(),
            message: "Port must be between 1 and 65535".to_string(),
        });
    }
    Ok(())
}

/// Validate a username for SSH connections.
///
/// Usernames must follow POSIX conventions:
/// - Start with a letter or underscore
/// - Contain only alphanumeric, underscore, or hyphen
/// - Maximum 32 characters
///
/// # Errors
///
/// Returns `ValidationError` if the username is empty or malformed.
pub fn validate_username(username: &str) -> Result<(), ValidationError> {
    let username = username.trim();

    if username.is_empty() {
        return Err(ValidationError {
            field: "username".to_string(),
            message: "Username is required".to_string(),
        });
    }

    if username.len() > 32 {
        return Err(ValidationError {
            field: "username".to_string(),
            message: "Username exceeds maximum length of 32 characters".to_string(),
        });
    }

    if !USERNAME_REGEX.is_match(username) {
        return Err(ValidationError {
            field: "username".to_string(),
            message: "Username must start with letter or underscore, and contain only alphanumeric, underscore, or hyphen".to_string(),
        });
    }

    Ok(())
}

/// Validate an identifier destined for interpolation into a remote command
/// string (namespace, resource name, container name).
///
/// Allow-list: lowercase alphanumeric, `-` and `.`, must start and end with
/// alphanumeric, max 253 characters. Everything a shell could interpret is
/// rejected.
pub fn validate_identifier(field: &str, value: &str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError {
            field: field.to_string(),
            message: "Value is required".to_string(),
        });
    }

    if value.len() > 253 {
        return Err(ValidationError {
            field: field.to_string(),
            message: "Value exceeds maximum length of 253 characters".to_string(),
        });
    }

    if !IDENTIFIER_REGEX.is_match(value) {
        return Err(ValidationError {
            field: field.to_string(),
            message: format!(
                "Invalid identifier '{}': only lowercase alphanumeric, '-' and '.' are allowed",
                value
            ),
        });
    }

    Ok(())
}

/// Validate a remote file path embedded double-quoted in a provisioning
/// command. `$HOME`-style references are allowed; quoting and command
/// substitution characters are not.
pub fn validate_remote_path(path: &str) -> Result<(), ValidationError> {
    if path.is_empty() {
        return Err(ValidationError {
            field: "remote_path".to_string(),
            message: "Path is required".to_string(),
        });
    }

    if !REMOTE_PATH_REGEX.is_match(path) {
        return Err(ValidationError {
            field: "remote_path".to_string(),
            message: format!(
                "Invalid remote path '{}': only alphanumeric, '/', '.', '_', '-', '~' and '$' are allowed",
                path
            ),
        });
    }

    Ok(())
}

/// Wrap a string in single quotes for safe use as one shell word.
///
/// Embedded single quotes are closed, escaped and reopened (`'\''`), so the
/// result is inert no matter what the input contains.
pub fn shell_single_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    // ---- Hostname validation tests ----

    #[test]
    fn hostname_valid_ipv4() {
        assert!(validate_hostname("192.168.1.1").is_ok());
        assert!(validate_hostname("10.0.0.5").is_ok());
        assert!(validate_hostname("127.0.0.1").is_ok());
    }

    #[test]
    fn hostname_valid_ipv6() {
        assert!(validate_hostname("::1").is_ok());
        assert!(validate_hostname("2001:db8::1").is_ok());
        assert!(validate_hostname("fe80::1").is_ok());
    }

    #[test]
    fn hostname_valid_dns() {
        assert!(validate_hostname("bastion.example.com").is_ok());
        assert!(validate_hostname("my-host").is_ok());
        assert!(validate_hostname("server1").is_ok());
        assert!(validate_hostname("a").is_ok());
    }

    #[test]
    fn hostname_invalid_empty() {
        assert!(validate_hostname("").is_err());
        assert!(validate_hostname("   ").is_err());
    }

    #[test]
    fn hostname_invalid_format() {
        assert!(validate_hostname("-invalid").is_err());
        assert!(validate_hostname("invalid-").is_err());
        assert!(validate_hostname("invalid..host").is_err());
        assert!(validate_hostname(".invalid").is_err());
        assert!(validate_hostname("invalid.").is_err());
    }

    #[test]
    fn hostname_invalid_characters() {
        assert!(validate_hostname("invalid_host").is_err());
        assert!(validate_hostname("invalid host").is_err());
        assert!(validate_hostname("invalid@host").is_err());
    }

    // ---- Port validation tests ----

    #[test]
    fn port_valid() {
        assert!(validate_port(22).is_ok());
        assert!(validate_port(1).is_ok());
        assert!(validate_port(65535).is_ok());
    }

    #[test]
    fn port_invalid_zero() {
        assert!(validate_port(0).is_err());
    }

    // ---- Username validation tests ----

    #[test]
    fn username_valid() {
        assert!(validate_username("root").is_ok());
        assert!(validate_username("ubuntu").is_ok());
        assert!(validate_username("_system").is_ok());
        assert!(validate_username("deploy-user").is_ok());
        assert!(validate_username("User123").is_ok());
    }

    #[test]
    fn username_invalid_empty() {
        assert!(validate_username("").is_err());
        assert!(validate_username("   ").is_err());
    }

    #[test]
    fn username_invalid_start() {
        assert!(validate_username("123user").is_err());
        assert!(validate_username("-user").is_err());
    }

    #[test]
    fn username_invalid_characters() {
        assert!(validate_username("user@host").is_err());
        assert!(validate_username("user name").is_err());
        assert!(validate_username("user.name").is_err());
    }

    #[test]
    fn username_invalid_too_long() {
        let long_name = "a".repeat(33);
        assert!(validate_username(&long_name).is_err());
    }

    // ---- Identifier validation tests ----

    #[test]
    fn identifier_valid() {
        assert!(validate_identifier("namespace", "default").is_ok());
        assert!(validate_identifier("namespace", "kube-system").is_ok());
        assert!(validate_identifier("pod", "nginx-7f8b4").is_ok());
        assert!(validate_identifier("resource", "deployments.apps").is_ok());
    }

    #[test]
    fn identifier_invalid_empty() {
        assert!(validate_identifier("namespace", "").is_err());
    }

    #[test]
    fn identifier_invalid_shell_metacharacters() {
        assert!(validate_identifier("pod", "nginx; rm -rf /").is_err());
        assert!(validate_identifier("pod", "nginx$(whoami)").is_err());
        assert!(validate_identifier("pod", "nginx`id`").is_err());
        assert!(validate_identifier("pod", "nginx|tee").is_err());
        assert!(validate_identifier("pod", "nginx pod").is_err());
    }

    #[test]
    fn identifier_invalid_uppercase() {
        assert!(validate_identifier("namespace", "Default").is_err());
    }

    #[test]
    fn identifier_invalid_edges() {
        assert!(validate_identifier("namespace", "-leading").is_err());
        assert!(validate_identifier("namespace", "trailing-").is_err());
    }

    #[test]
    fn identifier_invalid_too_long() {
        let long = "a".repeat(254);
        assert!(validate_identifier("namespace", &long).is_err());
    }

    // ---- Remote path validation tests ----

    #[test]
    fn remote_path_valid() {
        assert!(validate_remote_path("$HOME/.kube/config").is_ok());
        assert!(validate_remote_path("/tmp/clusterlink-verify-abc123/config").is_ok());
        assert!(validate_remote_path("~/.kube/config").is_ok());
    }

    #[test]
    fn remote_path_invalid() {
        assert!(validate_remote_path("").is_err());
        assert!(validate_remote_path("/tmp/x\"; rm -rf /").is_err());
        assert!(validate_remote_path("/tmp/$(whoami)").is_err());
        assert!(validate_remote_path("/tmp/`id`").is_err());
        assert!(validate_remote_path("/tmp/with space").is_err());
    }

    // ---- Shell quoting tests ----

    #[test]
    fn shell_quote_plain() {
        assert_eq!(shell_single_quote("abc"), "'abc'");
    }

    #[test]
    fn shell_quote_embedded_single_quote() {
        assert_eq!(shell_single_quote("a'b"), "'a'\\''b'");
    }

    #[test]
    fn shell_quote_metacharacters_are_inert() {
        assert_eq!(
            shell_single_quote("$(rm -rf /); `id`"),
            "'$(rm -rf /); `id`'"
        );
    }
}
