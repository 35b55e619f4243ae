//! Kubeconfig provisioning onto a bastion host.
//!
//! Validation is a deliberately cheap syntactic gate run locally before any
//! channel use; a marker-present-but-malformed document is only caught by the
//! remote read-back step. Installation is one composite command so the first
//! failing step short-circuits the rest, and the content travels as a single
//! base64 blob decoded server-side, which avoids multi-line here-document
//! quoting hazards over the channel.

use std::time::Duration;

use data_encoding::BASE64;

use crate::error::ProvisionError;
use crate::ssh::CommandChannel;
use crate::validation::validate_remote_path;

/// Top-level sections a kubeconfig document must carry.
const REQUIRED_MARKERS: [&str; 4] = ["apiVersion:", "clusters:", "users:", "contexts:"];

/// Installs a validated kubeconfig at a fixed path on the bastion.
pub struct Provisioner {
    target_path: String,
    timeout: Duration,
}

impl Provisioner {
    /// Create a provisioner for `target_path`. The path is embedded
    /// double-quoted in the install command, so it must pass the remote-path
    /// allow-list.
    pub fn new(target_path: &str, timeout: Duration) -> Result<Self, ProvisionError> {
        validate_remote_path(target_path)
            .map_err(|e| ProvisionError::Validation(e.to_string()))?;

        Ok(Self {
            target_path: target_path.to_string(),
            timeout,
        })
    }

    /// Decode and validate the blob locally, then install it remotely.
    pub async fn provision<C: CommandChannel>(
        &self,
        channel: &C,
        remote_config_base64: &str,
    ) -> Result<(), ProvisionError> {
        let document = decode_and_validate(remote_config_base64)?;

        let command = self.install_command(&document);
        let output = channel.exec(&command, self.timeout).await?;

        if !output.success() {
            return Err(ProvisionError::Script {
                exit_code: output.exit_code,
                stderr: output.stderr,
            });
        }

        tracing::info!("remote config installed at {}", self.target_path);
        Ok(())
    }

    /// One `&&`-chained command: ensure directory, back up any existing file
    /// (non-fatal if absent), write the blob, restrict permissions, read back.
    fn install_command(&self, document: &str) -> String {
        let p = &self.target_path;
        // Re-encode locally so the transmitted blob is canonical base64 with
        // no whitespace, safe inside single quotes.
        let blob = BASE64.encode(document.as_bytes());

        format!(
            "mkdir -p \"$(dirname \"{p}\")\" && \
             {{ [ -f \"{p}\" ] && cp \"{p}\" \"{p}.bak\" || true; }} && \
             printf '%s' '{blob}' | base64 -d > \"{p}\" && \
             chmod 600 \"{p}\" && \
             head -c 64 \"{p}\" > /dev/null",
            p = p,
            blob = blob,
        )
    }
}

/// Base64-decode the blob and require the four kubeconfig section markers.
fn decode_and_validate(remote_config_base64: &str) -> Result<String, ProvisionError> {
    let raw = BASE64
        .decode(remote_config_base64.trim().as_bytes())
        .map_err(|e| ProvisionError::Validation(format!("remote config is not valid base64: {}", e)))?;

    let document = String::from_utf8(raw)
        .map_err(|_| ProvisionError::Validation("decoded remote config is not UTF-8".to_string()))?;

    for marker in REQUIRED_MARKERS {
        if !document.contains(marker) {
            return Err(ProvisionError::Validation(format!(
                "remote config is missing required section '{}'",
                marker
            )));
        }
    }

    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::ExecOutput;
    use crate::testing::MockChannel;

    const VALID_KUBECONFIG: &str =
        "apiVersion: v1\nkind: Config\nclusters: []\nusers: []\ncontexts: []\n";

    fn encode(document: &str) -> String {
        BASE64.encode(document.as_bytes())
    }

    fn provisioner() -> Provisioner {
        Provisioner::new("$HOME/.kube/config", Duration::from_secs(30)).unwrap()
    }

    #[test]
    fn decode_accepts_full_document() {
        assert!(decode_and_validate(&encode(VALID_KUBECONFIG)).is_ok());
    }

    #[test]
    fn decode_rejects_missing_clusters_marker() {
        let document = "apiVersion: v1\nusers: []\ncontexts: []\n";
        let err = decode_and_validate(&encode(document)).unwrap_err();
        assert!(matches!(err, ProvisionError::Validation(_)));
        assert!(err.to_string().contains("clusters:"));
    }

    #[test]
    fn decode_rejects_each_missing_marker() {
        for missing in REQUIRED_MARKERS {
            let document: String = REQUIRED_MARKERS
                .iter()
                .filter(|m| **m != missing)
                .map(|m| format!("{} []\n", m))
                .collect();
            let err = decode_and_validate(&encode(&document)).unwrap_err();
            assert!(err.to_string().contains(missing));
        }
    }

    #[test]
    fn decode_rejects_bad_base64() {
        let err = decode_and_validate("%%%not-base64%%%").unwrap_err();
        assert!(matches!(err, ProvisionError::Validation(_)));
    }

    #[test]
    fn new_rejects_hostile_path() {
        assert!(Provisioner::new("/tmp/x\"; rm -rf /", Duration::from_secs(30)).is_err());
    }

    #[test]
    fn install_command_shape() {
        let command = provisioner().install_command(VALID_KUBECONFIG);

        assert!(command.contains("mkdir -p"));
        assert!(command.contains("cp \"$HOME/.kube/config\" \"$HOME/.kube/config.bak\" || true"));
        assert!(command.contains(&format!("'{}'", encode(VALID_KUBECONFIG))));
        assert!(command.contains("base64 -d"));
        assert!(command.contains("chmod 600"));
        assert!(command.contains("head -c 64"));
        // Four top-level AND joins plus the backup conditional's own
        assert_eq!(command.matches(" && ").count(), 5);
    }

    #[test]
    fn install_command_blob_has_no_newlines() {
        let sprawling = format!("{}{}", VALID_KUBECONFIG, "x".repeat(4096));
        let command = provisioner().install_command(&sprawling);
        let blob_start = command.find("printf '%s' '").unwrap() + "printf '%s' '".len();
        let blob_end = command[blob_start..].find('\'').unwrap() + blob_start;
        assert!(!command[blob_start..blob_end].contains('\n'));
    }

    #[tokio::test]
    async fn validation_failure_sends_nothing_over_the_channel() {
        let channel = MockChannel::new();
        let result = provisioner()
            .provision(&channel, &encode("apiVersion: v1\n"))
            .await;

        assert!(matches!(result, Err(ProvisionError::Validation(_))));
        assert_eq!(channel.exec_count(), 0);
    }

    #[tokio::test]
    async fn successful_script_provisions() {
        let channel = MockChannel::new();
        let result = provisioner()
            .provision(&channel, &encode(VALID_KUBECONFIG))
            .await;

        assert!(result.is_ok());
        assert_eq!(channel.exec_count(), 1);
    }

    #[tokio::test]
    async fn script_failure_surfaces_stderr() {
        let channel = MockChannel::new();
        channel.respond_to(
            "mkdir -p",
            ExecOutput {
                exit_code: 1,
                stdout: String::new(),
                stderr: "mkdir: permission denied".to_string(),
            },
        );

        let err = provisioner()
            .provision(&channel, &encode(VALID_KUBECONFIG))
            .await
            .unwrap_err();

        match err {
            ProvisionError::Script { exit_code, stderr } => {
                assert_eq!(exit_code, 1);
                assert!(stderr.contains("permission denied"));
            }
            other => panic!("expected Script error, got {:?}", other),
        }
    }
}
