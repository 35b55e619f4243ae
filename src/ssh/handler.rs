use std::future::Future;

use russh::client::Handler;
use russh::keys::{HashAlg, PublicKey};

use crate::error::SshError;
use crate::security_log;

/// SSH client handler for bastion connections.
///
/// Bastions are operator-controlled jump hosts, so the server key is accepted
/// and its fingerprint written to the security audit log instead of being
/// checked against an interactive known-hosts store.
pub struct ClientHandler {
    host: String,
    port: u16,
}

impl ClientHandler {
    pub fn new(host: String, port: u16) -> Self {
        Self { host, port }
    }
}

impl Handler for ClientHandler {
    type Error = SshError;

    fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> impl Future<Output = Result<bool, Self::Error>> + Send {
        let host = self.host.clone();
        let port = self.port;
        let fingerprint = server_public_key.fingerprint(HashAlg::Sha256).to_string();

        async move {
            security_log::log_host_key_observed(&host, port, &fingerprint);
            Ok(true)
        }
    }
}
