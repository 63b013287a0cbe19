use std::future::Future;
use std::path::PathBuf;

use russh::client::Handler;
use russh::keys::{self, HashAlg, PublicKey};

use crate::error::ConnectError;
use crate::security_log;

/// How server host keys are checked during the handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostKeyPolicy {
    /// Accept any key, logging its fingerprint.
    AcceptAny,
    /// Accept only keys present in an OpenSSH `known_hosts` file.
    KnownHosts(PathBuf),
}

/// SSH client handler for relay connections. No interactive prompts: the
/// policy alone decides whether a host key is trusted.
pub struct ClientHandler {
    host: String,
    port: u16,
    policy: HostKeyPolicy,
}

impl ClientHandler {
    pub fn new(host: String, port: u16, policy: HostKeyPolicy) -> Self {
        Self { host, port, policy }
    }
}

impl Handler for ClientHandler {
    type Error = ConnectError;

    fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> impl Future<Output = Result<bool, Self::Error>> + Send {
        let host = self.host.clone();
        let port = self.port;
        let policy = self.policy.clone();
        let key = server_public_key.clone();

        async move {
            let fingerprint = key.fingerprint(HashAlg::Sha256).to_string();

            match policy {
                HostKeyPolicy::AcceptAny => {
                    security_log::log_host_key_accepted(&host, port, &fingerprint);
                    Ok(true)
                }
                HostKeyPolicy::KnownHosts(path) => {
                    let status = tokio::task::spawn_blocking({
                        let host = host.clone();
                        move || keys::known_hosts::check_known_hosts_path(&host, port, &key, &path)
                    })
                    .await
                    .map_err(|e| ConnectError::HostKey(format!("Host key check failed: {}", e)))?;

                    match status {
                        Ok(true) => {
                            tracing::debug!("Host key verified for {}:{}", host, port);
                            Ok(true)
                        }
                        Ok(false) => {
                            security_log::log_host_key_rejected(&host, port, "unknown host key");
                            Err(ConnectError::HostKey(format!(
                                "{}:{} is not in known_hosts ({})",
                                host, port, fingerprint
                            )))
                        }
                        Err(e) => {
                            security_log::log_host_key_rejected(&host, port, &e.to_string());
                            Err(ConnectError::HostKey(format!(
                                "Host key for {}:{} does not match known_hosts: {}",
                                host, port, e
                            )))
                        }
                    }
                }
            }
        }
    }
}
