//! SFTP connector: TCP, SSH handshake, password auth, SFTP subsystem.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use russh::client::{self, Config};
use russh_sftp::client::SftpSession as RusshSftpSession;
use secrecy::ExposeSecret;
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::error::ConnectError;
use crate::remote::{Connector, Credentials, RemoteFs};

use super::fs::SftpFs;
use super::handler::{ClientHandler, HostKeyPolicy};

/// Transport settings shared by every connection the relay opens.
#[derive(Debug, Clone)]
pub struct ConnectSettings {
    pub keepalive_interval: Duration,
    pub host_key_policy: HostKeyPolicy,
}

impl Default for ConnectSettings {
    fn default() -> Self {
        Self {
            keepalive_interval: Duration::from_secs(60),
            host_key_policy: HostKeyPolicy::AcceptAny,
        }
    }
}

/// Production [`Connector`] opening password-authenticated SFTP sessions.
pub struct SftpConnector {
    config: Arc<Config>,
    host_key_policy: HostKeyPolicy,
}

impl SftpConnector {
    pub fn new(settings: ConnectSettings) -> Self {
        let config = Config {
            inactivity_timeout: Some(Duration::from_secs(3600)),
            keepalive_interval: Some(settings.keepalive_interval),
            keepalive_max: 3,
            ..Default::default()
        };

        Self {
            config: Arc::new(config),
            host_key_policy: settings.host_key_policy,
        }
    }

    async fn establish(
        &self,
        credentials: &Credentials,
        stream: TcpStream,
    ) -> Result<SftpFs, ConnectError> {
        let handler = ClientHandler::new(
            credentials.host.clone(),
            credentials.port,
            self.host_key_policy.clone(),
        );

        let mut handle = client::connect_stream(self.config.clone(), stream, handler).await?;

        // expose_secret() only at the point of authentication
        let auth = handle
            .authenticate_password(
                credentials.username.as_str(),
                credentials.password.expose_secret(),
            )
            .await
            .map_err(|e| ConnectError::Authentication(e.to_string()))?;
        if !auth.success() {
            return Err(ConnectError::Authentication(
                "Authentication rejected by server".to_string(),
            ));
        }

        let channel = handle
            .channel_open_session()
            .await
            .map_err(|e| ConnectError::Subsystem(format!("Failed to open channel: {}", e)))?;
        channel
            .request_subsystem(false, "sftp")
            .await
            .map_err(|e| {
                ConnectError::Subsystem(format!("Failed to request SFTP subsystem: {}", e))
            })?;

        let sftp = RusshSftpSession::new(channel.into_stream())
            .await
            .map_err(|e| {
                ConnectError::Subsystem(format!("Failed to initialize SFTP session: {}", e))
            })?;

        Ok(SftpFs::new(sftp, handle))
    }
}

#[async_trait]
impl Connector for SftpConnector {
    async fn connect(
        &self,
        credentials: &Credentials,
        connect_timeout: Duration,
    ) -> Result<Box<dyn RemoteFs>, ConnectError> {
        let addr = format!("{}:{}", credentials.host, credentials.port);

        let stream = timeout(connect_timeout, TcpStream::connect(&addr))
            .await
            .map_err(|_| ConnectError::Timeout {
                host: credentials.host.clone(),
                port: credentials.port,
            })?
            .map_err(|source| ConnectError::Tcp {
                host: credentials.host.clone(),
                port: credentials.port,
                source,
            })?;

        // The handshake gets its own budget of the same length
        let fs = timeout(connect_timeout, self.establish(credentials, stream))
            .await
            .map_err(|_| ConnectError::Timeout {
                host: credentials.host.clone(),
                port: credentials.port,
            })??;

        tracing::debug!(host = %credentials.host, port = credentials.port, "SFTP channel ready");
        Ok(Box::new(fs))
    }
}
