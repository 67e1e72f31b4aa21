//! Opening transports by protocol.

use async_trait::async_trait;
use log::{debug, warn};

use super::config::{SshConfig, Target};
use super::ssh::SshTransport;
use super::telnet::TelnetTransport;
use super::{Protocol, Transport};
use crate::error::{ConnectError, Error, Result};

/// Something that can open a [`Transport`] to a target.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, protocol: Protocol, target: &Target) -> Result<Box<dyn Transport>>;
}

/// Connector backed by real sockets.
///
/// SSH-1 has no implementation in the SSH stack and is reported as
/// [`ConnectError::UnsupportedProtocol`].
#[derive(Debug, Clone, Default)]
pub struct NetworkConnector {
    pub ssh: SshConfig,
}

impl NetworkConnector {
    pub fn new(ssh: SshConfig) -> Self {
        Self { ssh }
    }
}

#[async_trait]
impl Connector for NetworkConnector {
    async fn connect(&self, protocol: Protocol, target: &Target) -> Result<Box<dyn Transport>> {
        let port = target.port_for(protocol);
        match protocol {
            Protocol::Ssh2 => {
                let transport =
                    SshTransport::connect(&target.host, port, &target.credentials, &self.ssh)
                        .await?;
                Ok(Box::new(transport))
            }
            Protocol::Ssh1 => Err(ConnectError::UnsupportedProtocol { protocol }.into()),
            Protocol::Telnet => {
                let transport = TelnetTransport::connect(&target.host, port, self.ssh.timeout).await?;
                Ok(Box::new(transport))
            }
        }
    }
}

/// Try SSH2, then make exactly one SSH1 attempt.
pub async fn connect_best_ssh(
    connector: &dyn Connector,
    target: &Target,
) -> Result<Box<dyn Transport>> {
    let ssh2 = match connector.connect(Protocol::Ssh2, target).await {
        Ok(transport) => return Ok(transport),
        Err(Error::Connect(e)) => e,
        Err(other) => return Err(other),
    };

    warn!("SSH2 to {} failed ({}); falling back to SSH1", target.host, ssh2);
    match connector.connect(Protocol::Ssh1, target).await {
        Ok(transport) => {
            debug!("SSH1 fallback to {} succeeded", target.host);
            Ok(transport)
        }
        Err(Error::Connect(ssh1)) => Err(ConnectError::FallbackExhausted {
            ssh2: Box::new(ssh2),
            ssh1: Box::new(ssh1),
        }
        .into()),
        Err(other) => Err(other),
    }
}
