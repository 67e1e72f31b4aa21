//! Transport layer: duplex byte channels to a device.
//!
//! The session engine only ever talks to a [`Transport`]. Concrete
//! implementations cover SSH (russh), Telnet (raw TCP with IAC handling),
//! an operator-backed replay transport, and a scripted fake for tests.

pub mod config;
mod connector;
mod replay;
mod scripted;
mod ssh;
mod telnet;

pub use config::{AuthMethod, Credentials, HostKeyVerification, SshConfig, Target};
pub use connector::{Connector, NetworkConnector, connect_best_ssh};
pub use replay::OperatorReplayTransport;
pub use scripted::{ScriptedConnector, ScriptedHandle, ScriptedTransport};
pub use ssh::SshTransport;
pub use telnet::TelnetTransport;

#[cfg(test)]
pub(crate) use scripted::fixtures;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Wire protocol used to reach a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Protocol {
    #[serde(rename = "SSH2")]
    Ssh2,
    #[serde(rename = "SSH1")]
    Ssh1,
    #[serde(rename = "Telnet")]
    Telnet,
}

impl Protocol {
    /// Well-known port for the protocol.
    pub fn default_port(self) -> u16 {
        match self {
            Protocol::Ssh2 | Protocol::Ssh1 => 22,
            Protocol::Telnet => 23,
        }
    }
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Protocol::Ssh2 => "SSH2",
            Protocol::Ssh1 => "SSH1",
            Protocol::Telnet => "Telnet",
        })
    }
}

/// A connected duplex character channel.
///
/// `recv` must be cancellation safe: callers wrap it in
/// `tokio::time::timeout` and drop the future when the deadline passes.
#[async_trait]
pub trait Transport: Send {
    /// Write raw bytes to the remote side.
    async fn send(&mut self, data: &[u8]) -> Result<()>;

    /// Wait for the next chunk of output. `Ok(None)` means the remote closed.
    async fn recv(&mut self) -> Result<Option<Vec<u8>>>;

    /// Whether the channel is still usable.
    fn is_connected(&self) -> bool;

    /// Close the channel. Calling it on a closed transport is a no-op.
    async fn disconnect(&mut self) -> Result<()>;

    /// Protocol this transport speaks.
    fn protocol(&self) -> Protocol;
}
