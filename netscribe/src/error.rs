//! Error types for netscribe.

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::platform::NetworkOs;
use crate::transport::Protocol;

/// Main error type for netscribe operations.
#[derive(Error, Debug)]
pub enum Error {
    /// Failure to establish or tear down a connection.
    #[error("Connect error: {0}")]
    Connect(#[from] ConnectError),

    /// An expected pattern was not observed during an exchange.
    #[error("Interaction error: {0}")]
    Interaction(#[from] InteractionError),

    /// The device runs an OS the caller does not support.
    #[error("{0}")]
    UnsupportedOs(#[from] UnsupportedOsError),

    /// Writing or reading a capture, transcript, or proposal file failed.
    #[error("Output file error for {}: {source}", .path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Invalid settings or builder input.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// The structured-output extractor rejected captured text.
    #[error("Extraction with template '{template}' failed: {source}")]
    Extract {
        template: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl Error {
    /// Whether the session must be discarded after this error.
    ///
    /// Timeouts and missing patterns only abort the current operation;
    /// these leave the session in an unknown or hostile state.
    pub fn is_fatal_to_session(&self) -> bool {
        match self {
            // A refused hop leaves the current hop usable
            Error::Connect(ConnectError::Refused { .. }) => false,
            Error::Connect(_) => true,
            Error::Interaction(e) => matches!(
                e,
                InteractionError::PromptDiscoveryFailed { .. }
                    | InteractionError::EnableFailed { .. }
                    | InteractionError::ChannelClosed
                    | InteractionError::SessionFailed
            ),
            _ => false,
        }
    }

    pub(crate) fn output(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Output {
            path: path.into(),
            source,
        }
    }
}

/// Transport-level failures (connect, authenticate, disconnect).
#[derive(Error, Debug)]
pub enum ConnectError {
    /// TCP connection could not be established
    #[error("Connection failed to {host}:{port}: {source}")]
    ConnectionFailed {
        host: String,
        port: u16,
        #[source]
        source: io::Error,
    },

    /// SSH handshake or protocol error
    #[error("SSH error: {0}")]
    Ssh(#[from] russh::Error),

    /// Authentication failed
    #[error("Authentication failed for user '{user}'")]
    AuthenticationFailed { user: String },

    /// SSH key error
    #[error("SSH key error: {0}")]
    Key(String),

    /// Host key does not match known_hosts
    #[error("Host key for {host}:{port} changed (known_hosts line {line})")]
    HostKeyChanged { host: String, port: u16, line: usize },

    /// Host not present in known_hosts under strict checking
    #[error("Host key for {host}:{port} is unknown")]
    HostKeyUnknown { host: String, port: u16 },

    /// known_hosts could not be read or written
    #[error("known_hosts error: {0}")]
    KnownHosts(String),

    /// Connection attempt timed out
    #[error("Connection timed out after {0:?}")]
    Timeout(Duration),

    /// The connector cannot speak this protocol
    #[error("Protocol {protocol} is not supported by this connector")]
    UnsupportedProtocol { protocol: Protocol },

    /// Both legs of the SSH2 then SSH1 fallback failed
    #[error("SSH2 and SSH1 failed (SSH2: {ssh2}; SSH1: {ssh1})")]
    FallbackExhausted {
        ssh2: Box<ConnectError>,
        ssh1: Box<ConnectError>,
    },

    /// A hop was refused or denied by the remote host
    #[error("{protocol} to {host} was refused: {reason}")]
    Refused {
        host: String,
        protocol: String,
        reason: String,
    },

    /// Transport stayed up after graceful and forced disconnects
    #[error("Unable to disconnect after {attempts} forced attempts")]
    DisconnectFailed { attempts: u32 },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// An expected pattern was not seen, or the device answered unexpectedly.
#[derive(Error, Debug)]
pub enum InteractionError {
    /// Session has no live transport
    #[error("Session is not connected")]
    NotConnected,

    /// No candidate matched within the timeout
    #[error("Timed out after {timeout:?} waiting for {waiting_for}")]
    Timeout {
        waiting_for: String,
        timeout: Duration,
    },

    /// Remote side closed the channel while we were waiting
    #[error("Channel closed by remote")]
    ChannelClosed,

    /// The echo of a sent command never came back
    #[error("Echo of '{command}' not seen; channel may be desynchronized")]
    EchoNotSeen { command: String },

    /// Prompt probe exhausted its retries
    #[error("Unable to discover device prompt after {attempts} attempts")]
    PromptDiscoveryFailed { attempts: u32 },

    /// Device was left in configuration mode
    #[error("Device is in configuration mode ('{prompt}'); re-run when not in configuration mode")]
    InConfigurationMode { prompt: String },

    /// Enable negotiation ended in the failed state
    #[error("Unable to enter enable mode: {reason}")]
    EnableFailed { reason: String },

    /// A configuration command did not return to the config prompt
    #[error("Did not receive expected prompt after issuing command {index}: '{command}'")]
    ConfigCommandFailed { index: usize, command: String },

    /// unhop with no active hop
    #[error("No active jump hop to unwind")]
    NoActiveHop,

    /// An earlier fatal failure poisoned the session
    #[error("Session failed earlier; no further commands are sent")]
    SessionFailed,

    /// Operation requires start() first
    #[error("Session not started; call start() first")]
    NotStarted,
}

/// The classified OS is not in the caller's supported list.
#[derive(Error, Debug)]
#[error("Remote device running unsupported OS: {os}")]
pub struct UnsupportedOsError {
    pub os: NetworkOs,
    pub supported: Vec<NetworkOs>,
}

/// Result type alias using netscribe's Error.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        let err: Error = InteractionError::PromptDiscoveryFailed { attempts: 3 }.into();
        assert!(err.is_fatal_to_session());

        let err: Error = InteractionError::Timeout {
            waiting_for: "'SW1#'".to_string(),
            timeout: Duration::from_secs(5),
        }
        .into();
        assert!(!err.is_fatal_to_session());

        let err: Error = UnsupportedOsError {
            os: NetworkOs::Unknown,
            supported: vec![NetworkOs::Ios],
        }
        .into();
        assert!(!err.is_fatal_to_session());
    }

    #[test]
    fn test_fallback_message_names_both_legs() {
        let err = ConnectError::FallbackExhausted {
            ssh2: Box::new(ConnectError::Timeout(Duration::from_secs(30))),
            ssh1: Box::new(ConnectError::UnsupportedProtocol {
                protocol: Protocol::Ssh1,
            }),
        };
        let text = err.to_string();
        assert!(text.starts_with("SSH2 and SSH1 failed"));
        assert!(text.contains("Protocol SSH1 is not supported"));
    }
}
