//! Telnet transport over a plain TCP stream.
//!
//! Only the slice of RFC 854 a CLI session needs is handled: option
//! negotiation is answered conservatively (the server may echo and
//! suppress go-ahead, everything else is refused), subnegotiations are
//! discarded, and literal 0xFF bytes are doubled on the way out.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{BufMut, BytesMut};
use log::{debug, trace};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use super::{Protocol, Transport};
use crate::error::{ConnectError, InteractionError, Result};

const IAC: u8 = 255;
const DONT: u8 = 254;
const DO: u8 = 253;
const WONT: u8 = 252;
const WILL: u8 = 251;
const SB: u8 = 250;
const SE: u8 = 240;

const OPT_ECHO: u8 = 1;
const OPT_SGA: u8 = 3;

/// Telnet client transport.
pub struct TelnetTransport {
    stream: TcpStream,
    filter: IacFilter,
    connected: bool,
}

impl TelnetTransport {
    /// Open a TCP connection to `host:port`.
    pub async fn connect(host: &str, port: u16, timeout: Duration) -> Result<Self> {
        debug!("Opening Telnet connection to {}:{}", host, port);
        let stream = tokio::time::timeout(timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| ConnectError::Timeout(timeout))?
            .map_err(|source| ConnectError::ConnectionFailed {
                host: host.to_string(),
                port,
                source,
            })?;

        Ok(Self {
            stream,
            filter: IacFilter::default(),
            connected: true,
        })
    }
}

#[async_trait]
impl Transport for TelnetTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        if !self.connected {
            return Err(InteractionError::NotConnected.into());
        }
        let escaped = escape_iac(data);
        self.stream
            .write_all(&escaped)
            .await
            .map_err(ConnectError::Io)?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<Vec<u8>>> {
        let mut buf = [0u8; 4096];
        loop {
            let n = self.stream.read(&mut buf).await.map_err(ConnectError::Io)?;
            if n == 0 {
                debug!("Telnet connection closed by remote");
                self.connected = false;
                return Ok(None);
            }

            let (data, replies) = self.filter.feed(&buf[..n]);
            if !replies.is_empty() {
                trace!("Telnet negotiation reply: {:?}", replies);
                self.stream
                    .write_all(&replies)
                    .await
                    .map_err(ConnectError::Io)?;
            }
            if !data.is_empty() {
                return Ok(Some(data));
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn disconnect(&mut self) -> Result<()> {
        if !self.connected {
            return Ok(());
        }
        self.connected = false;
        self.stream.shutdown().await.map_err(ConnectError::Io)?;
        Ok(())
    }

    fn protocol(&self) -> Protocol {
        Protocol::Telnet
    }
}

/// Double every IAC byte so it is sent as data.
fn escape_iac(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(data.len());
    for &b in data {
        out.push(b);
        if b == IAC {
            out.push(IAC);
        }
    }
    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum IacState {
    #[default]
    Data,
    Iac,
    Negotiate(u8),
    Sub,
    SubIac,
}

/// Incremental IAC parser. Keeps state across reads so a command split
/// over two TCP segments is still recognised.
#[derive(Debug, Default)]
struct IacFilter {
    state: IacState,
    /// (verb, option) pairs already answered; avoids negotiation loops.
    answered: HashSet<(u8, u8)>,
}

impl IacFilter {
    /// Split `input` into payload bytes and negotiation replies.
    fn feed(&mut self, input: &[u8]) -> (Vec<u8>, BytesMut) {
        let mut data = Vec::with_capacity(input.len());
        let mut replies = BytesMut::new();

        for &b in input {
            self.state = match self.state {
                IacState::Data if b == IAC => IacState::Iac,
                IacState::Data => {
                    data.push(b);
                    IacState::Data
                }
                IacState::Iac => match b {
                    IAC => {
                        data.push(IAC);
                        IacState::Data
                    }
                    DO | DONT | WILL | WONT => IacState::Negotiate(b),
                    SB => IacState::Sub,
                    // NOP, GA, AYT and friends carry no payload
                    _ => IacState::Data,
                },
                IacState::Negotiate(verb) => {
                    self.answer(verb, b, &mut replies);
                    IacState::Data
                }
                IacState::Sub if b == IAC => IacState::SubIac,
                IacState::Sub => IacState::Sub,
                IacState::SubIac if b == SE => IacState::Data,
                IacState::SubIac => IacState::Sub,
            };
        }

        (data, replies)
    }

    fn answer(&mut self, verb: u8, option: u8, replies: &mut BytesMut) {
        let reply = match verb {
            DO if option == OPT_SGA => WILL,
            DO => WONT,
            WILL if option == OPT_ECHO || option == OPT_SGA => DO,
            WILL => DONT,
            // Disabling requests need no acknowledgement from us
            _ => return,
        };
        if self.answered.insert((verb, option)) {
            replies.put_slice(&[IAC, reply, option]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_data_passes_through() {
        let mut filter = IacFilter::default();
        let (data, replies) = filter.feed(b"Username: ");
        assert_eq!(data, b"Username: ");
        assert!(replies.is_empty());
    }

    #[test]
    fn test_negotiation_is_stripped_and_answered() {
        let mut filter = IacFilter::default();
        let input = [
            IAC, DO, 24, // terminal type
            IAC, WILL, OPT_ECHO, IAC, WILL, OPT_SGA, b'l', b'o', b'g', b'i', b'n',
        ];
        let (data, replies) = filter.feed(&input);
        assert_eq!(data, b"login");
        assert_eq!(
            &replies[..],
            &[IAC, WONT, 24, IAC, DO, OPT_ECHO, IAC, DO, OPT_SGA]
        );
    }

    #[test]
    fn test_repeated_request_answered_once() {
        let mut filter = IacFilter::default();
        let (_, first) = filter.feed(&[IAC, DO, 31]);
        let (_, second) = filter.feed(&[IAC, DO, 31]);
        assert_eq!(first.len(), 3);
        assert!(second.is_empty());
    }

    #[test]
    fn test_command_split_across_reads() {
        let mut filter = IacFilter::default();
        let (data, replies) = filter.feed(&[b'a', IAC]);
        assert_eq!(data, b"a");
        assert!(replies.is_empty());

        let (data, replies) = filter.feed(&[WILL, OPT_ECHO, b'b']);
        assert_eq!(data, b"b");
        assert_eq!(&replies[..], &[IAC, DO, OPT_ECHO]);
    }

    #[test]
    fn test_subnegotiation_discarded() {
        let mut filter = IacFilter::default();
        let (data, _) = filter.feed(&[b'x', IAC, SB, 24, 1, IAC, SE, b'y']);
        assert_eq!(data, b"xy");
    }

    #[test]
    fn test_escaped_iac_is_data() {
        let mut filter = IacFilter::default();
        let (data, _) = filter.feed(&[IAC, IAC]);
        assert_eq!(data, vec![IAC]);
        assert_eq!(escape_iac(&[1, IAC, 2]), vec![1, IAC, IAC, 2]);
    }
}
