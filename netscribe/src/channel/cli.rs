//! Line-oriented CLI channel over a transport.

use std::time::Duration;

use log::{debug, trace};
use tokio::time::Instant;

use super::buffer::PatternBuffer;
use super::patterns::MatchOutcome;
use crate::error::{InteractionError, Result};
use crate::transport::{Protocol, Transport};

/// Owns the transport and the receive buffer for one session.
///
/// Exactly one caller reads and writes at a time; every wait is bounded by
/// a timeout.
pub struct CliChannel {
    transport: Box<dyn Transport>,
    buffer: PatternBuffer,
    line_ending: String,
}

impl CliChannel {
    pub fn new(transport: Box<dyn Transport>, line_ending: impl Into<String>) -> Self {
        Self {
            transport,
            buffer: PatternBuffer::new(),
            line_ending: line_ending.into(),
        }
    }

    /// Write raw text, no line ending added.
    pub async fn send(&mut self, data: &str) -> Result<()> {
        trace!("send: {:?}", data);
        self.transport.send(data.as_bytes()).await
    }

    /// Write `line` followed by the configured line ending.
    pub async fn send_line(&mut self, line: &str) -> Result<()> {
        let mut data = String::with_capacity(line.len() + self.line_ending.len());
        data.push_str(line);
        data.push_str(&self.line_ending);
        self.send(&data).await
    }

    /// Write `secret` plus line ending without tracing its content.
    pub async fn send_secret(&mut self, secret: &str) -> Result<()> {
        trace!("send: <secret>");
        let mut data = String::with_capacity(secret.len() + self.line_ending.len());
        data.push_str(secret);
        data.push_str(&self.line_ending);
        self.transport.send(data.as_bytes()).await
    }

    /// Wait until one of `candidates` appears in the received text.
    ///
    /// The first candidate in list order that is present wins, regardless
    /// of where in the buffer it sits. Text up to and including the match
    /// is consumed. Fails with [`InteractionError::Timeout`] if nothing
    /// matches before `timeout` and with [`InteractionError::ChannelClosed`]
    /// if the remote closes first.
    pub async fn read_until(
        &mut self,
        candidates: &[&str],
        timeout: Duration,
    ) -> Result<MatchOutcome> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(found) = self.buffer.find_first(candidates) {
                let before = self.buffer.consume(found);
                let matched = candidates[found.candidate].to_string();
                trace!("matched {:?} after {:?}", matched, before);
                return Ok(MatchOutcome {
                    index: found.candidate + 1,
                    matched,
                    before,
                });
            }

            let timed_out = || InteractionError::Timeout {
                waiting_for: describe(candidates),
                timeout,
            };
            match tokio::time::timeout_at(deadline, self.transport.recv()).await {
                Err(_) => {
                    debug!(
                        "No match for {} within {:?}; pending {:?}",
                        describe(candidates),
                        timeout,
                        self.buffer.as_str_lossy()
                    );
                    return Err(timed_out().into());
                }
                Ok(Ok(Some(data))) => self.buffer.extend(&data),
                Ok(Ok(None)) => return Err(InteractionError::ChannelClosed.into()),
                Ok(Err(e)) => return Err(e),
            }
        }
    }

    /// Wait for a single string; returns the text before it.
    pub async fn wait_for(&mut self, candidate: &str, timeout: Duration) -> Result<String> {
        Ok(self.read_until(&[candidate], timeout).await?.before)
    }

    /// Collect whatever arrives until the line goes quiet for `quiet`.
    pub async fn drain(&mut self, quiet: Duration) -> String {
        while let Ok(Ok(Some(data))) = tokio::time::timeout(quiet, self.transport.recv()).await {
            self.buffer.extend(&data);
        }
        String::from_utf8_lossy(&self.buffer.take()).into_owned()
    }

    /// Forget buffered, unconsumed output.
    pub fn discard_pending(&mut self) {
        if !self.buffer.is_empty() {
            trace!("discarding {:?}", self.buffer.as_str_lossy());
        }
        self.buffer.clear();
    }

    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    pub async fn disconnect(&mut self) -> Result<()> {
        self.transport.disconnect().await
    }

    pub fn protocol(&self) -> Protocol {
        self.transport.protocol()
    }

    pub fn line_ending(&self) -> &str {
        &self.line_ending
    }
}

fn describe(candidates: &[&str]) -> String {
    candidates
        .iter()
        .map(|c| format!("{:?}", c))
        .collect::<Vec<_>>()
        .join(" | ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::transport::ScriptedTransport;

    fn channel(transport: ScriptedTransport) -> CliChannel {
        CliChannel::new(Box::new(transport), "\n")
    }

    #[tokio::test]
    async fn test_read_until_reports_index_and_before() {
        let transport = ScriptedTransport::new()
            .chunk_size(3)
            .on("enable\n", "enable\r\nPassword: ");
        let mut channel = channel(transport);

        channel.send_line("enable").await.unwrap();
        let outcome = channel
            .read_until(&["% No", "assword", ">"], Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(outcome.index, 2);
        assert_eq!(outcome.before, "enable\r\nP");
    }

    #[tokio::test]
    async fn test_timeout_is_an_error_not_empty_output() {
        let mut channel = channel(ScriptedTransport::new().banner("partial"));
        let err = channel
            .read_until(&["SW1#"], Duration::from_millis(30))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Interaction(InteractionError::Timeout { .. })
        ));
    }

    #[tokio::test]
    async fn test_remote_close_while_waiting() {
        let transport = ScriptedTransport::new().on_then_close("exit\n", "exit\r\n");
        let mut channel = channel(transport);
        channel.send_line("exit").await.unwrap();
        let err = channel
            .wait_for("SW1#", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Interaction(InteractionError::ChannelClosed)));
    }

    #[tokio::test]
    async fn test_drain_collects_until_quiet() {
        let mut channel = channel(ScriptedTransport::new().banner("\x1b[1mWelcome\x1b[0m\r\nR1>"));
        let text = channel.drain(Duration::from_millis(20)).await;
        assert_eq!(text, "Welcome\r\nR1>");
    }
}
