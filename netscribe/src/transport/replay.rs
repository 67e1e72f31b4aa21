//! Operator-backed replay transport.
//!
//! Stands in for a device when no device is reachable: input is echoed,
//! and every command line is answered with the contents of a file the
//! operator picks. Terminal, save and configuration-mode commands are
//! acknowledged with a bare prompt so a full session can be walked
//! through offline.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use log::debug;

use super::{Protocol, Transport};
use crate::error::{Error, InteractionError, Result};
use crate::operator::Operator;

const DEFAULT_HOSTNAME: &str = "DebugHost";

/// Commands answered without asking the operator.
const SILENT_PREFIXES: &[&str] = &["term", "show terminal", "show pager", "copy "];

/// Replays operator-chosen files as device output.
pub struct OperatorReplayTransport {
    operator: Arc<dyn Operator>,
    hostname: String,
    in_config: bool,
    line: Vec<u8>,
    last_was_cr: bool,
    pending: VecDeque<u8>,
    connected: bool,
}

impl OperatorReplayTransport {
    /// Ask the operator for a hostname and present the first prompt.
    pub async fn open(operator: Arc<dyn Operator>) -> Result<Self> {
        let hostname = operator
            .prompt(
                "What hostname should be used for this device (leave blank for 'DebugHost')?",
                "Replay Session",
                false,
            )
            .await
            .map(|h| h.trim().to_string())
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| DEFAULT_HOSTNAME.to_string());
        debug!("Replay session using hostname '{}'", hostname);

        let mut transport = Self {
            operator,
            hostname,
            in_config: false,
            line: Vec::new(),
            last_was_cr: false,
            pending: VecDeque::new(),
            connected: true,
        };
        transport.emit_prompt();
        Ok(transport)
    }

    fn prompt(&self) -> String {
        if self.in_config {
            format!("{}(config)#", self.hostname)
        } else {
            format!("{}#", self.hostname)
        }
    }

    fn emit(&mut self, data: &[u8]) {
        self.pending.extend(data.iter().copied());
    }

    fn emit_prompt(&mut self) {
        let prompt = self.prompt();
        self.emit(prompt.as_bytes());
    }

    async fn answer(&mut self, line: &str) -> Result<()> {
        let command = line.trim();
        let lower = command.to_lowercase();

        if self.in_config {
            if lower == "end" {
                self.in_config = false;
            }
        } else if lower.starts_with("conf") {
            self.in_config = true;
        } else if lower == "exit" || lower == "logout" {
            debug!("Replay session closed by '{}'", command);
            self.connected = false;
            return Ok(());
        } else if !command.is_empty() && !SILENT_PREFIXES.iter().any(|p| lower.starts_with(p)) {
            self.replay_file(command).await?;
        }

        self.emit_prompt();
        Ok(())
    }

    async fn replay_file(&mut self, command: &str) -> Result<()> {
        let title = format!("Path to file with output from '{command}'");
        let Some(path) = self.operator.choose_file(&title, "*.txt").await else {
            debug!("No replay file chosen for '{}'", command);
            return Ok(());
        };

        let content = tokio::fs::read(&path)
            .await
            .map_err(|e| Error::output(&path, e))?;
        for line in String::from_utf8_lossy(&content).lines() {
            self.emit(line.trim_end_matches('\r').as_bytes());
            self.emit(b"\r\n");
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for OperatorReplayTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        if !self.connected {
            return Err(InteractionError::NotConnected.into());
        }
        for &b in data {
            let after_cr = std::mem::replace(&mut self.last_was_cr, b == b'\r');
            match b {
                b'\n' if after_cr => {}
                b'\r' | b'\n' => {
                    let line = String::from_utf8_lossy(&std::mem::take(&mut self.line)).into_owned();
                    self.emit(b"\r\n");
                    self.answer(&line).await?;
                }
                0x08 | 0x7f => {
                    if self.line.pop().is_some() {
                        self.emit(b"\x08 \x08");
                    }
                }
                _ => {
                    self.line.push(b);
                    self.pending.push_back(b);
                }
            }
        }
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<Vec<u8>>> {
        if !self.pending.is_empty() {
            return Ok(Some(self.pending.drain(..).collect()));
        }
        if !self.connected {
            return Ok(None);
        }
        std::future::pending::<()>().await;
        Ok(None)
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.connected = false;
        Ok(())
    }

    fn protocol(&self) -> Protocol {
        Protocol::Ssh2
    }
}
