//! Scripted fake transport for exercising sessions without a device.
//!
//! A [`ScriptedTransport`] holds an ordered list of rules. Each rule waits
//! for a trigger to appear in the bytes written so far and then queues a
//! canned response, the way a device answers a typed line. Rules fire
//! strictly in order, so a script doubles as an assertion on what the
//! session sent and when.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use log::trace;
use memchr::memmem;

use super::config::Target;
use super::connector::Connector;
use super::{Protocol, Transport};
use crate::error::{ConnectError, InteractionError, Result};

#[derive(Debug)]
struct Rule {
    trigger: Vec<u8>,
    response: Vec<u8>,
    close: bool,
}

#[derive(Debug)]
struct ScriptState {
    rules: VecDeque<Rule>,
    /// Written bytes not yet consumed by a rule.
    unmatched: Vec<u8>,
    /// Output waiting to be read.
    pending: VecDeque<u8>,
    /// Every byte ever written.
    sent: Vec<u8>,
    connected: bool,
    closing: bool,
    chunk_size: usize,
    ignore_disconnect: bool,
    disconnect_calls: u32,
    protocol: Protocol,
}

impl ScriptState {
    fn lock(state: &Mutex<ScriptState>) -> std::sync::MutexGuard<'_, ScriptState> {
        state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_live(&self) -> bool {
        self.connected && !(self.closing && self.pending.is_empty())
    }

    fn fire_rules(&mut self) {
        while let Some(rule) = self.rules.front() {
            let Some(pos) = memmem::find(&self.unmatched, &rule.trigger) else {
                break;
            };
            self.unmatched.drain(..pos + rule.trigger.len());
            if let Some(rule) = self.rules.pop_front() {
                trace!(
                    "Scripted rule fired on {:?}",
                    String::from_utf8_lossy(&rule.trigger)
                );
                self.pending.extend(rule.response);
                self.closing |= rule.close;
            }
        }
    }
}

/// In-memory transport that replays a device script.
#[derive(Debug)]
pub struct ScriptedTransport {
    state: Arc<Mutex<ScriptState>>,
}

impl Default for ScriptedTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ScriptState {
                rules: VecDeque::new(),
                unmatched: Vec::new(),
                pending: VecDeque::new(),
                sent: Vec::new(),
                connected: true,
                closing: false,
                chunk_size: 0,
                ignore_disconnect: false,
                disconnect_calls: 0,
                protocol: Protocol::Ssh2,
            })),
        }
    }

    /// Output available before anything is sent (login banner, first prompt).
    pub fn banner(self, output: impl AsRef<[u8]>) -> Self {
        ScriptState::lock(&self.state)
            .pending
            .extend(output.as_ref().iter().copied());
        self
    }

    /// Once `trigger` has been written, make `response` readable.
    pub fn on(self, trigger: impl AsRef<[u8]>, response: impl AsRef<[u8]>) -> Self {
        self.push_rule(trigger.as_ref(), response.as_ref(), false)
    }

    /// Like [`on`](Self::on), then close the channel once the response is read.
    pub fn on_then_close(self, trigger: impl AsRef<[u8]>, response: impl AsRef<[u8]>) -> Self {
        self.push_rule(trigger.as_ref(), response.as_ref(), true)
    }

    /// Deliver output in chunks of at most `size` bytes.
    pub fn chunk_size(self, size: usize) -> Self {
        ScriptState::lock(&self.state).chunk_size = size;
        self
    }

    /// Keep reporting "connected" after `disconnect()`.
    pub fn ignore_disconnect(self) -> Self {
        ScriptState::lock(&self.state).ignore_disconnect = true;
        self
    }

    /// Shared view on the transport for assertions after it is moved.
    pub fn handle(&self) -> ScriptedHandle {
        ScriptedHandle {
            state: self.state.clone(),
        }
    }

    fn push_rule(self, trigger: &[u8], response: &[u8], close: bool) -> Self {
        ScriptState::lock(&self.state).rules.push_back(Rule {
            trigger: trigger.to_vec(),
            response: response.to_vec(),
            close,
        });
        self
    }

    fn set_protocol(&self, protocol: Protocol) {
        ScriptState::lock(&self.state).protocol = protocol;
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&mut self, data: &[u8]) -> Result<()> {
        let mut state = ScriptState::lock(&self.state);
        if !state.connected {
            return Err(InteractionError::NotConnected.into());
        }
        state.sent.extend_from_slice(data);
        state.unmatched.extend_from_slice(data);
        state.fire_rules();
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<Vec<u8>>> {
        {
            let mut state = ScriptState::lock(&self.state);
            if !state.pending.is_empty() {
                let take = match state.chunk_size {
                    0 => state.pending.len(),
                    n => n.min(state.pending.len()),
                };
                return Ok(Some(state.pending.drain(..take).collect()));
            }
            if state.closing || !state.connected {
                state.connected = false;
                return Ok(None);
            }
        }
        // Silent device: only a caller timeout ends this read.
        std::future::pending::<()>().await;
        Ok(None)
    }

    fn is_connected(&self) -> bool {
        ScriptState::lock(&self.state).is_live()
    }

    async fn disconnect(&mut self) -> Result<()> {
        let mut state = ScriptState::lock(&self.state);
        state.disconnect_calls += 1;
        if !state.ignore_disconnect {
            state.connected = false;
        }
        Ok(())
    }

    fn protocol(&self) -> Protocol {
        ScriptState::lock(&self.state).protocol
    }
}

/// Read-only handle onto a [`ScriptedTransport`]'s state.
#[derive(Debug, Clone)]
pub struct ScriptedHandle {
    state: Arc<Mutex<ScriptState>>,
}

impl ScriptedHandle {
    /// Everything written to the transport, lossily decoded.
    pub fn sent(&self) -> String {
        String::from_utf8_lossy(&ScriptState::lock(&self.state).sent).into_owned()
    }

    /// Rules that have not fired yet.
    pub fn remaining_rules(&self) -> usize {
        ScriptState::lock(&self.state).rules.len()
    }

    pub fn is_connected(&self) -> bool {
        ScriptState::lock(&self.state).is_live()
    }

    pub fn disconnect_calls(&self) -> u32 {
        ScriptState::lock(&self.state).disconnect_calls
    }

    /// Drop the connection from the device side.
    pub fn hang_up(&self) {
        ScriptState::lock(&self.state).connected = false;
    }
}

/// Connector that hands out pre-built scripted transports in order.
#[derive(Debug, Default)]
pub struct ScriptedConnector {
    outcomes: Mutex<VecDeque<Option<ScriptedTransport>>>,
    attempts: Mutex<Vec<(Protocol, String)>>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next connect attempt succeeds with `transport`.
    pub fn accept(self, transport: ScriptedTransport) -> Self {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(Some(transport));
        self
    }

    /// The next connect attempt is refused.
    pub fn refuse(self) -> Self {
        self.outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(None);
        self
    }

    /// Every (protocol, host) that was attempted, in order.
    pub fn attempts(&self) -> Vec<(Protocol, String)> {
        self.attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self, protocol: Protocol, target: &Target) -> Result<Box<dyn Transport>> {
        self.attempts
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((protocol, target.host.clone()));

        let outcome = self
            .outcomes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .flatten();

        match outcome {
            Some(transport) => {
                transport.set_protocol(protocol);
                Ok(Box::new(transport))
            }
            None => Err(ConnectError::ConnectionFailed {
                host: target.host.clone(),
                port: target.port_for(protocol),
                source: io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused"),
            }
            .into()),
        }
    }
}
