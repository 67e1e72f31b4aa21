//! Enable-mode negotiation.

use std::time::Duration;

use log::{debug, info, warn};
use secrecy::{ExposeSecret, SecretString};

use super::exchange::consume_echo;
use super::prompt::{self, Prompt};
use crate::channel::CliChannel;
use crate::error::{InteractionError, Result};
use crate::operator::Operator;
use crate::platform::OsProfile;

/// Replies to the enable command, in match priority order.
const ENABLE_REPLIES: [&str; 3] = ["% No", "assword", ">"];
/// Replies to the secret.
const SECRET_REPLIES: [&str; 2] = ["#", "assword"];
/// Empty answers sent to get off a secret prompt; devices give up after three.
const BACK_OUT_ATTEMPTS: usize = 3;

/// Where a negotiation stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnableState {
    AlreadyPrivileged,
    NeedsSecret,
    Elevating,
    Elevated,
    Failed(String),
}

impl EnableState {
    /// Whether the state ends the negotiation.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EnableState::AlreadyPrivileged | EnableState::Elevated | EnableState::Failed(_)
        )
    }
}

/// Settings for one negotiation.
pub(crate) struct EnableOptions<'a> {
    pub operator: &'a dyn Operator,
    pub prompt_for_secret: bool,
    pub echo_timeout: Duration,
    pub response_timeout: Duration,
    pub probe_timeout: Duration,
}

/// Drives a restricted prompt to privileged mode.
///
/// A wrong secret is never retried: some devices lock the line after a
/// few failures.
#[derive(Debug)]
pub struct EnableNegotiator {
    state: EnableState,
    operator_asked: bool,
}

impl Default for EnableNegotiator {
    fn default() -> Self {
        Self::new()
    }
}

impl EnableNegotiator {
    pub fn new() -> Self {
        Self {
            state: EnableState::NeedsSecret,
            operator_asked: false,
        }
    }

    pub fn state(&self) -> &EnableState {
        &self.state
    }

    /// Whether the operator was asked for a secret.
    pub fn operator_asked(&self) -> bool {
        self.operator_asked
    }

    fn transition(&mut self, next: EnableState) {
        debug!("enable: {:?} -> {:?}", self.state, next);
        self.state = next;
    }

    fn fail(&mut self, reason: &str) -> InteractionError {
        warn!("Unable to enter enable mode: {}", reason);
        self.transition(EnableState::Failed(reason.to_string()));
        InteractionError::EnableFailed {
            reason: reason.to_string(),
        }
    }

    /// Run to a terminal state. Returns the (possibly new) prompt.
    ///
    /// `secret` is filled from the operator at most once and kept for
    /// later hops.
    pub(crate) async fn negotiate(
        &mut self,
        channel: &mut CliChannel,
        profile: &OsProfile,
        current: &Prompt,
        secret: &mut Option<SecretString>,
        options: EnableOptions<'_>,
    ) -> Result<Prompt> {
        if current.is_privileged() {
            self.transition(EnableState::AlreadyPrivileged);
            return Ok(current.clone());
        }
        self.transition(EnableState::NeedsSecret);

        if secret.is_none() && options.prompt_for_secret && !self.operator_asked {
            self.operator_asked = true;
            *secret = options
                .operator
                .prompt("Please enter enable password.", "Enter Enable PW", true)
                .await
                .map(SecretString::from);
        }

        self.transition(EnableState::Elevating);
        channel.send_line(&profile.enable_command).await?;
        consume_echo(channel, &profile.enable_command, options.echo_timeout).await?;
        let reply = match channel
            .read_until(&ENABLE_REPLIES, options.response_timeout)
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                self.fail("no reply to the enable command");
                return Err(e);
            }
        };

        match reply.index {
            1 => return Err(self.fail("No password set").into()),
            2 => {}
            _ => return Err(self.fail("device returned to user mode").into()),
        }

        let Some(secret) = secret.as_ref() else {
            let err = self.fail("no enable secret supplied");
            back_out(channel, current, options.response_timeout).await;
            return Err(err.into());
        };
        channel.send_secret(secret.expose_secret()).await?;
        match channel
            .read_until(&SECRET_REPLIES, options.response_timeout)
            .await
        {
            Ok(reply) if reply.is(1) => {}
            Ok(_) => {
                let err = self.fail("enable secret rejected");
                back_out(channel, current, options.response_timeout).await;
                return Err(err.into());
            }
            Err(e) => {
                self.fail("no reply to the enable secret");
                return Err(e);
            }
        }

        let elevated = prompt::discover(channel, options.probe_timeout).await?;
        if !elevated.is_privileged() {
            return Err(self.fail("prompt not privileged after enable").into());
        }
        self.transition(EnableState::Elevated);
        info!("Entered enable mode on {}", elevated.hostname());
        Ok(elevated)
    }
}

/// Leave a pending secret prompt with bare line endings until the
/// restricted prompt is back. Nothing typed here can be a secret.
async fn back_out(channel: &mut CliChannel, restricted: &Prompt, timeout: Duration) {
    for _ in 0..BACK_OUT_ATTEMPTS {
        if let Err(e) = channel.send_line("").await {
            warn!("Unable to leave the enable secret prompt: {}", e);
            return;
        }
        match channel
            .read_until(&[restricted.text(), "assword"], timeout)
            .await
        {
            Ok(reply) if reply.is(1) => {
                debug!("Back at {:?} after failed enable", restricted.text());
                return;
            }
            Ok(_) => {}
            Err(e) => {
                warn!("Unable to leave the enable secret prompt: {}", e);
                return;
            }
        }
    }
    warn!(
        "Still at the enable secret prompt after {} empty answers",
        BACK_OUT_ATTEMPTS
    );
}
