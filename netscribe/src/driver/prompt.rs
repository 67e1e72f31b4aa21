//! Prompt discovery.
//!
//! The probe is a newline followed by three marker characters and three
//! backspaces. The device redraws its prompt, echoes the markers and then
//! erases them, so nothing visible is left in scrollback.

use std::fmt;
use std::time::Duration;

use log::{debug, warn};

use crate::channel::{CliChannel, strip_control};
use crate::error::{Error, InteractionError, Result};
use crate::platform::PrivilegeLevel;

pub(crate) const PROBE: &str = "\n!&%\x08\x08\x08";
const PROBE_MARK: &str = "!&%";

/// Probe attempts before giving up on the session.
pub const DISCOVERY_ATTEMPTS: u32 = 3;

/// Snapshot of a device prompt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    text: String,
    hostname: String,
    privilege: Option<PrivilegeLevel>,
}

impl Prompt {
    /// Build from raw probe output: the last non-empty line, cleaned.
    pub fn parse(raw: &str) -> Option<Self> {
        let line = raw
            .split(['\r', '\n'])
            .map(|l| strip_control(l).trim().to_string())
            .filter(|l| !l.is_empty())
            .last()?;

        let privilege = PrivilegeLevel::from_prompt(&line);
        let hostname = match privilege {
            Some(level) => line.trim_end_matches(level.marker()).to_string(),
            None => {
                let mut chars = line.chars();
                chars.next_back();
                chars.as_str().to_string()
            }
        };
        Some(Self {
            text: line,
            hostname: hostname.trim_end().to_string(),
            privilege,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Prompt minus its privilege marker.
    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn privilege(&self) -> Option<PrivilegeLevel> {
        self.privilege
    }

    pub fn is_privileged(&self) -> bool {
        self.privilege == Some(PrivilegeLevel::Privileged)
    }
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Learn the current prompt.
///
/// Each attempt waits `timeout` for the probe echo. A device left in
/// configuration mode is refused.
pub async fn discover(channel: &mut CliChannel, timeout: Duration) -> Result<Prompt> {
    for attempt in 1..=DISCOVERY_ATTEMPTS {
        channel.send(PROBE).await?;
        match channel.wait_for(PROBE_MARK, timeout).await {
            Ok(before) => {
                channel.discard_pending();
                match Prompt::parse(&before) {
                    Some(prompt) => {
                        debug!("Discovered prompt {:?} on attempt {}", prompt.text(), attempt);
                        if prompt.privilege() == Some(PrivilegeLevel::Configuration) {
                            return Err(InteractionError::InConfigurationMode {
                                prompt: prompt.text().to_string(),
                            }
                            .into());
                        }
                        return Ok(prompt);
                    }
                    None => debug!("Empty prompt on attempt {}", attempt),
                }
            }
            Err(Error::Interaction(InteractionError::Timeout { .. })) => {
                debug!("Prompt probe {} of {} timed out", attempt, DISCOVERY_ATTEMPTS);
            }
            Err(e) => return Err(e),
        }
    }

    warn!("Prompt discovery failed after {} attempts", DISCOVERY_ATTEMPTS);
    Err(InteractionError::PromptDiscoveryFailed {
        attempts: DISCOVERY_ATTEMPTS,
    }
    .into())
}
