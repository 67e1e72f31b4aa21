//! Session settings.
//!
//! A [`SessionConfig`] is built once (from code or a serialized file) and
//! handed to every session. Nothing here is global.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Timeouts, terminal handling and output locations for a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Per-read wait while capturing output.
    #[serde(with = "seconds")]
    pub read_timeout: Duration,

    /// Whole-response waits (prompt after save, hop exit, enable).
    #[serde(with = "seconds")]
    pub response_timeout: Duration,

    /// Wait for each prompt probe.
    #[serde(with = "seconds")]
    pub probe_timeout: Duration,

    /// Wait for the configuration prompt after each config command.
    #[serde(with = "seconds")]
    pub config_command_timeout: Duration,

    /// Wait for the normal prompt after leaving configuration mode.
    #[serde(with = "seconds")]
    pub config_exit_timeout: Duration,

    #[serde(with = "seconds")]
    pub connect_timeout: Duration,

    /// Wait for a sent command's echo.
    #[serde(with = "seconds")]
    pub echo_timeout: Duration,

    /// Disable pagination and widen the terminal while the session runs.
    pub modify_terminal: bool,

    /// Ask the operator for an enable secret when none was supplied.
    pub prompt_for_enable: bool,

    /// Any of these seen after connecting means the device is ready.
    pub prompt_endings: Vec<String>,

    pub line_ending: String,

    pub output_dir: PathBuf,

    /// Keep temporary capture files instead of deleting them.
    pub debug_mode: bool,

    pub debug_dir: PathBuf,

    /// chrono format for output file timestamps.
    pub date_format: String,

    /// Extra options for the `ssh` command issued on a jump host.
    pub jump_ssh_options: String,

    pub disconnect_command: String,

    #[serde(with = "seconds")]
    pub disconnect_grace: Duration,

    pub force_disconnect_attempts: u32,

    #[serde(with = "seconds")]
    pub force_disconnect_interval: Duration,

    /// Query whose output is classified into an OS family.
    pub version_command: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(5),
            response_timeout: Duration::from_secs(30),
            probe_timeout: Duration::from_secs(2),
            config_command_timeout: Duration::from_secs(3),
            config_exit_timeout: Duration::from_secs(2),
            connect_timeout: Duration::from_secs(30),
            echo_timeout: Duration::from_secs(5),
            modify_terminal: true,
            prompt_for_enable: true,
            prompt_endings: vec!["#".to_string(), ">".to_string()],
            line_ending: "\n".to_string(),
            output_dir: PathBuf::from("ScriptOutput"),
            debug_mode: false,
            debug_dir: PathBuf::from("ScriptOutput/debugs"),
            date_format: "%Y-%m-%d-%H-%M-%S".to_string(),
            jump_ssh_options: "-o StrictHostKeyChecking=no".to_string(),
            disconnect_command: "exit".to_string(),
            disconnect_grace: Duration::from_millis(250),
            force_disconnect_attempts: 10,
            force_disconnect_interval: Duration::from_millis(100),
            version_command: "show version | i Cisco".to_string(),
        }
    }
}

impl SessionConfig {
    /// Reject settings that would make a session wait forever or never
    /// recognise a prompt.
    pub fn validate(&self) -> Result<()> {
        let timeouts = [
            ("read_timeout", self.read_timeout),
            ("response_timeout", self.response_timeout),
            ("probe_timeout", self.probe_timeout),
            ("config_command_timeout", self.config_command_timeout),
            ("config_exit_timeout", self.config_exit_timeout),
            ("connect_timeout", self.connect_timeout),
            ("echo_timeout", self.echo_timeout),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, t)| t.is_zero()) {
            return Err(invalid(format!("{name} must be greater than zero")));
        }
        if self.line_ending.is_empty() {
            return Err(invalid("line_ending must not be empty"));
        }
        if self.prompt_endings.iter().all(|p| p.is_empty()) {
            return Err(invalid("prompt_endings must contain at least one ending"));
        }
        Ok(())
    }
}

fn invalid(message: impl Into<String>) -> Error {
    Error::InvalidConfig {
        message: message.into(),
    }
}

/// Durations as (fractional) seconds.
mod seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(de::Error::custom)
    }
}
