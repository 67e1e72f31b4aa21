//! Configuration pushes and check mode.
//!
//! A push is a transaction over `&mut Session`: commands go out in the
//! order given, each must bring back the configuration prompt, and the
//! first one that does not stops the push. The guard holds the session
//! borrow, so nothing else can talk to the device mid-push.
//!
//! Check mode lives above the push: [`Session::propose_config`] renders the
//! same commands to a file and never touches the device.
//!
//! # Example
//!
//! ```rust,no_run
//! use netscribe::Session;
//!
//! # async fn example(session: &mut Session) -> Result<(), netscribe::Error> {
//! let mut push = session.config_push();
//! push.begin().await?;
//! push.send("interface Vlan10").await?;
//! push.send("description users").await?;
//! push.commit().await?;
//! let transcript = push.into_transcript();
//! println!("{}", transcript.render());
//! # Ok(())
//! # }
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use log::{debug, info, warn};

use super::response::Termination;
use super::session::Session;
use crate::channel::CliChannel;
use crate::error::{Error, InteractionError, Result};
use crate::operator::{Button, Buttons, Operator};
use crate::platform::OsProfile;

/// One command of a push and what the device said to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigStep {
    pub command: String,
    /// Everything received for the command, echo and prompt included.
    pub response: String,
    /// `Prompt` when the expected prompt came back, `Timeout` otherwise.
    pub termination: Termination,
    pub failure_message: Option<String>,
}

/// Ordered record of one push.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigTranscript {
    /// Prompt the push started from.
    pub prompt: String,
    pub entry: Option<ConfigStep>,
    pub steps: Vec<ConfigStep>,
    pub exit: Option<ConfigStep>,
    /// 1-based index of the command that stopped the push.
    pub failed_at: Option<usize>,
}

impl ConfigTranscript {
    pub fn is_complete(&self) -> bool {
        self.failed_at.is_none()
            && self
                .exit
                .as_ref()
                .is_some_and(|step| step.termination == Termination::Prompt)
    }

    /// The interaction as it looked on the terminal, without carriage
    /// returns.
    pub fn render(&self) -> String {
        let mut out = self.prompt.clone();
        let steps = self.entry.iter().chain(&self.steps).chain(&self.exit);
        for step in steps {
            out.push_str(&step.response);
        }
        out.retain(|c| c != '\r');
        out
    }

    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::output(parent, e))?;
        }
        fs::write(path, self.render()).map_err(|e| Error::output(path, e))
    }
}

async fn step(
    channel: &mut CliChannel,
    profile: &OsProfile,
    command: &str,
    until: &[&str],
    timeout: Duration,
) -> Result<(ConfigStep, usize)> {
    channel.send_line(command).await?;
    match channel.read_until(until, timeout).await {
        Ok(reply) => {
            let response = format!("{}{}", reply.before, reply.matched);
            Ok((
                ConfigStep {
                    command: command.to_string(),
                    failure_message: profile.detect_failure(&response),
                    response,
                    termination: Termination::Prompt,
                },
                reply.index,
            ))
        }
        Err(Error::Interaction(InteractionError::Timeout { .. })) => {
            let response = channel.drain(Duration::ZERO).await;
            debug!("{:?} timed out; device said {:?}", command, response);
            Ok((
                ConfigStep {
                    command: command.to_string(),
                    failure_message: profile.detect_failure(&response),
                    response,
                    termination: Termination::Timeout,
                },
                0,
            ))
        }
        Err(e) => Err(e),
    }
}

/// RAII guard over a configuration push.
///
/// Dropping it while configuration mode is open logs a warning; the
/// device is not touched from `Drop`.
pub struct ConfigPush<'s> {
    session: &'s mut Session,
    transcript: ConfigTranscript,
    open: bool,
    committed: bool,
}

impl<'s> ConfigPush<'s> {
    pub(super) fn new(session: &'s mut Session) -> Self {
        let prompt = session
            .prompt()
            .map(|p| p.text().to_string())
            .unwrap_or_default();
        Self {
            session,
            transcript: ConfigTranscript {
                prompt,
                ..ConfigTranscript::default()
            },
            open: false,
            committed: false,
        }
    }

    pub fn transcript(&self) -> &ConfigTranscript {
        &self.transcript
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Enter configuration mode.
    pub async fn begin(&mut self) -> Result<()> {
        if self.open || self.transcript.entry.is_some() {
            return Err(Error::InvalidConfig {
                message: "configuration push already begun".to_string(),
            });
        }
        let result = match self.session.ready() {
            Ok(ctx) => {
                let suffix = ctx.profile.config_prompt_suffix.as_str();
                step(
                    ctx.channel,
                    ctx.profile,
                    &ctx.profile.config_enter,
                    &[suffix],
                    ctx.config.config_command_timeout,
                )
                .await
            }
            Err(e) => Err(e),
        };
        let (entry, _) = self.session.note(result)?;
        let command = entry.command.clone();
        let entered = entry.termination == Termination::Prompt;
        self.transcript.entry = Some(entry);
        self.open = true;

        if !entered {
            self.contain().await;
            return Err(InteractionError::ConfigCommandFailed { index: 0, command }.into());
        }
        debug!("Entered configuration mode");
        Ok(())
    }

    /// Send one configuration command and wait for the configuration
    /// prompt. A command that does not bring it back ends the push.
    pub async fn send(&mut self, command: &str) -> Result<&ConfigStep> {
        if !self.open {
            return Err(Error::InvalidConfig {
                message: format!("configuration push not open; {command:?} not sent"),
            });
        }
        let index = self.transcript.steps.len() + 1;
        let result = match self.session.ready() {
            Ok(ctx) => {
                let suffix = ctx.profile.config_prompt_suffix.as_str();
                step(
                    ctx.channel,
                    ctx.profile,
                    command,
                    &[suffix],
                    ctx.config.config_command_timeout,
                )
                .await
            }
            Err(e) => Err(e),
        };
        let (sent, _) = match self.session.note(result) {
            Ok(sent) => sent,
            Err(e) => {
                self.open = false;
                self.transcript.failed_at = Some(index);
                return Err(e);
            }
        };
        let timed_out = sent.termination == Termination::Timeout;
        if let Some(marker) = &sent.failure_message {
            warn!("Configuration command {} {:?} reported {}", index, command, marker);
        }
        self.transcript.steps.push(sent);

        if timed_out {
            warn!(
                "No configuration prompt after command {} {:?}; leaving configuration mode",
                index, command
            );
            self.transcript.failed_at = Some(index);
            self.contain().await;
            return Err(InteractionError::ConfigCommandFailed {
                index,
                command: command.to_string(),
            }
            .into());
        }
        let index = self.transcript.steps.len() - 1;
        Ok(&self.transcript.steps[index])
    }

    /// Leave configuration mode after the last command.
    pub async fn commit(&mut self) -> Result<()> {
        if !self.open {
            return Err(Error::InvalidConfig {
                message: "configuration push not open".to_string(),
            });
        }
        self.open = false;
        self.leave().await?;
        self.committed = true;
        info!(
            "Applied {} configuration commands",
            self.transcript.steps.len()
        );
        Ok(())
    }

    pub fn into_transcript(mut self) -> ConfigTranscript {
        std::mem::take(&mut self.transcript)
    }

    /// Best-effort exit after a failed step.
    async fn contain(&mut self) {
        self.open = false;
        if let Err(e) = self.leave().await {
            warn!("Unable to leave configuration mode: {}", e);
        }
    }

    /// Send the exit command and wait for a privileged prompt. The prompt
    /// is rediscovered when the hostname changed during the push.
    async fn leave(&mut self) -> Result<()> {
        let result = match self.session.ready() {
            Ok(ctx) => {
                let suffix = ctx.profile.config_prompt_suffix.as_str();
                let current = ctx.prompt.text().to_string();
                step(
                    ctx.channel,
                    ctx.profile,
                    &ctx.profile.config_exit,
                    &[suffix, "#"],
                    ctx.config.config_exit_timeout,
                )
                .await
                .map(|(exit, index)| (exit, index, current))
            }
            Err(e) => Err(e),
        };
        let (exit, index, current) = self.session.note(result)?;
        let command = exit.command.clone();
        let landed = landed_prompt(&exit.response);
        self.transcript.exit = Some(exit);

        match index {
            0 => Err(InteractionError::Timeout {
                waiting_for: "privileged prompt".to_string(),
                timeout: self.session.config().config_exit_timeout,
            }
            .into()),
            1 => Err(InteractionError::ConfigCommandFailed { index: 0, command }.into()),
            _ => {
                if landed != current {
                    debug!("Prompt changed from {:?} to {:?}", current, landed);
                    self.session.discover_prompt().await?;
                }
                Ok(())
            }
        }
    }
}

/// Prompt text at the end of an exit response.
fn landed_prompt(response: &str) -> String {
    let last = response
        .split(['\r', '\n'])
        .filter(|l| !l.trim().is_empty())
        .last()
        .unwrap_or_default();
    last.trim().to_string()
}

impl Drop for ConfigPush<'_> {
    fn drop(&mut self) {
        if self.open && !self.committed {
            warn!("ConfigPush dropped without commit; device may still be in configuration mode");
        }
    }
}

/// Ask whether to run in check mode. `None` when the operator cancels.
pub async fn ask_check_mode(operator: &dyn Operator) -> Option<bool> {
    let answer = operator
        .message(
            "Do you want to run this script in check mode? (Only compare configurations, no changes)",
            "Check Mode",
            Buttons::YesNoCancel,
        )
        .await;
    match answer {
        Button::Yes => Some(true),
        Button::No => Some(false),
        Button::Ok | Button::Cancel => None,
    }
}

/// The text a push of `commands` would send, one command per line.
pub fn render_proposed_config<S: AsRef<str>>(commands: &[S], profile: &OsProfile) -> String {
    let mut out = String::new();
    out.push_str(&profile.config_enter);
    out.push('\n');
    for command in commands {
        out.push_str(command.as_ref());
        out.push('\n');
    }
    out.push_str(&profile.config_exit);
    out.push('\n');
    out
}

impl Session {
    /// Guard for a manual push.
    pub fn config_push(&mut self) -> ConfigPush<'_> {
        ConfigPush::new(self)
    }

    /// Check mode: write the commands a push would send to `path`.
    pub fn propose_config<S: AsRef<str>>(
        &self,
        commands: &[S],
        path: impl AsRef<Path>,
    ) -> Result<()> {
        let path = path.as_ref();
        let text = render_proposed_config(commands, self.profile()?);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| Error::output(parent, e))?;
        }
        fs::write(path, text).map_err(|e| Error::output(path, e))?;
        info!("Proposed configuration written to {}", path.display());
        Ok(())
    }

    /// Push `commands` and write the transcript to `transcript_path`,
    /// whether or not the push succeeds.
    pub async fn send_config_commands<S: AsRef<str>>(
        &mut self,
        commands: &[S],
        transcript_path: impl AsRef<Path>,
    ) -> Result<ConfigTranscript> {
        let mut push = self.config_push();
        let outcome = apply(&mut push, commands).await;
        let transcript = push.into_transcript();

        let written = transcript.write_to(transcript_path.as_ref());
        outcome?;
        written?;
        Ok(transcript)
    }
}

async fn apply<S: AsRef<str>>(push: &mut ConfigPush<'_>, commands: &[S]) -> Result<()> {
    push.begin().await?;
    for command in commands {
        push.send(command.as_ref()).await?;
    }
    push.commit().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::prompt::PROBE;
    use crate::driver::session::tests::fast_config;
    use crate::operator::fixtures::CannedOperator;
    use crate::transport::ScriptedTransport;
    use crate::transport::fixtures::{probe_reply, typed};

    const ENTER_REPLY: &str =
        "configure terminal\r\nEnter configuration commands, one per line.  End with CNTL/Z.\r\nSW1(config)#";

    fn session_for(transport: ScriptedTransport, dir: &Path) -> Session {
        Session::attach(Box::new(transport), fast_config(dir)).unwrap()
    }

    #[tokio::test]
    async fn test_push_applies_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let t = ScriptedTransport::new()
            .on(PROBE, probe_reply("SW1#"))
            .on(typed("configure terminal"), ENTER_REPLY)
            .on(typed("interface Vlan10"), "interface Vlan10\r\nSW1(config-if)#")
            .on(typed("description users"), "description users\r\nSW1(config-if)#")
            .on(typed("end"), "end\r\nSW1#");
        let handle = t.handle();
        let mut session = session_for(t, dir.path());
        session.discover_prompt().await.unwrap();

        let path = dir.path().join("transcripts/SW1-config.txt");
        let transcript = session
            .send_config_commands(&["interface Vlan10", "description users"], &path)
            .await
            .unwrap();
        assert!(transcript.is_complete());
        assert_eq!(transcript.steps.len(), 2);
        assert_eq!(handle.remaining_rules(), 0);

        let written = fs::read_to_string(&path).unwrap();
        assert!(!written.contains('\r'));
        assert!(written.starts_with("SW1#configure terminal\n"));
        assert!(written.contains("SW1(config)#interface Vlan10\nSW1(config-if)#description users"));
        assert!(written.ends_with("end\nSW1#"));
    }

    #[tokio::test]
    async fn test_push_stops_at_failing_command() {
        let dir = tempfile::tempdir().unwrap();
        let t = ScriptedTransport::new()
            .on(PROBE, probe_reply("SW1#"))
            .on(typed("configure terminal"), ENTER_REPLY)
            .on(typed("interface Vlan10"), "interface Vlan10\r\nSW1(config-if)#")
            .on(typed("description users"), "description users\r\nSW1(config-if)#")
            .on(typed("spanning-tree bogus"), "spanning-tree bogus\r\n")
            .on(typed("end"), "end\r\nSW1#");
        let handle = t.handle();
        let mut session = session_for(t, dir.path());
        session.discover_prompt().await.unwrap();

        let commands = ["interface Vlan10", "description users", "spanning-tree bogus", "shutdown"];
        let path = dir.path().join("transcript.txt");
        let err = session
            .send_config_commands(&commands, &path)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Interaction(InteractionError::ConfigCommandFailed { index: 3, .. })
        ));
        assert!(!err.is_fatal_to_session());

        // The fourth command is never sent; containment exits once
        let sent = handle.sent();
        assert!(!sent.contains("shutdown"));
        assert_eq!(sent.matches("end\n").count(), 1);
        assert_eq!(handle.remaining_rules(), 0);

        let written = fs::read_to_string(&path).unwrap();
        assert!(written.contains("spanning-tree bogus"));
    }

    #[tokio::test]
    async fn test_transcript_records_failed_step() {
        let dir = tempfile::tempdir().unwrap();
        let t = ScriptedTransport::new()
            .on(PROBE, probe_reply("SW1#"))
            .on(typed("configure terminal"), ENTER_REPLY)
            .on(typed("ntp server 10.0.0.1"), "ntp server 10.0.0.1\r\nSW1(config)#")
            .on(typed("ntp bogus"), "ntp bogus\r\n")
            .on(typed("end"), "end\r\nSW1#");
        let mut session = session_for(t, dir.path());
        session.discover_prompt().await.unwrap();

        let mut push = session.config_push();
        push.begin().await.unwrap();
        push.send("ntp server 10.0.0.1").await.unwrap();
        assert!(push.send("ntp bogus").await.is_err());
        assert!(!push.is_open());

        // A closed push refuses further commands
        assert!(push.send("ntp server 10.0.0.2").await.is_err());

        let transcript = push.into_transcript();
        assert_eq!(transcript.failed_at, Some(2));
        assert_eq!(transcript.steps.len(), 2);
        assert_eq!(transcript.steps[1].termination, Termination::Timeout);
        assert!(transcript.exit.is_some());
        assert!(!transcript.is_complete());
    }

    #[tokio::test]
    async fn test_hostname_change_rediscovers_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let t = ScriptedTransport::new()
            .on(PROBE, probe_reply("SW1#"))
            .on(typed("configure terminal"), ENTER_REPLY)
            .on(typed("hostname SW2"), "hostname SW2\r\nSW2(config)#")
            .on(typed("end"), "end\r\nSW2#")
            .on(PROBE, probe_reply("SW2#"));
        let mut session = session_for(t, dir.path());
        session.discover_prompt().await.unwrap();

        let mut push = session.config_push();
        push.begin().await.unwrap();
        push.send("hostname SW2").await.unwrap();
        push.commit().await.unwrap();
        drop(push);
        assert_eq!(session.hostname(), Some("SW2"));
    }

    #[test]
    fn test_render_proposed_config() {
        let profile = crate::platform::vendors::cisco_ios::ios().unwrap();
        let text = render_proposed_config(&["ip domain-lookup", "ip name-server 10.0.0.53"], &profile);
        assert_eq!(
            text,
            "configure terminal\nip domain-lookup\nip name-server 10.0.0.53\nend\n"
        );
    }

    #[tokio::test]
    async fn test_check_mode_never_touches_device() {
        let dir = tempfile::tempdir().unwrap();
        let t = ScriptedTransport::new().on(PROBE, probe_reply("SW1#"));
        let handle = t.handle();
        let mut session = session_for(t, dir.path());
        session.discover_prompt().await.unwrap();

        let operator = CannedOperator::default().with_button(Button::Yes);
        assert_eq!(ask_check_mode(&operator).await, Some(true));

        let path = session.create_output_filename("PROPOSED_CONFIG", ".txt");
        session.propose_config(&["logging host 10.0.0.9"], &path).unwrap();
        assert_eq!(handle.sent(), PROBE);
        assert!(fs::read_to_string(&path).unwrap().contains("logging host 10.0.0.9\n"));
    }

    #[tokio::test]
    async fn test_check_mode_answers() {
        let no = CannedOperator::default().with_button(Button::No);
        assert_eq!(ask_check_mode(&no).await, Some(false));
        let cancel = CannedOperator::default();
        assert_eq!(ask_check_mode(&cancel).await, None);
        assert_eq!(cancel.asked(), vec!["Check Mode"]);
    }
}
