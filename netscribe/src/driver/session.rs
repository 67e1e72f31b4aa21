//! One automated CLI session with one device.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use log::{debug, info, warn};
use secrecy::SecretString;

use super::exchange::{self, ExchangeTimeouts, consume_echo};
use super::jump::HopFrame;
use super::privilege::{EnableNegotiator, EnableOptions};
use super::prompt::{self, Prompt};
use super::response::{CapturedOutput, CommandRecord};
use super::sink::{FileSink, MemorySink, OutputSink};
use super::terminal;
use crate::channel::CliChannel;
use crate::config::SessionConfig;
use crate::error::{ConnectError, Error, InteractionError, Result, UnsupportedOsError};
use crate::extract::{RawOutputExtractor, RawSource};
use crate::naming::OutputNamer;
use crate::operator::{NoOperator, Operator};
use crate::platform::{NetworkOs, OsProfile, ProfileRegistry, TerminalParams, classify_banner};
use crate::transport::Transport;

/// Borrowed view of everything an exchange needs.
pub(super) struct Ctx<'a> {
    pub channel: &'a mut CliChannel,
    pub profile: &'a OsProfile,
    pub prompt: &'a Prompt,
    pub config: &'a SessionConfig,
}

impl Ctx<'_> {
    pub fn timeouts(&self) -> ExchangeTimeouts {
        ExchangeTimeouts {
            echo: self.config.echo_timeout,
            read: self.config.read_timeout,
        }
    }
}

pub(super) fn resolve_profile(profiles: &ProfileRegistry, os: NetworkOs) -> Result<&OsProfile> {
    profiles.resolve(os).ok_or_else(|| Error::InvalidConfig {
        message: format!("no profile registered for {os} and no fallback"),
    })
}

/// A logical connection to one device, directly or through jump hosts.
///
/// The session owns its transport. Every operation runs to completion,
/// failure or timeout before the next one starts.
///
/// # Example
///
/// ```rust,no_run
/// use futures_util::FutureExt;
/// use netscribe::{Session, SessionConfig};
/// use netscribe::transport::ScriptedTransport;
///
/// # async fn example() -> Result<(), netscribe::Error> {
/// let transport = ScriptedTransport::new();
/// let mut session = Session::attach(Box::new(transport), SessionConfig::default())?;
/// let clock = session
///     .run(|s| async move { s.get_output("show clock").await }.boxed())
///     .await?;
/// println!("{clock}");
/// session.disconnect().await?;
/// # Ok(())
/// # }
/// ```
pub struct Session {
    pub(super) channel: Option<CliChannel>,
    pub(super) config: SessionConfig,
    pub(super) profiles: ProfileRegistry,
    pub(super) operator: Arc<dyn Operator>,
    pub(super) enable_secret: Option<SecretString>,
    pub(super) prompt: Option<Prompt>,
    pub(super) os: NetworkOs,
    /// Captured values awaiting restore on the current hop.
    pub(super) terminal: Option<TerminalParams>,
    pub(super) hops: Vec<HopFrame>,
    namer: OutputNamer,
    started: bool,
    failed: bool,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("prompt", &self.prompt)
            .field("os", &self.os)
            .field("terminal", &self.terminal)
            .field("hops", &self.hops.len())
            .field("started", &self.started)
            .field("failed", &self.failed)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Wrap an already-open transport.
    pub fn attach(transport: Box<dyn Transport>, config: SessionConfig) -> Result<Self> {
        config.validate()?;
        let channel = CliChannel::new(transport, config.line_ending.clone());
        Ok(Self {
            channel: Some(channel),
            namer: OutputNamer::new(&config.date_format),
            config,
            profiles: ProfileRegistry::builtin()?,
            operator: Arc::new(NoOperator),
            enable_secret: None,
            prompt: None,
            os: NetworkOs::Unknown,
            terminal: None,
            hops: Vec::new(),
            started: false,
            failed: false,
        })
    }

    pub fn with_operator(mut self, operator: Arc<dyn Operator>) -> Self {
        self.operator = operator;
        self
    }

    pub fn with_enable_secret(mut self, secret: impl Into<String>) -> Self {
        self.enable_secret = Some(SecretString::from(secret.into()));
        self
    }

    /// Replace the per-family profiles this session uses.
    pub fn with_profiles(mut self, profiles: ProfileRegistry) -> Self {
        self.profiles = profiles;
        self
    }

    pub fn with_namer(mut self, namer: OutputNamer) -> Self {
        self.namer = namer;
        self
    }

    pub fn prompt(&self) -> Option<&Prompt> {
        self.prompt.as_ref()
    }

    pub fn hostname(&self) -> Option<&str> {
        self.prompt.as_ref().map(Prompt::hostname)
    }

    /// Classified OS of the current hop.
    pub fn os(&self) -> NetworkOs {
        self.os
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn namer(&self) -> &OutputNamer {
        &self.namer
    }

    /// Profile for the current hop's OS.
    pub fn profile(&self) -> Result<&OsProfile> {
        resolve_profile(&self.profiles, self.os)
    }

    /// Captured terminal values not yet restored.
    pub fn pending_terminal_restore(&self) -> Option<TerminalParams> {
        self.terminal
    }

    pub fn is_connected(&self) -> bool {
        self.channel.as_ref().is_some_and(CliChannel::is_connected)
    }

    /// Whether a fatal failure stopped the session.
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub fn hop_depth(&self) -> usize {
        self.hops.len()
    }

    pub(super) fn ready(&mut self) -> Result<Ctx<'_>> {
        let Session {
            channel,
            config,
            profiles,
            prompt,
            os,
            failed,
            ..
        } = &mut *self;
        if *failed {
            return Err(InteractionError::SessionFailed.into());
        }
        let channel = channel.as_mut().ok_or(InteractionError::NotConnected)?;
        let prompt = prompt.as_ref().ok_or(InteractionError::NotStarted)?;
        let profile = resolve_profile(profiles, *os)?;
        Ok(Ctx {
            channel,
            profile,
            prompt,
            config,
        })
    }

    pub(super) fn channel_mut(&mut self) -> Result<&mut CliChannel> {
        if self.failed {
            return Err(InteractionError::SessionFailed.into());
        }
        self.channel
            .as_mut()
            .ok_or_else(|| InteractionError::NotConnected.into())
    }

    /// Mark the session failed when `result` carries a fatal error.
    pub(super) fn note<T>(&mut self, result: Result<T>) -> Result<T> {
        if let Err(e) = &result
            && e.is_fatal_to_session()
            && !self.failed
        {
            warn!("Session failed: {}", e);
            self.failed = true;
        }
        result
    }

    /// Learn the current prompt, replacing any previous one.
    pub async fn discover_prompt(&mut self) -> Result<&Prompt> {
        let timeout = self.config.probe_timeout;
        let result = match self.channel_mut() {
            Ok(channel) => prompt::discover(channel, timeout).await,
            Err(e) => Err(e),
        };
        let discovered = self.note(result)?;
        Ok(self.prompt.insert(discovered))
    }

    /// Prepare the session: discover the prompt, enter enable mode,
    /// classify the OS and normalise the terminal.
    pub async fn start(&mut self) -> Result<()> {
        if self.started {
            return Ok(());
        }
        self.discover_prompt().await?;
        self.enable().await?;
        self.classify_os().await?;
        if self.config.modify_terminal {
            self.normalize_terminal().await?;
        }
        self.started = true;
        info!(
            "Session started on {} ({})",
            self.hostname().unwrap_or_default(),
            self.os
        );
        Ok(())
    }

    /// Restore the terminal captured by [`start`](Self::start).
    pub async fn end(&mut self) -> Result<()> {
        self.started = false;
        self.restore_terminal().await
    }

    /// Run `work` between [`start`](Self::start) and [`end`](Self::end).
    ///
    /// `end` runs on every path, including when `start` or `work` fails;
    /// the first error wins.
    pub async fn run<T, F>(&mut self, work: F) -> Result<T>
    where
        F: for<'s> FnOnce(&'s mut Session) -> BoxFuture<'s, Result<T>>,
    {
        if let Err(e) = self.start().await {
            if let Err(end_err) = self.end().await {
                debug!("Cleanup after failed start also failed: {}", end_err);
            }
            return Err(e);
        }

        let outcome = work(self).await;
        let ended = self.end().await;
        match outcome {
            Ok(value) => ended.map(|()| value),
            Err(e) => {
                if let Err(end_err) = ended {
                    warn!("Terminal restore after failure also failed: {}", end_err);
                }
                Err(e)
            }
        }
    }

    /// Elevate to privileged mode if the prompt is restricted.
    pub async fn enable(&mut self) -> Result<()> {
        let mut negotiator = EnableNegotiator::new();
        let result = {
            let Session {
                channel,
                config,
                profiles,
                operator,
                enable_secret,
                prompt,
                os,
                failed,
                ..
            } = &mut *self;
            if *failed {
                return Err(InteractionError::SessionFailed.into());
            }
            let channel = channel.as_mut().ok_or(InteractionError::NotConnected)?;
            let current = prompt.as_ref().ok_or(InteractionError::NotStarted)?;
            let profile = resolve_profile(profiles, *os)?;
            let options = EnableOptions {
                operator: operator.as_ref(),
                prompt_for_secret: config.prompt_for_enable,
                echo_timeout: config.echo_timeout,
                response_timeout: config.response_timeout,
                probe_timeout: config.probe_timeout,
            };
            negotiator
                .negotiate(channel, profile, current, enable_secret, options)
                .await
        };
        let elevated = self.note(result)?;
        self.prompt = Some(elevated);
        Ok(())
    }

    /// Query the version banner and classify the current hop.
    pub async fn classify_os(&mut self) -> Result<NetworkOs> {
        let command = self.config.version_command.clone();
        let banner = self.get_output(&command).await?;
        self.os = classify_banner(&banner);
        info!(
            "{} classified as {}",
            self.hostname().unwrap_or_default(),
            self.os
        );
        Ok(self.os)
    }

    /// Fail unless the classified OS is one of `supported`.
    pub fn validate_os(&self, supported: &[NetworkOs]) -> Result<()> {
        if supported.contains(&self.os) {
            Ok(())
        } else {
            Err(UnsupportedOsError {
                os: self.os,
                supported: supported.to_vec(),
            }
            .into())
        }
    }

    /// Capture terminal settings and disable pagination. A no-op when the
    /// current hop's settings are already captured.
    ///
    /// The captured values are kept for restore before any setting is
    /// changed, so a failure halfway through still gets restored by
    /// [`end`](Self::end).
    pub async fn normalize_terminal(&mut self) -> Result<()> {
        if self.terminal.is_some() {
            return Ok(());
        }
        let captured = match self.ready() {
            Ok(ctx) => {
                let timeouts = ctx.timeouts();
                terminal::capture(ctx.channel, ctx.profile, ctx.prompt.text(), timeouts).await
            }
            Err(e) => Err(e),
        };
        self.terminal = Some(self.note(captured)?);

        let result = match self.ready() {
            Ok(ctx) => {
                let timeouts = ctx.timeouts();
                terminal::normalize(ctx.channel, ctx.profile, ctx.prompt.text(), timeouts).await
            }
            Err(e) => Err(e),
        };
        self.note(result)
    }

    /// Restore captured settings on the current hop. Runs at most once per
    /// capture.
    pub async fn restore_terminal(&mut self) -> Result<()> {
        let Some(params) = self.terminal.take() else {
            return Ok(());
        };
        let result = match self.ready() {
            Ok(ctx) => {
                let timeouts = ctx.timeouts();
                terminal::restore(ctx.channel, ctx.profile, ctx.prompt.text(), &params, timeouts)
                    .await
            }
            Err(e) => Err(e),
        };
        if let Err(e) = &result {
            warn!("Terminal parameters {:?} not restored: {}", params, e);
        }
        self.note(result)
    }

    /// Run `command`, streaming its output lines into `sink`.
    pub async fn execute(
        &mut self,
        command: &str,
        sink: &mut dyn OutputSink,
    ) -> Result<CommandRecord> {
        let result = match self.ready() {
            Ok(ctx) => {
                let timeouts = ctx.timeouts();
                exchange::execute(ctx.channel, ctx.profile, ctx.prompt.text(), command, sink, timeouts)
                    .await
            }
            Err(e) => Err(e),
        };
        let record = self.note(result)?;
        if let Some(marker) = &record.failure_message {
            warn!("{:?} reported failure ({})", command, marker);
        }
        Ok(record)
    }

    /// Run `command` and keep its output in memory.
    pub async fn send_command(&mut self, command: &str) -> Result<CommandRecord> {
        let mut sink = MemorySink::new();
        let mut record = self.execute(command, &mut sink).await?;
        record.output = CapturedOutput::Text(sink.into_text());
        Ok(record)
    }

    /// Output of a small command as one string.
    pub async fn get_output(&mut self, command: &str) -> Result<String> {
        let record = self.send_command(command).await?;
        Ok(match record.output {
            CapturedOutput::Text(text) => text,
            _ => String::new(),
        })
    }

    /// Capture `command` straight to `path`, creating parent directories.
    pub async fn write_output_to_file(
        &mut self,
        command: &str,
        path: impl AsRef<Path>,
    ) -> Result<CommandRecord> {
        let path = path.as_ref();
        let mut sink = FileSink::create(path)?;
        let mut record = self.execute(command, &mut sink).await?;
        record.output = CapturedOutput::File(path.to_path_buf());
        Ok(record)
    }

    /// Capture `command` to a temporary file and read it back.
    ///
    /// The file is deleted afterwards, or moved to the debug directory in
    /// debug mode.
    pub async fn get_command_output(&mut self, command: &str) -> Result<String> {
        let path = self.temp_capture_path(command);
        let captured = self.write_output_to_file(command, &path).await;
        let text = captured.and_then(|_| {
            fs::read_to_string(&path).map_err(|e| Error::output(&path, e))
        });
        self.dispose_temp(&path);
        text
    }

    /// Capture `command` to a temporary file and hand it to `extractor`.
    pub async fn capture_and_extract(
        &mut self,
        command: &str,
        template: &str,
        extractor: &dyn RawOutputExtractor,
    ) -> Result<Vec<Vec<String>>> {
        let path = self.temp_capture_path(command);
        let captured = self.write_output_to_file(command, &path).await;
        let rows = captured.and_then(|_| {
            extractor
                .extract(RawSource::File(&path), template)
                .map_err(|source| Error::Extract {
                    template: template.to_string(),
                    source,
                })
        });
        self.dispose_temp(&path);
        rows
    }

    /// `<output_dir>/<hostname>-<desc>-<timestamp><ext>` for this device.
    pub fn create_output_filename(&self, desc: &str, ext: &str) -> PathBuf {
        self.namer.path(
            &self.config.output_dir,
            self.hostname().unwrap_or_default(),
            desc,
            ext,
        )
    }

    fn temp_capture_path(&self, command: &str) -> PathBuf {
        self.create_output_filename(&format!("{command}-temp"), ".txt")
    }

    fn dispose_temp(&self, path: &Path) {
        if !path.exists() {
            return;
        }
        if self.config.debug_mode {
            let Some(name) = path.file_name() else {
                return;
            };
            let target = self.config.debug_dir.join(name);
            let moved = fs::create_dir_all(&self.config.debug_dir)
                .and_then(|()| fs::rename(path, &target));
            match moved {
                Ok(()) => debug!("Kept capture at {}", target.display()),
                Err(e) => warn!("Unable to move {} to {}: {}", path.display(), target.display(), e),
            }
        } else if let Err(e) = fs::remove_file(path) {
            warn!("Unable to delete {}: {}", path.display(), e);
        }
    }

    /// Persist the running configuration, confirming the destination.
    pub async fn save(&mut self) -> Result<String> {
        let result = match self.ready() {
            Ok(ctx) => save_running_config(ctx).await,
            Err(e) => Err(e),
        };
        self.note(result)
    }

    /// Leave the device and release the transport.
    ///
    /// Active hops are unwound and the terminal restored first. If the exit
    /// command does not close the connection within the grace period, the
    /// transport is closed forcibly a bounded number of times.
    pub async fn disconnect(&mut self) -> Result<()> {
        if self.channel.is_none() {
            return Ok(());
        }
        if !self.failed {
            while !self.hops.is_empty() {
                if let Err(e) = self.unhop().await {
                    warn!("Unable to unwind jump hop: {}", e);
                    break;
                }
            }
            if let Err(e) = self.end().await {
                warn!("Unable to restore terminal before disconnect: {}", e);
            }
        }
        if let Some(params) = self.terminal.take() {
            warn!("Disconnecting with terminal parameters {:?} unrestored", params);
        }

        let attempts = self.config.force_disconnect_attempts;
        let interval = self.config.force_disconnect_interval;
        let grace = self.config.disconnect_grace;
        let bound = self.config.response_timeout;
        let Some(mut channel) = self.channel.take() else {
            return Ok(());
        };
        self.prompt = None;
        self.hops.clear();
        self.started = false;

        if let Err(e) = channel.send_line(&self.config.disconnect_command).await {
            debug!("Exit command not sent: {}", e);
        }
        let _ = tokio::time::timeout(bound, channel.drain(grace)).await;

        let mut forced = 0;
        while channel.is_connected() && forced < attempts {
            forced += 1;
            debug!("Forcing disconnect, attempt {} of {}", forced, attempts);
            if let Err(e) = channel.disconnect().await {
                debug!("Forced disconnect failed: {}", e);
            }
            if channel.is_connected() {
                tokio::time::sleep(interval).await;
            }
        }

        if channel.is_connected() {
            return Err(ConnectError::DisconnectFailed { attempts }.into());
        }
        info!("Disconnected");
        Ok(())
    }
}

async fn save_running_config(ctx: Ctx<'_>) -> Result<String> {
    let profile = ctx.profile;
    let timeout = ctx.config.response_timeout;
    ctx.channel.send_line(&profile.save_command).await?;
    consume_echo(ctx.channel, &profile.save_command, ctx.config.echo_timeout).await?;

    let reply = ctx
        .channel
        .read_until(&[profile.save_confirm.as_str(), ctx.prompt.text()], timeout)
        .await?;
    let confirm = reply.is(1);
    let mut transcript = reply.before;
    if confirm {
        transcript.push_str(&reply.matched);
        ctx.channel.send_line("").await?;
        transcript.push_str(&ctx.channel.wait_for(ctx.prompt.text(), timeout).await?);
    }
    info!("Saved running configuration");
    Ok(transcript)
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.channel.is_some()
            && let Some(params) = self.terminal
        {
            warn!(
                "Session for {} dropped with terminal parameters {:?} unrestored",
                self.hostname().unwrap_or("<unknown>"),
                params
            );
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::time::Duration;

    use futures_util::FutureExt;

    use super::*;
    use crate::transport::ScriptedTransport;
    use crate::transport::fixtures::{command_reply, probe_reply, typed};

    pub(crate) fn fast_config(output_dir: &Path) -> SessionConfig {
        SessionConfig {
            read_timeout: Duration::from_millis(200),
            response_timeout: Duration::from_millis(200),
            probe_timeout: Duration::from_millis(200),
            config_command_timeout: Duration::from_millis(200),
            config_exit_timeout: Duration::from_millis(200),
            echo_timeout: Duration::from_millis(200),
            disconnect_grace: Duration::from_millis(20),
            force_disconnect_attempts: 3,
            force_disconnect_interval: Duration::from_millis(5),
            output_dir: output_dir.to_path_buf(),
            debug_dir: output_dir.join("debugs"),
            ..SessionConfig::default()
        }
    }

    fn reply(t: ScriptedTransport, command: &str, lines: &[&str], prompt: &str) -> ScriptedTransport {
        t.on(typed(command), command_reply(command, lines, prompt))
    }

    /// Privileged IOS switch up to the end of `start()`.
    fn started_ios() -> ScriptedTransport {
        let t = ScriptedTransport::new().on(prompt::PROBE, probe_reply("SW1#"));
        let t = reply(
            t,
            "show version | i Cisco",
            &["Cisco IOS Software, C3750 Software (C3750-IPSERVICESK9-M), Version 12.2(55)SE"],
            "SW1#",
        );
        let t = reply(t, "show terminal | i Length", &["Length: 24 lines, Width: 80 columns"], "SW1#");
        let t = reply(t, "terminal length 0", &[], "SW1#");
        reply(t, "terminal width 0", &[], "SW1#")
    }

    fn restore_ios(t: ScriptedTransport) -> ScriptedTransport {
        let t = reply(t, "terminal length 24", &[], "SW1#");
        reply(t, "terminal width 80", &[], "SW1#")
    }

    #[tokio::test]
    async fn test_start_and_end() {
        let dir = tempfile::tempdir().unwrap();
        let t = reply(started_ios(), "show clock", &["12:00:00 UTC"], "SW1#");
        let t = restore_ios(t);
        let handle = t.handle();
        let mut session = Session::attach(Box::new(t), fast_config(dir.path())).unwrap();

        session.start().await.unwrap();
        assert_eq!(session.os(), NetworkOs::Ios);
        assert_eq!(session.hostname(), Some("SW1"));
        assert_eq!(
            session.pending_terminal_restore(),
            Some(TerminalParams { length: Some(24), width: Some(80) })
        );

        assert_eq!(session.get_output("show clock").await.unwrap(), "12:00:00 UTC");

        session.end().await.unwrap();
        assert_eq!(session.pending_terminal_restore(), None);
        assert_eq!(handle.remaining_rules(), 0);

        // A second end restores nothing
        session.end().await.unwrap();
        assert!(handle.sent().ends_with("terminal length 24\nterminal width 80\n"));
    }

    #[tokio::test]
    async fn test_run_restores_after_failure() {
        let dir = tempfile::tempdir().unwrap();
        let t = restore_ios(started_ios());
        let handle = t.handle();
        let mut session = Session::attach(Box::new(t), fast_config(dir.path())).unwrap();

        let err = session
            .run(|s| async move { s.get_output("show tech-support").await }.boxed())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Interaction(InteractionError::EchoNotSeen { .. })
        ));
        assert_eq!(handle.remaining_rules(), 0);
        assert_eq!(session.pending_terminal_restore(), None);
        assert!(!session.is_failed());
    }

    #[tokio::test]
    async fn test_partial_normalize_is_still_restored() {
        let dir = tempfile::tempdir().unwrap();
        let t = ScriptedTransport::new().on(prompt::PROBE, probe_reply("SW1#"));
        let t = reply(
            t,
            "show version | i Cisco",
            &["Cisco IOS Software, C3750 Software (C3750-IPSERVICESK9-M), Version 12.2(55)SE"],
            "SW1#",
        );
        let t = reply(t, "show terminal | i Length", &["Length: 24 lines, Width: 80 columns"], "SW1#");
        let t = reply(t, "terminal length 0", &[], "SW1#");
        // The device never answers the width change
        let t = t.on(typed("terminal width 0"), "");
        let t = restore_ios(t);
        let handle = t.handle();
        let mut session = Session::attach(Box::new(t), fast_config(dir.path())).unwrap();

        let err = session
            .run(|s| async move { s.get_output("show clock").await }.boxed())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Interaction(InteractionError::EchoNotSeen { .. })
        ));
        assert_eq!(session.pending_terminal_restore(), None);
        assert_eq!(handle.remaining_rules(), 0);
        assert!(handle.sent().ends_with("terminal length 24\nterminal width 80\n"));
    }

    #[tokio::test]
    async fn test_enable_failure_stops_session() {
        let dir = tempfile::tempdir().unwrap();
        let t = ScriptedTransport::new()
            .on(prompt::PROBE, probe_reply("SW1>"))
            .on(typed("enable"), "enable\r\n% No password set\r\nSW1>");
        let handle = t.handle();
        let mut session = Session::attach(Box::new(t), fast_config(dir.path())).unwrap();

        let err = session.start().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Interaction(InteractionError::EnableFailed { .. })
        ));
        assert!(session.is_failed());

        let err = session.get_output("show clock").await.unwrap_err();
        assert!(matches!(
            err,
            Error::Interaction(InteractionError::SessionFailed)
        ));
        assert_eq!(handle.sent(), format!("{}enable\n", prompt::PROBE));
    }

    #[tokio::test]
    async fn test_commands_need_a_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let mut session =
            Session::attach(Box::new(ScriptedTransport::new()), fast_config(dir.path())).unwrap();
        let err = session.get_output("show clock").await.unwrap_err();
        assert!(matches!(err, Error::Interaction(InteractionError::NotStarted)));
    }

    #[tokio::test]
    async fn test_validate_os() {
        let dir = tempfile::tempdir().unwrap();
        let t = ScriptedTransport::new().on(prompt::PROBE, probe_reply("fw1#"));
        let t = reply(
            t,
            "show version | i Cisco",
            &["Cisco Adaptive Security Appliance Software Version 9.8(2)"],
            "fw1#",
        );
        let mut session = Session::attach(Box::new(t), fast_config(dir.path())).unwrap();
        session.discover_prompt().await.unwrap();
        assert_eq!(session.classify_os().await.unwrap(), NetworkOs::Asa);

        assert!(session.validate_os(&[NetworkOs::Asa]).is_ok());
        let err = session
            .validate_os(&[NetworkOs::Ios, NetworkOs::IosXe])
            .unwrap_err();
        assert!(matches!(err, Error::UnsupportedOs(ref e) if e.os == NetworkOs::Asa));
        assert!(!err.is_fatal_to_session());
    }

    #[tokio::test]
    async fn test_write_output_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let t = ScriptedTransport::new().on(prompt::PROBE, probe_reply("SW1#"));
        let t = reply(t, "show run", &["hostname SW1", "interface Vlan1"], "SW1#");
        let mut session = Session::attach(Box::new(t), fast_config(dir.path())).unwrap();
        session.discover_prompt().await.unwrap();

        let path = dir.path().join("captures/SW1-show run.txt");
        let record = session.write_output_to_file("show run", &path).await.unwrap();
        assert_eq!(record.lines, 2);
        assert_eq!(record.output, CapturedOutput::File(path.clone()));
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "hostname SW1\r\ninterface Vlan1\r\n"
        );
    }

    #[tokio::test]
    async fn test_get_command_output_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let t = ScriptedTransport::new().on(prompt::PROBE, probe_reply("SW1#"));
        let t = reply(t, "show ip int brief", &["Vlan1 10.0.0.1 YES up up"], "SW1#");
        let mut session = Session::attach(Box::new(t), fast_config(dir.path()))
            .unwrap()
            .with_namer(OutputNamer::with_timestamp("ts"));
        session.discover_prompt().await.unwrap();

        let text = session.get_command_output("show ip int brief").await.unwrap();
        assert_eq!(text, "Vlan1 10.0.0.1 YES up up\r\n");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_debug_mode_keeps_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let t = ScriptedTransport::new().on(prompt::PROBE, probe_reply("SW1#"));
        let t = reply(t, "show clock", &["12:00:00 UTC"], "SW1#");
        let config = SessionConfig {
            debug_mode: true,
            ..fast_config(dir.path())
        };
        let mut session = Session::attach(Box::new(t), config)
            .unwrap()
            .with_namer(OutputNamer::with_timestamp("ts"));
        session.discover_prompt().await.unwrap();

        session.get_command_output("show clock").await.unwrap();
        let kept = dir.path().join("debugs/SW1-show clock-temp-ts.txt");
        assert!(kept.exists());
    }

    #[tokio::test]
    async fn test_capture_and_extract() {
        struct CountLines;
        impl RawOutputExtractor for CountLines {
            fn extract(
                &self,
                source: RawSource<'_>,
                template: &str,
            ) -> std::result::Result<Vec<Vec<String>>, Box<dyn std::error::Error + Send + Sync>>
            {
                let text = source.read()?;
                Ok(text
                    .lines()
                    .map(|l| vec![template.to_string(), l.to_string()])
                    .collect())
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let t = ScriptedTransport::new().on(prompt::PROBE, probe_reply("SW1#"));
        let t = reply(t, "show vlan", &["1 default", "10 users"], "SW1#");
        let mut session = Session::attach(Box::new(t), fast_config(dir.path())).unwrap();
        session.discover_prompt().await.unwrap();

        let rows = session
            .capture_and_extract("show vlan", "cisco_ios_show_vlan", &CountLines)
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], vec!["cisco_ios_show_vlan", "10 users"]);
    }

    #[tokio::test]
    async fn test_save_answers_confirmation() {
        let dir = tempfile::tempdir().unwrap();
        let t = ScriptedTransport::new().on(prompt::PROBE, probe_reply("SW1#"));
        let t = t
            .on(
                typed("copy running-config startup-config"),
                "copy running-config startup-config\r\nDestination filename [startup-config]? ",
            )
            .on("\n", "\r\nBuilding configuration...\r\n[OK]\r\nSW1#");
        let handle = t.handle();
        let mut session = Session::attach(Box::new(t), fast_config(dir.path())).unwrap();
        session.discover_prompt().await.unwrap();

        let transcript = session.save().await.unwrap();
        assert!(transcript.contains("[OK]"));
        assert_eq!(handle.remaining_rules(), 0);
    }

    #[tokio::test]
    async fn test_graceful_disconnect() {
        let dir = tempfile::tempdir().unwrap();
        let t = ScriptedTransport::new()
            .on(prompt::PROBE, probe_reply("SW1#"))
            .on_then_close("exit\n", "exit\r\n");
        let handle = t.handle();
        let mut session = Session::attach(Box::new(t), fast_config(dir.path())).unwrap();
        session.discover_prompt().await.unwrap();

        session.disconnect().await.unwrap();
        assert!(!session.is_connected());
        assert_eq!(handle.disconnect_calls(), 0);
        // Disconnecting twice is harmless
        session.disconnect().await.unwrap();
    }

    #[tokio::test]
    async fn test_forced_disconnect_gives_up() {
        let dir = tempfile::tempdir().unwrap();
        let t = ScriptedTransport::new().ignore_disconnect();
        let handle = t.handle();
        let mut session = Session::attach(Box::new(t), fast_config(dir.path())).unwrap();

        let err = session.disconnect().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Connect(ConnectError::DisconnectFailed { attempts: 3 })
        ));
        assert_eq!(handle.disconnect_calls(), 3);
    }
}
