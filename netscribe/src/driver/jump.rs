//! Jump-host chaining.
//!
//! A hop is opened by typing an `ssh` or `telnet` client command into the
//! current device. The previous prompt, OS and pending terminal restore are
//! pushed on a stack and come back, strictly in reverse order, on
//! [`Session::unhop`].

use std::fmt;

use log::{debug, info, warn};

use super::prompt::Prompt;
use super::session::Session;
use crate::error::{ConnectError, Error, InteractionError, Result};
use crate::platform::{NetworkOs, TerminalParams};
use crate::transport::Credentials;

const SSH_REPLIES: [&str; 3] = ["assword", "refused", "denied"];
const TELNET_REPLIES: [&str; 4] = ["sername", "assword", "refused", "denied"];

/// Client used to reach the next hop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HopProtocol {
    Ssh,
    Telnet,
}

impl fmt::Display for HopProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            HopProtocol::Ssh => "SSH",
            HopProtocol::Telnet => "Telnet",
        })
    }
}

/// State of the hop we came from.
#[derive(Debug, Clone)]
pub(super) struct HopFrame {
    pub prompt: Prompt,
    pub os: NetworkOs,
    pub terminal: Option<TerminalParams>,
    pub protocol: HopProtocol,
    pub host: String,
}

/// Last non-empty line of `before` followed by `matched`.
fn refusal_reason(before: &str, matched: &str) -> String {
    let line = before
        .split(['\r', '\n'])
        .filter(|l| !l.trim().is_empty())
        .last()
        .unwrap_or_default();
    format!("{}{}", line.trim_start(), matched)
}

impl Session {
    /// Reach `host` from the current device and make it the current hop.
    ///
    /// The new hop is probed for its prompt, elevated and classified. Its
    /// terminal is normalised when `modify_terminal` is set. A refusal or
    /// denial leaves the session on the current hop and returns
    /// [`ConnectError::Refused`].
    pub async fn hop_via(
        &mut self,
        host: &str,
        protocol: HopProtocol,
        credentials: &Credentials,
    ) -> Result<&Prompt> {
        let Some(password) = credentials.password_text() else {
            return Err(Error::InvalidConfig {
                message: format!("hop to {host} needs password credentials"),
            });
        };
        let result = self.open_hop(host, protocol, &credentials.username, password).await;
        self.note(result)?;

        let frame = HopFrame {
            prompt: self.prompt.take().ok_or(InteractionError::NotStarted)?,
            os: self.os,
            terminal: self.terminal.take(),
            protocol,
            host: host.to_string(),
        };
        self.hops.push(frame);
        self.os = NetworkOs::Unknown;

        self.discover_prompt().await?;
        self.enable().await?;
        self.classify_os().await?;
        if self.config.modify_terminal {
            self.normalize_terminal().await?;
        }
        info!("Hopped via {} to {} (depth {})", protocol, host, self.hops.len());
        self.prompt
            .as_ref()
            .ok_or_else(|| InteractionError::NotStarted.into())
    }

    /// Type the client command and log in. On return the remote has
    /// accepted the password.
    async fn open_hop(
        &mut self,
        host: &str,
        protocol: HopProtocol,
        username: &str,
        password: &str,
    ) -> Result<()> {
        let ctx = self.ready()?;
        let timeout = ctx.config.response_timeout;
        let (command, replies): (String, &[&str]) = match protocol {
            HopProtocol::Ssh => {
                let options = ctx.config.jump_ssh_options.trim();
                let command = if options.is_empty() {
                    format!("ssh -l {username} {host}")
                } else {
                    format!("ssh {options} -l {username} {host}")
                };
                (command, &SSH_REPLIES[..])
            }
            HopProtocol::Telnet => (format!("telnet {host}"), &TELNET_REPLIES[..]),
        };

        debug!("Opening {} hop to {}", protocol, host);
        ctx.channel.send_line(&command).await?;
        let mut reply = ctx.channel.read_until(replies, timeout).await?;
        if protocol == HopProtocol::Telnet && reply.is(1) {
            ctx.channel.send_line(username).await?;
            reply = ctx.channel.read_until(&["assword", "refused", "denied"], timeout).await?;
            reply.index += 1;
        }

        let password_index = match protocol {
            HopProtocol::Ssh => 1,
            HopProtocol::Telnet => 2,
        };
        if reply.index != password_index {
            let reason = refusal_reason(&reply.before, &reply.matched);
            warn!("{} to {} refused: {}", protocol, host, reason);
            ctx.channel.wait_for(ctx.prompt.text(), timeout).await?;
            return Err(ConnectError::Refused {
                host: host.to_string(),
                protocol: protocol.to_string(),
                reason,
            }
            .into());
        }

        ctx.channel.send_secret(password).await?;
        let mut candidates = vec!["denied", "assword"];
        candidates.extend(ctx.config.prompt_endings.iter().map(String::as_str));
        let landed = ctx.channel.read_until(&candidates, timeout).await?;
        if landed.index <= 2 {
            return Err(ConnectError::AuthenticationFailed {
                user: username.to_string(),
            }
            .into());
        }
        Ok(())
    }

    /// Leave the current hop and return to the previous one.
    ///
    /// Waits for the exact prompt of the previous hop, so unwinding can not
    /// stop on the wrong device. On failure the hop stays on the stack.
    pub async fn unhop(&mut self) -> Result<&Prompt> {
        if self.hops.is_empty() {
            return Err(InteractionError::NoActiveHop.into());
        }
        if let Err(e) = self.restore_terminal().await {
            warn!("Leaving hop with terminal unrestored: {}", e);
        }
        let Some(frame) = self.hops.pop() else {
            return Err(InteractionError::NoActiveHop.into());
        };

        let result = match self.ready() {
            Ok(ctx) => {
                let timeout = ctx.config.response_timeout;
                match ctx.channel.send_line(&ctx.config.disconnect_command).await {
                    Ok(()) => ctx
                        .channel
                        .wait_for(frame.prompt.text(), timeout)
                        .await
                        .map(|_| ()),
                    Err(e) => Err(e),
                }
            }
            Err(e) => Err(e),
        };
        if let Err(e) = self.note(result) {
            self.hops.push(frame);
            return Err(e);
        }

        debug!("Left {} hop to {}", frame.protocol, frame.host);
        self.os = frame.os;
        self.terminal = frame.terminal;
        Ok(self.prompt.insert(frame.prompt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::driver::prompt::PROBE;
    use crate::driver::session::tests::fast_config;
    use crate::transport::ScriptedTransport;
    use crate::transport::fixtures::{command_reply, probe_reply, typed};

    fn config(dir: &std::path::Path) -> SessionConfig {
        SessionConfig {
            modify_terminal: false,
            ..fast_config(dir)
        }
    }

    fn version(t: ScriptedTransport, banner: &str, prompt: &str) -> ScriptedTransport {
        t.on(
            typed("show version | i Cisco"),
            command_reply("show version | i Cisco", &[banner], prompt),
        )
    }

    #[tokio::test]
    async fn test_hops_unwind_in_reverse() {
        let dir = tempfile::tempdir().unwrap();
        let ssh = "ssh -o StrictHostKeyChecking=no -l admin 10.0.0.2";
        let t = ScriptedTransport::new()
            .on(PROBE, probe_reply("J1#"))
            .on(typed(ssh), format!("{ssh}\r\nPassword: "))
            .on("secret\n", "\r\n\r\nR2#")
            .on(PROBE, probe_reply("R2#"));
        let t = version(t, "Cisco IOS XE Software, Version 16.09.04", "R2#")
            .on(
                typed("telnet 10.0.0.3"),
                "telnet 10.0.0.3\r\nTrying 10.0.0.3 ... Open\r\n\r\nUsername: ",
            )
            .on("admin\n", "admin\r\nPassword: ")
            .on("secret\n", "\r\nR3#")
            .on(PROBE, probe_reply("R3#"));
        let t = version(t, "Cisco Nexus Operating System (NX-OS) Software", "R3#")
            .on(
                typed("exit"),
                "exit\r\n\r\n[Connection to 10.0.0.3 closed by foreign host]\r\nR2#",
            )
            .on(typed("exit"), "exit\r\nConnection to 10.0.0.2 closed.\r\nJ1#");
        let handle = t.handle();
        let mut session = Session::attach(Box::new(t), config(dir.path())).unwrap();
        session.discover_prompt().await.unwrap();

        let creds = Credentials::password("admin", "secret");
        session.hop_via("10.0.0.2", HopProtocol::Ssh, &creds).await.unwrap();
        assert_eq!(session.hostname(), Some("R2"));
        assert_eq!(session.os(), NetworkOs::IosXe);

        session.hop_via("10.0.0.3", HopProtocol::Telnet, &creds).await.unwrap();
        assert_eq!(session.hostname(), Some("R3"));
        assert_eq!(session.os(), NetworkOs::NxOs);
        assert_eq!(session.hop_depth(), 2);

        assert_eq!(session.unhop().await.unwrap().text(), "R2#");
        assert_eq!(session.os(), NetworkOs::IosXe);
        assert_eq!(session.unhop().await.unwrap().text(), "J1#");
        assert_eq!(session.os(), NetworkOs::Unknown);
        assert_eq!(session.hop_depth(), 0);
        assert_eq!(handle.remaining_rules(), 0);
    }

    fn reply(t: ScriptedTransport, command: &str, lines: &[&str], prompt: &str) -> ScriptedTransport {
        t.on(typed(command), command_reply(command, lines, prompt))
    }

    fn ssh_to_r2(t: ScriptedTransport) -> ScriptedTransport {
        let ssh = "ssh -o StrictHostKeyChecking=no -l admin 10.0.0.2";
        let t = t
            .on(typed(ssh), format!("{ssh}\r\nPassword: "))
            .on("secret\n", "\r\n\r\nR2#")
            .on(PROBE, probe_reply("R2#"));
        version(t, "Cisco IOS XE Software, Version 16.09.04", "R2#")
    }

    #[tokio::test]
    async fn test_each_hop_restores_its_own_terminal() {
        let dir = tempfile::tempdir().unwrap();
        let t = ScriptedTransport::new().on(PROBE, probe_reply("J1#"));
        let t = version(t, "Cisco IOS Software, C3750 Software, Version 12.2(55)SE", "J1#");
        let t = reply(t, "show terminal | i Length", &["Length: 24 lines, Width: 80 columns"], "J1#");
        let t = reply(t, "terminal length 0", &[], "J1#");
        let t = reply(t, "terminal width 0", &[], "J1#");

        let t = ssh_to_r2(t);
        let t = reply(t, "show terminal | i Length", &["Length: 40 lines, Width: 132 columns"], "R2#");
        let t = reply(t, "terminal length 0", &[], "R2#");
        let t = reply(t, "terminal width 0", &[], "R2#");

        let t = reply(t, "terminal length 40", &[], "R2#");
        let t = reply(t, "terminal width 132", &[], "R2#");
        let t = t.on(typed("exit"), "exit\r\nConnection to 10.0.0.2 closed.\r\nJ1#");

        let t = reply(t, "terminal length 24", &[], "J1#");
        let t = reply(t, "terminal width 80", &[], "J1#");
        let handle = t.handle();
        let mut session = Session::attach(Box::new(t), fast_config(dir.path())).unwrap();

        session.start().await.unwrap();
        let j1 = TerminalParams { length: Some(24), width: Some(80) };
        assert_eq!(session.pending_terminal_restore(), Some(j1));

        let creds = Credentials::password("admin", "secret");
        session.hop_via("10.0.0.2", HopProtocol::Ssh, &creds).await.unwrap();
        assert_eq!(
            session.pending_terminal_restore(),
            Some(TerminalParams { length: Some(40), width: Some(132) })
        );

        session.unhop().await.unwrap();
        assert_eq!(session.hostname(), Some("J1"));
        assert_eq!(session.pending_terminal_restore(), Some(j1));
        assert!(handle.sent().ends_with("terminal length 40\nterminal width 132\nexit\n"));

        session.end().await.unwrap();
        assert_eq!(session.pending_terminal_restore(), None);
        assert_eq!(handle.remaining_rules(), 0);
        assert!(handle.sent().ends_with("exit\nterminal length 24\nterminal width 80\n"));
    }

    #[tokio::test]
    async fn test_failed_unhop_keeps_the_hop() {
        let dir = tempfile::tempdir().unwrap();
        let t = ssh_to_r2(ScriptedTransport::new().on(PROBE, probe_reply("J1#")))
            // The jump host never comes back
            .on(typed("exit"), "exit\r\n")
            .on(typed("show clock"), command_reply("show clock", &["12:00:00 UTC"], "R2#"));
        let mut session = Session::attach(Box::new(t), config(dir.path())).unwrap();
        session.discover_prompt().await.unwrap();

        let creds = Credentials::password("admin", "secret");
        session.hop_via("10.0.0.2", HopProtocol::Ssh, &creds).await.unwrap();

        let err = session.unhop().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Interaction(InteractionError::Timeout { .. })
        ));
        assert!(!session.is_failed());
        assert_eq!(session.hop_depth(), 1);
        assert_eq!(session.hostname(), Some("R2"));
        assert_eq!(session.os(), NetworkOs::IosXe);
        assert_eq!(session.get_output("show clock").await.unwrap(), "12:00:00 UTC");
    }

    #[tokio::test]
    async fn test_refused_hop_keeps_current_device() {
        let dir = tempfile::tempdir().unwrap();
        let ssh = "ssh -o StrictHostKeyChecking=no -l admin 10.0.0.9";
        let t = ScriptedTransport::new()
            .on(PROBE, probe_reply("J1#"))
            .on(
                typed(ssh),
                format!("{ssh}\r\nssh: connect to host 10.0.0.9 port 22: Connection refused\r\nJ1#"),
            )
            .on(typed("show clock"), command_reply("show clock", &["12:00:00 UTC"], "J1#"));
        let mut session = Session::attach(Box::new(t), config(dir.path())).unwrap();
        session.discover_prompt().await.unwrap();

        let creds = Credentials::password("admin", "secret");
        let err = session
            .hop_via("10.0.0.9", HopProtocol::Ssh, &creds)
            .await
            .unwrap_err();
        match &err {
            Error::Connect(ConnectError::Refused { reason, .. }) => {
                assert!(reason.ends_with("Connection refused"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!session.is_failed());
        assert_eq!(session.hop_depth(), 0);
        assert_eq!(session.get_output("show clock").await.unwrap(), "12:00:00 UTC");
    }

    #[tokio::test]
    async fn test_unhop_without_hop() {
        let dir = tempfile::tempdir().unwrap();
        let t = ScriptedTransport::new().on(PROBE, probe_reply("J1#"));
        let handle = t.handle();
        let mut session = Session::attach(Box::new(t), config(dir.path())).unwrap();
        session.discover_prompt().await.unwrap();

        let err = session.unhop().await.unwrap_err();
        assert!(matches!(err, Error::Interaction(InteractionError::NoActiveHop)));
        assert_eq!(handle.sent(), PROBE);
    }

    #[tokio::test]
    async fn test_key_credentials_rejected_for_hop() {
        let dir = tempfile::tempdir().unwrap();
        let mut session =
            Session::attach(Box::new(ScriptedTransport::new()), config(dir.path())).unwrap();
        let creds = Credentials::private_key("admin", "/home/admin/.ssh/id_ed25519");
        let err = session
            .hop_via("10.0.0.2", HopProtocol::Ssh, &creds)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfig { .. }));
    }
}
