//! Command/response exchange.
//!
//! One command is sent, its echo is consumed, and then output is read line
//! by line against three ordered terminators: line ending, pagination
//! marker, prompt. Content lines go to an [`OutputSink`] as they arrive.

use std::time::{Duration, Instant};

use log::{debug, trace};

use super::response::{CapturedOutput, CommandRecord, Termination};
use super::sink::OutputSink;
use crate::channel::CliChannel;
use crate::error::{Error, InteractionError, Result};
use crate::platform::OsProfile;

const LINE_END: &str = "\r\n";
const NEXT_PAGE: &str = " ";

/// Waits used by one exchange.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ExchangeTimeouts {
    pub echo: Duration,
    /// Bound on each read, not on the whole command.
    pub read: Duration,
}

/// Per-exchange counters, folded into the [`CommandRecord`].
#[derive(Debug, Default)]
struct Progress {
    lines: usize,
    pages: usize,
    failure: Option<String>,
}

/// Send `command`, swallow its echo, then stream its output into `sink`
/// until `prompt` reappears.
///
/// The sink is finished on every path. A read timeout aborts the command
/// with [`InteractionError::Timeout`]; connection and prompt state are not
/// touched.
pub(crate) async fn execute(
    channel: &mut CliChannel,
    profile: &OsProfile,
    prompt: &str,
    command: &str,
    sink: &mut dyn OutputSink,
    timeouts: ExchangeTimeouts,
) -> Result<CommandRecord> {
    let start = Instant::now();
    let mut progress = Progress::default();

    let outcome = exchange(channel, profile, prompt, command, sink, timeouts, &mut progress).await;
    let finished = sink.finish();
    outcome?;
    finished?;

    let elapsed = start.elapsed();
    debug!(
        "{:?} completed in {:?}: {} lines, {} pages",
        command, elapsed, progress.lines, progress.pages
    );
    Ok(CommandRecord {
        command: command.to_string(),
        termination: Termination::Prompt,
        output: CapturedOutput::Sink,
        lines: progress.lines,
        pages: progress.pages,
        elapsed,
        failure_message: progress.failure,
    })
}

async fn exchange(
    channel: &mut CliChannel,
    profile: &OsProfile,
    prompt: &str,
    command: &str,
    sink: &mut dyn OutputSink,
    timeouts: ExchangeTimeouts,
    progress: &mut Progress,
) -> Result<()> {
    channel.send_line(command).await?;
    consume_echo(channel, command, timeouts.echo).await?;

    let pager = &profile.pager;
    let candidates = [LINE_END, pager.marker(), prompt];
    loop {
        let outcome = channel.read_until(&candidates, timeouts.read).await?;
        let termination = match outcome.index {
            1 => Termination::Line,
            2 => Termination::Pagination,
            _ => Termination::Prompt,
        };
        trace!("{:?}: {:?} after {:?}", command, termination, outcome.before);

        // Residue in front of a marker or prompt is content when it
        // cleans up to something non-empty.
        let line = pager.clean_line(&outcome.before);
        if !line.trim().is_empty() {
            if progress.failure.is_none() {
                progress.failure = profile.detect_failure(&line);
            }
            sink.accept(&line)?;
            progress.lines += 1;
        }

        match termination {
            Termination::Pagination => {
                progress.pages += 1;
                channel.send(NEXT_PAGE).await?;
            }
            Termination::Prompt => return Ok(()),
            Termination::Line | Termination::Timeout => {}
        }
    }
}

/// Wait for the device to echo `command`. An empty command has no echo.
pub(crate) async fn consume_echo(
    channel: &mut CliChannel,
    command: &str,
    timeout: Duration,
) -> Result<()> {
    if command.is_empty() {
        return Ok(());
    }
    match channel.wait_for(command, timeout).await {
        Ok(_) => Ok(()),
        Err(Error::Interaction(InteractionError::Timeout { .. })) => {
            Err(InteractionError::EchoNotSeen {
                command: command.to_string(),
            }
            .into())
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::sink::MemorySink;
    use crate::platform::vendors::{cisco_asa, cisco_ios};
    use crate::transport::ScriptedTransport;
    use crate::transport::fixtures::{command_reply, typed};

    const TIMEOUTS: ExchangeTimeouts = ExchangeTimeouts {
        echo: Duration::from_millis(200),
        read: Duration::from_millis(200),
    };

    fn channel(transport: ScriptedTransport) -> CliChannel {
        CliChannel::new(Box::new(transport), "\n")
    }

    /// `lines` split into pages of `per_page`, IOS style.
    fn paged_reply(command: &str, lines: &[String], per_page: usize, prompt: &str) -> ScriptedTransport {
        let pages: Vec<_> = lines.chunks(per_page).collect();
        let mut transport = ScriptedTransport::new();
        let mut first = format!("{command}\r\n");
        for (i, page) in pages.iter().enumerate() {
            let mut out = if i == 0 {
                std::mem::take(&mut first)
            } else {
                "\x08\x08\x08\x08\x08\x08\x08\x08\x08        \x08\x08\x08\x08\x08\x08\x08\x08\x08".to_string()
            };
            for line in page.iter() {
                out.push_str(line);
                out.push_str("\r\n");
            }
            if i + 1 < pages.len() {
                out.push_str(" --More-- ");
            } else {
                out.push_str(prompt);
            }
            let trigger = if i == 0 { typed(command) } else { " ".to_string() };
            transport = transport.on(trigger, out);
        }
        transport
    }

    #[tokio::test]
    async fn test_clean_capture() {
        let profile = cisco_ios::ios().unwrap();
        let transport = ScriptedTransport::new().on(
            typed("show clock"),
            command_reply("show clock", &["12:00:00 UTC"], "SW1#"),
        );
        let mut channel = channel(transport);
        let mut sink = MemorySink::new();

        let record = execute(&mut channel, &profile, "SW1#", "show clock", &mut sink, TIMEOUTS)
            .await
            .unwrap();
        assert!(record.is_success());
        assert_eq!(record.lines, 1);
        assert_eq!(sink.lines(), ["12:00:00 UTC"]);
    }

    #[tokio::test]
    async fn test_echo_precedes_content() {
        // Erase residue ahead of the echo goes with it
        let profile = cisco_ios::ios().unwrap();
        let transport = ScriptedTransport::new().chunk_size(4).on(
            typed("show run | i hostname"),
            "\x08\x08   \x08\x08show run | i hostname\r\nhostname SW1\r\nSW1#",
        );
        let mut channel = channel(transport);
        let mut sink = MemorySink::new();

        execute(&mut channel, &profile, "SW1#", "show run | i hostname", &mut sink, TIMEOUTS)
            .await
            .unwrap();
        assert_eq!(sink.lines(), ["hostname SW1"]);
    }

    #[tokio::test]
    async fn test_missing_echo_is_fatal_to_command() {
        let profile = cisco_ios::ios().unwrap();
        let transport = ScriptedTransport::new().on(typed("show clock"), "garbage\r\nSW1#");
        let mut channel = channel(transport);
        let mut sink = MemorySink::new();

        let err = execute(&mut channel, &profile, "SW1#", "show clock", &mut sink, TIMEOUTS)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Interaction(InteractionError::EchoNotSeen { .. })
        ));
    }

    #[tokio::test]
    async fn test_pagination_is_transparent() {
        let profile = cisco_ios::ios().unwrap();
        for per_page in [1, 3, 7, 25] {
            let lines: Vec<String> = (1..=20).map(|i| format!("line {i}")).collect();
            let transport = paged_reply("show run", &lines, per_page, "SW1#");
            let handle = transport.handle();
            let mut channel = channel(transport);
            let mut sink = MemorySink::new();

            let record = execute(&mut channel, &profile, "SW1#", "show run", &mut sink, TIMEOUTS)
                .await
                .unwrap();
            assert_eq!(sink.lines(), lines.as_slice(), "per_page={per_page}");
            assert_eq!(record.pages, 20usize.div_ceil(per_page) - 1);
            assert_eq!(handle.remaining_rules(), 0);
        }
    }

    #[tokio::test]
    async fn test_asa_pagination() {
        let profile = cisco_asa::profile().unwrap();
        let transport = ScriptedTransport::new()
            .on(
                typed("show run"),
                "show run\r\n: Saved\r\nhostname fw1\r\n<--- More --->",
            )
            .on(" ", "\r              \rnames\r\nfw1#");
        let mut channel = channel(transport);
        let mut sink = MemorySink::new();

        execute(&mut channel, &profile, "fw1#", "show run", &mut sink, TIMEOUTS)
            .await
            .unwrap();
        assert_eq!(sink.lines(), [": Saved", "hostname fw1", "names"]);
    }

    #[tokio::test]
    async fn test_read_timeout_mid_stream() {
        let profile = cisco_ios::ios().unwrap();
        let transport = ScriptedTransport::new().on(typed("show tech"), "show tech\r\npart one\r\n");
        let mut channel = channel(transport);
        let mut sink = MemorySink::new();

        let err = execute(&mut channel, &profile, "SW1#", "show tech", &mut sink, TIMEOUTS)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Interaction(InteractionError::Timeout { .. })));
        assert!(!err.is_fatal_to_session());
        assert_eq!(sink.lines(), ["part one"]);
        assert!(channel.is_connected());
    }

    #[tokio::test]
    async fn test_failure_marker_recorded() {
        let profile = cisco_ios::ios().unwrap();
        let transport = ScriptedTransport::new().on(
            typed("show vlan brif"),
            command_reply(
                "show vlan brif",
                &["                  ^", "% Invalid input detected at '^' marker."],
                "SW1#",
            ),
        );
        let mut channel = channel(transport);
        let mut sink = MemorySink::new();

        let record = execute(&mut channel, &profile, "SW1#", "show vlan brif", &mut sink, TIMEOUTS)
            .await
            .unwrap();
        assert_eq!(record.failure_message.as_deref(), Some("% Invalid input"));
        assert!(!record.is_success());
    }
}
