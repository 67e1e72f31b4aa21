//! Terminal parameter capture, normalisation and restore.

use log::{debug, info};

use super::exchange::{self, ExchangeTimeouts};
use super::sink::MemorySink;
use crate::channel::CliChannel;
use crate::error::Result;
use crate::platform::{OsProfile, TerminalParams};

async fn query(
    channel: &mut CliChannel,
    profile: &OsProfile,
    prompt: &str,
    command: &str,
    timeouts: ExchangeTimeouts,
) -> Result<String> {
    let mut sink = MemorySink::new();
    exchange::execute(channel, profile, prompt, command, &mut sink, timeouts).await?;
    Ok(sink.into_text())
}

/// Read the current length and width without changing anything.
pub(crate) async fn capture(
    channel: &mut CliChannel,
    profile: &OsProfile,
    prompt: &str,
    timeouts: ExchangeTimeouts,
) -> Result<TerminalParams> {
    let dialect = &profile.terminal;
    let length_output = query(channel, profile, prompt, &dialect.length_query, timeouts).await?;
    let width_output = match &dialect.width_query {
        Some(command) => Some(query(channel, profile, prompt, command, timeouts).await?),
        None => None,
    };
    let params = TerminalParams::parse(&length_output, width_output.as_deref());
    debug!("Captured terminal parameters {:?}", params);
    Ok(params)
}

/// Disable pagination and widen output. Stops at the first command that
/// fails; whatever was already changed stays changed until [`restore`].
pub(crate) async fn normalize(
    channel: &mut CliChannel,
    profile: &OsProfile,
    prompt: &str,
    timeouts: ExchangeTimeouts,
) -> Result<()> {
    for command in &profile.terminal.normalize {
        query(channel, profile, prompt, command, timeouts).await?;
    }
    Ok(())
}

/// Put back the values [`capture`] read.
pub(crate) async fn restore(
    channel: &mut CliChannel,
    profile: &OsProfile,
    prompt: &str,
    params: &TerminalParams,
    timeouts: ExchangeTimeouts,
) -> Result<()> {
    for command in profile.terminal.restore_commands(params) {
        query(channel, profile, prompt, &command, timeouts).await?;
    }
    info!("Restored terminal parameters {:?}", params);
    Ok(())
}
