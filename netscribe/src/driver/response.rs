//! Result of one command exchange.

use std::path::PathBuf;
use std::time::Duration;

/// How the exchange ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    /// A content line was the last thing matched (only seen mid-exchange).
    Line,
    /// Stopped at a pagination marker.
    Pagination,
    /// The prompt reappeared; the normal end of a command.
    Prompt,
    /// A read timed out before the prompt.
    Timeout,
}

/// Where the captured lines went.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CapturedOutput {
    Text(String),
    File(PathBuf),
    /// Lines went to a caller-provided sink.
    Sink,
}

/// Record of one command execution.
#[derive(Debug, Clone)]
pub struct CommandRecord {
    /// The command that was executed.
    pub command: String,

    pub termination: Termination,

    pub output: CapturedOutput,

    /// Content lines handed to the sink.
    pub lines: usize,

    /// Pagination markers acknowledged.
    pub pages: usize,

    /// Time taken to execute the command.
    pub elapsed: Duration,

    /// Failure marker seen in the output, if any.
    pub failure_message: Option<String>,
}

impl CommandRecord {
    /// Check if the record indicates success.
    pub fn is_success(&self) -> bool {
        self.termination == Termination::Prompt && self.failure_message.is_none()
    }

    /// Captured text, when the output was kept in memory.
    pub fn text(&self) -> Option<&str> {
        match &self.output {
            CapturedOutput::Text(text) => Some(text),
            _ => None,
        }
    }
}

impl std::fmt::Display for CommandRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.output {
            CapturedOutput::Text(text) => write!(f, "{}", text),
            CapturedOutput::File(path) => write!(f, "{}", path.display()),
            CapturedOutput::Sink => write!(f, "{} lines", self.lines),
        }
    }
}
