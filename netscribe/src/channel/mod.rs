//! Channel layer: pattern matching over a device's character stream.
//!
//! This module turns a raw [`Transport`](crate::transport::Transport) into
//! a line-oriented channel with bounded "read until one of these strings"
//! waits and control-sequence stripping.

mod buffer;
mod cli;
mod patterns;

pub use buffer::PatternBuffer;
pub use cli::CliChannel;
pub use patterns::{MatchOutcome, PagerStyle, strip_control};
