//! Session engine.
//!
//! A [`Session`] owns one transport and walks it through prompt discovery,
//! enable negotiation, OS classification and terminal normalisation, then
//! runs command/response exchanges until it is ended and disconnected.

mod batch;
mod builder;
mod config_session;
mod exchange;
mod jump;
mod privilege;
pub mod prompt;
pub(crate) mod response;
mod session;
pub mod sink;
mod terminal;

pub use batch::{FailureLog, run_batch};
pub use builder::{ConnectMethod, SessionBuilder};
pub use config_session::{
    ConfigPush, ConfigStep, ConfigTranscript, ask_check_mode, render_proposed_config,
};
pub use jump::HopProtocol;
pub use privilege::{EnableNegotiator, EnableState};
pub use prompt::Prompt;
pub use response::{CapturedOutput, CommandRecord, Termination};
pub use session::Session;
pub use sink::{FileSink, MemorySink, OutputSink};
