//! # Netscribe
//!
//! Async automation of interactive CLI sessions on network devices.
//!
//! Netscribe drives routers, switches and firewalls that only offer a
//! character-oriented CLI over SSH or Telnet. It learns the prompt without
//! knowing it in advance, pages through long output, captures it straight
//! to disk, and leaves the terminal the way it found it.
//!
//! ## Features
//!
//! - SSH (russh) and Telnet transports behind one [`transport::Transport`] trait
//! - Prompt discovery with an invisible probe
//! - Enable-mode negotiation that never retries a wrong secret
//! - OS classification into IOS, IOS-XE, NX-OS and ASA profiles
//! - Terminal pagination and width captured, disabled and restored
//! - Line-by-line capture to memory or file, with pager residue removed
//! - Configuration pushes with audit transcripts and a check mode
//! - Jump-host chains unwound in strict reverse order
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use futures_util::FutureExt;
//! use netscribe::SessionBuilder;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), netscribe::Error> {
//!     let mut session = SessionBuilder::new("192.168.1.1")
//!         .username("admin")
//!         .password("secret")
//!         .enable_secret("enable-secret")
//!         .connect()
//!         .await?;
//!
//!     let path = session.create_output_filename("show run", ".txt");
//!     session
//!         .run(|s| async move { s.write_output_to_file("show run", &path).await }.boxed())
//!         .await?;
//!
//!     session.disconnect().await?;
//!     Ok(())
//! }
//! ```

pub mod channel;
pub mod config;
pub mod driver;
pub mod error;
pub mod extract;
pub mod naming;
pub mod operator;
pub mod platform;
pub mod transport;

// Re-export main types for convenience
pub use config::SessionConfig;
pub use driver::{
    CommandRecord, ConfigPush, ConfigTranscript, ConnectMethod, FailureLog, HopProtocol, Prompt,
    Session, SessionBuilder, run_batch,
};
pub use error::{Error, Result};
pub use naming::OutputNamer;
pub use operator::{ConsoleOperator, NoOperator, Operator};
pub use platform::{NetworkOs, OsProfile, PrivilegeLevel, ProfileRegistry};
pub use transport::{Credentials, SshConfig};
