//! Device OS families and their per-family CLI behaviour.
//!
//! The classifier maps a version banner to a [`NetworkOs`]; a
//! [`ProfileRegistry`] maps that family to an [`OsProfile`] holding the
//! pager style, terminal dialect and command vocabulary the session uses.

mod classifier;
mod definition;
mod privilege_level;
mod registry;
pub mod vendors;

pub use classifier::{NetworkOs, classify_banner};
pub use definition::{OsProfile, TerminalDialect, TerminalParams};
pub use privilege_level::PrivilegeLevel;
pub use registry::ProfileRegistry;
