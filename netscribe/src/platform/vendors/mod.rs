//! Built-in OS profiles.

pub mod cisco_asa;
pub mod cisco_ios;
pub mod cisco_nxos;
pub mod generic;

use crate::platform::OsProfile;

/// Error markers shared by every Cisco CLI.
pub(crate) const CISCO_FAILURES: &[&str] = &[
    "% Invalid input",
    "% Incomplete command",
    "% Ambiguous command",
    "% Unknown command",
    "ERROR:",
];

/// Backspace-and-space erase that follows `--More--`.
pub(crate) const BACKSPACE_RESIDUE: &str = r"^ ?\x08+ +\x08+(?P<line>.*)$";

pub(crate) fn with_cisco_failures(profile: OsProfile) -> OsProfile {
    CISCO_FAILURES
        .iter()
        .fold(profile, |profile, pattern| profile.with_failure_pattern(*pattern))
}
