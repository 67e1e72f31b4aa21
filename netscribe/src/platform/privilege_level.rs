//! Privilege level derived from a prompt's trailing characters.

use std::fmt;

/// CLI mode a prompt indicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrivilegeLevel {
    /// Restricted mode, prompt ends in `>`.
    User,
    /// Enable mode, prompt ends in `#`.
    Privileged,
    /// Configuration mode, prompt ends in `)#`.
    Configuration,
}

impl PrivilegeLevel {
    /// Classify a prompt, or `None` if it has no recognised ending.
    pub fn from_prompt(prompt: &str) -> Option<Self> {
        let prompt = prompt.trim_end();
        if prompt.ends_with(")#") {
            Some(PrivilegeLevel::Configuration)
        } else if prompt.ends_with('#') {
            Some(PrivilegeLevel::Privileged)
        } else if prompt.ends_with('>') {
            Some(PrivilegeLevel::User)
        } else {
            None
        }
    }

    /// Trailing marker characters for this level.
    pub fn marker(self) -> &'static str {
        match self {
            PrivilegeLevel::User => ">",
            PrivilegeLevel::Privileged => "#",
            PrivilegeLevel::Configuration => ")#",
        }
    }
}

impl fmt::Display for PrivilegeLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PrivilegeLevel::User => "user",
            PrivilegeLevel::Privileged => "privileged",
            PrivilegeLevel::Configuration => "configuration",
        })
    }
}
