//! Per-OS profile: pagination, terminal dialect and command vocabulary.

use std::fmt;

use regex::Regex;

use super::classifier::NetworkOs;
use crate::channel::PagerStyle;

/// Commands a family uses to read, change and restore terminal settings.
///
/// Restore templates carry a `{}` placeholder for the captured value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalDialect {
    /// Command whose output reports the pagination length.
    pub length_query: String,

    /// Separate width query; `None` means `length_query` reports both.
    pub width_query: Option<String>,

    /// Commands that disable pagination and widen output.
    pub normalize: Vec<String>,

    pub restore_length: String,

    /// `None` when the family's width is never changed.
    pub restore_width: Option<String>,
}

impl TerminalDialect {
    /// Build the restore commands for captured `params`.
    ///
    /// Values that could not be read are skipped rather than guessed.
    pub fn restore_commands(&self, params: &TerminalParams) -> Vec<String> {
        let mut commands = Vec::new();
        if let Some(length) = params.length {
            commands.push(fill(&self.restore_length, length));
        }
        if let (Some(template), Some(width)) = (&self.restore_width, params.width) {
            commands.push(fill(template, width));
        }
        commands
    }
}

fn fill(template: &str, value: u32) -> String {
    template.replacen("{}", &value.to_string(), 1)
}

/// Pagination length and line width as reported by the device.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TerminalParams {
    pub length: Option<u32>,
    pub width: Option<u32>,
}

impl TerminalParams {
    /// Parse query output.
    ///
    /// With no separate width output the length output is expected to look
    /// like `Length: 24 lines, Width: 80 columns`.
    pub fn parse(length_output: &str, width_output: Option<&str>) -> Self {
        match width_output {
            Some(width_output) => Self {
                length: first_number(length_output),
                width: first_number(width_output),
            },
            None => {
                let mut parts = length_output.splitn(2, ',');
                Self {
                    length: parts.next().and_then(first_number),
                    width: parts.next().and_then(first_number),
                }
            }
        }
    }
}

fn first_number(text: &str) -> Option<u32> {
    let digits = Regex::new("[0-9]+").ok()?;
    digits.find(text)?.as_str().parse().ok()
}

/// Everything the session engine needs to know about one OS family.
#[derive(Clone)]
pub struct OsProfile {
    pub os: NetworkOs,

    pub pager: PagerStyle,

    pub terminal: TerminalDialect,

    /// Output fragments that mark a rejected command.
    pub failed_when_contains: Vec<String>,

    pub enable_command: String,

    pub config_enter: String,

    pub config_exit: String,

    /// Prompt suffix shown while in configuration mode.
    pub config_prompt_suffix: String,

    pub save_command: String,

    /// Text of the save confirmation question.
    pub save_confirm: String,
}

impl OsProfile {
    /// Profile with the common Cisco vocabulary and the given pager.
    pub fn new(os: NetworkOs, pager: PagerStyle, terminal: TerminalDialect) -> Self {
        Self {
            os,
            pager,
            terminal,
            failed_when_contains: vec![],
            enable_command: "enable".to_string(),
            config_enter: "configure terminal".to_string(),
            config_exit: "end".to_string(),
            config_prompt_suffix: ")#".to_string(),
            save_command: "copy running-config startup-config".to_string(),
            save_confirm: "?".to_string(),
        }
    }

    /// Add a failure pattern.
    pub fn with_failure_pattern(mut self, pattern: impl Into<String>) -> Self {
        self.failed_when_contains.push(pattern.into());
        self
    }

    pub fn with_save_command(mut self, command: impl Into<String>) -> Self {
        self.save_command = command.into();
        self
    }

    /// First failure marker present in `output`.
    pub fn detect_failure(&self, output: &str) -> Option<String> {
        self.failed_when_contains
            .iter()
            .find(|pattern| output.contains(pattern.as_str()))
            .cloned()
    }
}

impl fmt::Debug for OsProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OsProfile")
            .field("os", &self.os)
            .field("pager_marker", &self.pager.marker())
            .field("pager_residue", &self.pager.residue().as_str())
            .field("terminal", &self.terminal)
            .field("failed_when_contains", &self.failed_when_contains)
            .field("config_prompt_suffix", &self.config_prompt_suffix)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ios_dialect() -> TerminalDialect {
        TerminalDialect {
            length_query: "show terminal | i Length".to_string(),
            width_query: None,
            normalize: vec!["terminal length 0".to_string(), "terminal width 0".to_string()],
            restore_length: "terminal length {}".to_string(),
            restore_width: Some("terminal width {}".to_string()),
        }
    }

    #[test]
    fn test_parse_combined_query() {
        let params = TerminalParams::parse("Length: 24 lines, Width: 80 columns", None);
        assert_eq!(params.length, Some(24));
        assert_eq!(params.width, Some(80));
    }

    #[test]
    fn test_parse_separate_queries() {
        let params = TerminalParams::parse("pager lines 24", Some("Width = 132, monitor"));
        assert_eq!(params, TerminalParams { length: Some(24), width: Some(132) });

        let params = TerminalParams::parse("no pager", Some("Width = 80"));
        assert_eq!(params.length, None);
    }

    #[test]
    fn test_restore_uses_captured_values() {
        let params = TerminalParams { length: Some(40), width: Some(120) };
        assert_eq!(
            ios_dialect().restore_commands(&params),
            vec!["terminal length 40", "terminal width 120"]
        );

        let partial = TerminalParams { length: Some(40), width: None };
        assert_eq!(ios_dialect().restore_commands(&partial), vec!["terminal length 40"]);
    }

    #[test]
    fn test_detect_failure() {
        let pager = PagerStyle::new("--More--", r"^ ?\x08+ +\x08+(?P<line>.*)$").unwrap();
        let profile = OsProfile::new(NetworkOs::Ios, pager, ios_dialect())
            .with_failure_pattern("% Invalid input");
        assert_eq!(
            profile.detect_failure("show vlan brief\n% Invalid input detected at '^' marker."),
            Some("% Invalid input".to_string())
        );
        assert_eq!(profile.detect_failure("12:00:00 UTC"), None);
    }
}
