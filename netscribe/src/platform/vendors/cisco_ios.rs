//! Cisco IOS and IOS-XE profiles.
//!
//! Both print `--More--` and erase it with a run of backspaces, spaces and
//! backspaces once the space is acknowledged. `show terminal` reports length
//! and width on one line.

use super::{BACKSPACE_RESIDUE, with_cisco_failures};
use crate::channel::PagerStyle;
use crate::error::Result;
use crate::platform::{NetworkOs, OsProfile, TerminalDialect};

pub(crate) fn dialect(set_width: &str) -> TerminalDialect {
    TerminalDialect {
        length_query: "show terminal | i Length".to_string(),
        width_query: None,
        normalize: vec!["terminal length 0".to_string(), set_width.to_string()],
        restore_length: "terminal length {}".to_string(),
        restore_width: Some("terminal width {}".to_string()),
    }
}

fn build(os: NetworkOs) -> Result<OsProfile> {
    let pager = PagerStyle::new("--More--", BACKSPACE_RESIDUE)?;
    Ok(with_cisco_failures(OsProfile::new(
        os,
        pager,
        dialect("terminal width 0"),
    )))
}

/// Classic IOS.
pub fn ios() -> Result<OsProfile> {
    build(NetworkOs::Ios)
}

/// IOS-XE.
pub fn ios_xe() -> Result<OsProfile> {
    build(NetworkOs::IosXe)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::TerminalParams;

    #[test]
    fn test_ios_profile() {
        let profile = ios().unwrap();
        assert_eq!(profile.os, NetworkOs::Ios);
        assert_eq!(profile.pager.marker(), "--More--");
        assert_eq!(profile.config_prompt_suffix, ")#");
        assert_eq!(profile.failed_when_contains.len(), 5);
        assert_eq!(
            profile.terminal.normalize,
            vec!["terminal length 0", "terminal width 0"]
        );
    }

    #[test]
    fn test_ios_xe_shares_dialect() {
        let xe = ios_xe().unwrap();
        assert_eq!(xe.os, NetworkOs::IosXe);
        assert_eq!(xe.terminal, ios().unwrap().terminal);
    }

    #[test]
    fn test_restore_round_trip() {
        let profile = ios().unwrap();
        let params = TerminalParams::parse("Length: 24 lines, Width: 80 columns", None);
        assert_eq!(
            profile.terminal.restore_commands(&params),
            vec!["terminal length 24", "terminal width 80"]
        );
    }
}
