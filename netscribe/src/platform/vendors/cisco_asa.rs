//! Cisco ASA profile.
//!
//! The ASA redraws over `<--- More --->` with a carriage return instead of
//! backspaces. Pagination is controlled by `terminal pager`; width is left
//! alone.

use super::with_cisco_failures;
use crate::channel::PagerStyle;
use crate::error::Result;
use crate::platform::{NetworkOs, OsProfile, TerminalDialect};

pub fn profile() -> Result<OsProfile> {
    let pager = PagerStyle::new("<--- More --->", r"^\r? *\r(?P<line>.*)$")?;
    let terminal = TerminalDialect {
        length_query: "show pager".to_string(),
        width_query: Some("show terminal".to_string()),
        normalize: vec!["terminal pager 0".to_string()],
        restore_length: "terminal pager {}".to_string(),
        restore_width: None,
    };
    Ok(with_cisco_failures(OsProfile::new(
        NetworkOs::Asa,
        pager,
        terminal,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::TerminalParams;

    #[test]
    fn test_asa_profile() {
        let profile = profile().unwrap();
        assert_eq!(profile.pager.marker(), "<--- More --->");
        assert_eq!(profile.terminal.normalize, vec!["terminal pager 0"]);
        assert_eq!(profile.terminal.width_query.as_deref(), Some("show terminal"));
    }

    #[test]
    fn test_width_is_never_restored() {
        let profile = profile().unwrap();
        let params = TerminalParams::parse("pager lines 24", Some("Width = 80, monitor"));
        assert_eq!(
            profile.terminal.restore_commands(&params),
            vec!["terminal pager 24"]
        );
    }
}
