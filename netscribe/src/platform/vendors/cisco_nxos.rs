//! Cisco NX-OS profile.
//!
//! Same pager as IOS, but `terminal width 0` is rejected; 511 is the
//! widest accepted value.

use super::{BACKSPACE_RESIDUE, cisco_ios, with_cisco_failures};
use crate::channel::PagerStyle;
use crate::error::Result;
use crate::platform::{NetworkOs, OsProfile};

pub fn profile() -> Result<OsProfile> {
    let pager = PagerStyle::new("--More--", BACKSPACE_RESIDUE)?;
    Ok(with_cisco_failures(OsProfile::new(
        NetworkOs::NxOs,
        pager,
        cisco_ios::dialect("terminal width 511"),
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nxos_width() {
        let profile = profile().unwrap();
        assert_eq!(profile.os, NetworkOs::NxOs);
        assert_eq!(profile.terminal.normalize[1], "terminal width 511");
        assert_eq!(
            profile.terminal.restore_width.as_deref(),
            Some("terminal width {}")
        );
    }
}
