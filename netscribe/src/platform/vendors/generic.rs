//! Fallback profile for devices the classifier could not place.

use super::{BACKSPACE_RESIDUE, cisco_ios, with_cisco_failures};
use crate::channel::PagerStyle;
use crate::error::Result;
use crate::platform::{NetworkOs, OsProfile};

/// IOS-like defaults under [`NetworkOs::Unknown`].
pub fn profile() -> Result<OsProfile> {
    let pager = PagerStyle::new("--More--", BACKSPACE_RESIDUE)?;
    Ok(with_cisco_failures(OsProfile::new(
        NetworkOs::Unknown,
        pager,
        cisco_ios::dialect("terminal width 0"),
    )))
}
