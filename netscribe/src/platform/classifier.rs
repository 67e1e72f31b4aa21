//! Network OS families and banner classification.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Closed set of device OS families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NetworkOs {
    #[serde(rename = "IOS")]
    Ios,
    #[serde(rename = "IOS-XE")]
    IosXe,
    #[serde(rename = "NX-OS")]
    NxOs,
    #[serde(rename = "ASA")]
    Asa,
    Unknown,
}

impl NetworkOs {
    /// Every family with a dedicated profile.
    pub const KNOWN: [NetworkOs; 4] = [NetworkOs::Ios, NetworkOs::IosXe, NetworkOs::NxOs, NetworkOs::Asa];

    pub fn as_str(self) -> &'static str {
        match self {
            NetworkOs::Ios => "IOS",
            NetworkOs::IosXe => "IOS-XE",
            NetworkOs::NxOs => "NX-OS",
            NetworkOs::Asa => "ASA",
            NetworkOs::Unknown => "Unknown",
        }
    }

    pub fn is_known(self) -> bool {
        self != NetworkOs::Unknown
    }
}

impl fmt::Display for NetworkOs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NetworkOs {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace(['-', '_', ' '], "").as_str() {
            "ios" => Ok(NetworkOs::Ios),
            "iosxe" => Ok(NetworkOs::IosXe),
            "nxos" => Ok(NetworkOs::NxOs),
            "asa" => Ok(NetworkOs::Asa),
            "unknown" => Ok(NetworkOs::Unknown),
            _ => Err(Error::InvalidConfig {
                message: format!("unknown OS family '{s}'"),
            }),
        }
    }
}

/// Lowercase banner fragments in test order. IOS-XE banners also carry
/// the generic IOS text, so the XE check must run first.
const SIGNATURES: &[(&str, NetworkOs)] = &[
    ("cisco ios xe", NetworkOs::IosXe),
    ("cisco ios software", NetworkOs::Ios),
    ("cisco internetwork operating system", NetworkOs::Ios),
    ("cisco nexus operating system", NetworkOs::NxOs),
    ("adaptive security appliance", NetworkOs::Asa),
];

/// Classify the output of a version query. First matching signature wins.
pub fn classify_banner(banner: &str) -> NetworkOs {
    let lower = banner.to_lowercase();
    SIGNATURES
        .iter()
        .find(|(needle, _)| lower.contains(needle))
        .map(|(_, os)| *os)
        .unwrap_or(NetworkOs::Unknown)
}
