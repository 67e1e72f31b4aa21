//! Registry of OS profiles, owned by whoever builds sessions.

use indexmap::IndexMap;

use super::classifier::NetworkOs;
use super::definition::OsProfile;
use super::vendors;
use crate::error::Result;

/// Lookup table from OS family to profile.
///
/// There is no process-wide instance; each session holds its own (usually
/// cloned from [`ProfileRegistry::builtin`]) so overrides never leak.
#[derive(Debug, Clone, Default)]
pub struct ProfileRegistry {
    profiles: IndexMap<NetworkOs, OsProfile>,
}

impl ProfileRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with a profile for every family, `Unknown` included.
    pub fn builtin() -> Result<Self> {
        let mut registry = Self::new();
        registry.register(vendors::cisco_ios::ios()?);
        registry.register(vendors::cisco_ios::ios_xe()?);
        registry.register(vendors::cisco_nxos::profile()?);
        registry.register(vendors::cisco_asa::profile()?);
        registry.register(vendors::generic::profile()?);
        Ok(registry)
    }

    /// Register a profile, replacing any existing one for the same family.
    pub fn register(&mut self, profile: OsProfile) -> Option<OsProfile> {
        self.profiles.insert(profile.os, profile)
    }

    pub fn get(&self, os: NetworkOs) -> Option<&OsProfile> {
        self.profiles.get(&os)
    }

    /// Profile for `os`, falling back to the `Unknown` profile.
    pub fn resolve(&self, os: NetworkOs) -> Option<&OsProfile> {
        self.get(os).or_else(|| self.get(NetworkOs::Unknown))
    }

    /// Registered families in registration order.
    pub fn families(&self) -> impl Iterator<Item = NetworkOs> + '_ {
        self.profiles.keys().copied()
    }
}
