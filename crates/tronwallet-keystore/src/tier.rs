//! Platform capability tiers
//!
//! A platform reports an integer capability level. Each key-store backend
//! declares the minimum level it needs; the selected backend is always the
//! most capable one whose requirement is met.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Integer platform capability ordinal (an Android SDK level on devices)
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct PlatformLevel(pub u32);

impl PlatformLevel {
    /// Best guess at the running platform's level when nothing is configured.
    ///
    /// Mobile targets get the hardware tier, everything else the sealed-file tier.
    pub fn detect() -> Self {
        #[cfg(any(target_os = "android", target_os = "ios", target_os = "macos"))]
        return CapabilityTier::Hardware.min_level();

        #[cfg(not(any(target_os = "android", target_os = "ios", target_os = "macos")))]
        return CapabilityTier::Sealed.min_level();
    }

    /// Raw value
    pub fn get(self) -> u32 {
        self.0
    }
}

impl From<u32> for PlatformLevel {
    fn from(level: u32) -> Self {
        Self(level)
    }
}

impl fmt::Display for PlatformLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "level {}", self.0)
    }
}

/// Security capability tier, ordered lowest to highest
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityTier {
    /// In-process key material
    Software,
    /// Files sealed under a device key
    Sealed,
    /// Keys wrapped by a non-exportable platform key
    Hardware,
}

impl CapabilityTier {
    /// All tiers, lowest first
    pub const ALL: [CapabilityTier; 3] = [
        CapabilityTier::Software,
        CapabilityTier::Sealed,
        CapabilityTier::Hardware,
    ];

    /// Lowest defined tier
    pub const LOWEST: CapabilityTier = CapabilityTier::Software;

    /// Minimum platform level this tier's backend requires
    pub const fn min_level(self) -> PlatformLevel {
        match self {
            CapabilityTier::Software => PlatformLevel(15),
            CapabilityTier::Sealed => PlatformLevel(18),
            CapabilityTier::Hardware => PlatformLevel(23),
        }
    }

    /// Highest tier whose requirement is satisfied by `level`.
    ///
    /// Levels below every requirement resolve to [`CapabilityTier::LOWEST`].
    pub fn for_level(level: PlatformLevel) -> Self {
        Self::ALL
            .iter()
            .rev()
            .copied()
            .find(|tier| tier.min_level() <= level)
            .unwrap_or(Self::LOWEST)
    }

    /// Stable name used in logs and status output
    pub fn as_str(self) -> &'static str {
        match self {
            CapabilityTier::Software => "software",
            CapabilityTier::Sealed => "sealed",
            CapabilityTier::Hardware => "hardware",
        }
    }
}

impl fmt::Display for CapabilityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
