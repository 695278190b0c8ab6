//! Cable types, charging paths and the skip-check collaborator

use crate::telemetry::Telemetry;
use crate::vote::VoterId;
use enumset::{EnumSet, EnumSetType};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Attached power source
#[derive(Debug, Default, Hash, EnumSetType, Serialize, Deserialize)]
#[enumset(serialize_repr = "list")]
#[serde(rename_all = "snake_case")]
pub enum CableType {
    #[default]
    None,
    Usb,
    /// Plain travel adapter
    Ta,
    /// High-voltage (AFC/QC) adapter
    HvTa,
    /// USB PD fixed PDO
    Pd,
    /// USB PD programmable supply, used for direct charging
    PdApdo,
    Wireless,
    HvWireless,
}

impl CableType {
    /// Charging path governing this cable, `None` when nothing is attached
    pub const fn path(self) -> Option<ChargingPath> {
        match self {
            Self::None => None,
            Self::PdApdo => Some(ChargingPath::Direct),
            Self::Wireless | Self::HvWireless => Some(ChargingPath::Wireless),
            Self::Usb | Self::Ta | Self::HvTa | Self::Pd => Some(ChargingPath::Wired),
        }
    }
}

/// Independent step-charging path with its own state and voter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChargingPath {
    Wired,
    Wireless,
    Direct,
}

impl ChargingPath {
    pub const ALL: [Self; 3] = [Self::Wired, Self::Wireless, Self::Direct];

    /// Voter casting this path's FCC/FV votes
    pub const fn voter(self) -> VoterId {
        match self {
            Self::Wired => VoterId::StepCharge,
            Self::Wireless => VoterId::WirelessStepCharge,
            Self::Direct => VoterId::DirectStepCharge,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Wired => "wired",
            Self::Wireless => "wireless",
            Self::Direct => "direct",
        }
    }
}

impl fmt::Display for ChargingPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Decides whether step charging should stand down for the present cable
///
/// Consulted only by tables carrying the `online` condition.
pub trait SkipCheck: Send + Sync {
    fn should_skip(&self, telemetry: &Telemetry, cable: CableType) -> bool;
}

/// Skips every cable outside an allow-list
#[derive(Debug, Clone, Copy, Default)]
pub struct CablePolicy {
    online_cables: EnumSet<CableType>,
}

impl CablePolicy {
    pub const fn new(online_cables: EnumSet<CableType>) -> Self {
        Self { online_cables }
    }
}

impl SkipCheck for CablePolicy {
    fn should_skip(&self, _telemetry: &Telemetry, cable: CableType) -> bool {
        !self.online_cables.contains(cable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cable_paths() {
        assert_eq!(CableType::None.path(), None);
        assert_eq!(CableType::HvTa.path(), Some(ChargingPath::Wired));
        assert_eq!(CableType::Pd.path(), Some(ChargingPath::Wired));
        assert_eq!(CableType::PdApdo.path(), Some(ChargingPath::Direct));
        assert_eq!(CableType::HvWireless.path(), Some(ChargingPath::Wireless));
    }

    #[test]
    fn paths_use_distinct_voters() {
        let wired = ChargingPath::Wired.voter();
        let wireless = ChargingPath::Wireless.voter();
        let direct = ChargingPath::Direct.voter();
        assert_ne!(wired, wireless);
        assert_ne!(wired, direct);
        assert_ne!(wireless, direct);
    }

    #[test]
    fn cable_policy_skips_unlisted() {
        let policy = CablePolicy::new(CableType::HvTa | CableType::Pd);
        let t = Telemetry::default();
        assert!(!policy.should_skip(&t, CableType::HvTa));
        assert!(policy.should_skip(&t, CableType::Ta));
        assert!(CablePolicy::default().should_skip(&t, CableType::Pd));
    }
}
