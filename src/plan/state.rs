//! Bootstrap State Machine
//!
//! The sequence is straight-line, but tracking where it got to makes
//! logs and reports readable:
//!
//! ```text
//! Start -> PackagesSynced -> AtlasInstalled | AtlasSkipped
//!       -> CondaProvisioned | UbuntuPackagesInstalled | DistributionSkipped
//!       -> TargetInstalled -> Done
//! ```
//!
//! Any fatal failure moves to `Aborted`.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum BootstrapState {
    Start,
    PackagesSynced,
    AtlasInstalled,
    AtlasSkipped,
    CondaProvisioned,
    UbuntuPackagesInstalled,
    DistributionSkipped,
    TargetInstalled,
    Done,
    Aborted,
}

impl BootstrapState {
    /// Returns true for `Done` and `Aborted`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Aborted)
    }

    /// Returns true if `next` may directly follow this state.
    pub fn can_advance_to(self, next: BootstrapState) -> bool {
        use BootstrapState::*;

        if next == Aborted {
            return !self.is_terminal();
        }

        matches!(
            (self, next),
            (Start, PackagesSynced)
                | (PackagesSynced, AtlasInstalled | AtlasSkipped)
                | (
                    AtlasInstalled | AtlasSkipped,
                    CondaProvisioned | UbuntuPackagesInstalled | DistributionSkipped
                )
                | (
                    CondaProvisioned | UbuntuPackagesInstalled | DistributionSkipped,
                    TargetInstalled
                )
                | (TargetInstalled, Done)
        )
    }
}

impl Default for BootstrapState {
    fn default() -> Self {
        Self::Start
    }
}

impl fmt::Display for BootstrapState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::PackagesSynced => "packages synced",
            Self::AtlasInstalled => "ATLAS installed",
            Self::AtlasSkipped => "ATLAS skipped",
            Self::CondaProvisioned => "conda provisioned",
            Self::UbuntuPackagesInstalled => "ubuntu packages installed",
            Self::DistributionSkipped => "distribution skipped",
            Self::TargetInstalled => "target installed",
            Self::Done => "done",
            Self::Aborted => "aborted",
        };
        write!(f, "{}", name)
    }
}
