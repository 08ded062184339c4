//! Plan Builder
//!
//! Turns the CI flags into the concrete bootstrap sequence. Every stage is
//! always present in the plan; a stage the flags switch off is recorded
//! with no steps, so the state it "reaches" is still visible.

use log::{debug, info};

use crate::config::{Distribution, Flags, Settings};
use crate::environment::{conda, pip, Apt};

use super::model::{Plan, Stage};
use super::state::BootstrapState;

/// Builds the full plan for the given flags.
///
/// ```
/// use ci_bootstrap::config::{Flags, Settings};
/// use ci_bootstrap::plan::build_plan;
///
/// let plan = build_plan(&Flags::default(), &Settings::default());
/// let ids: Vec<&str> = plan.steps().map(|s| s.id.as_str()).collect();
/// assert_eq!(ids, vec!["apt_update", "pip_install_target"]);
/// ```
pub fn build_plan(flags: &Flags, settings: &Settings) -> Plan {
    let apt = Apt::from_settings(settings);
    let mut plan = Plan::new();

    plan.push_stage(
        Stage::SystemSync,
        BootstrapState::PackagesSynced,
        vec![apt.update()],
    );

    if flags.install_atlas {
        plan.push_stage(
            Stage::NativeLibraries,
            BootstrapState::AtlasInstalled,
            vec![apt.install_atlas(settings)],
        );
    } else {
        debug!("ATLAS not requested");
        plan.push_stage(Stage::NativeLibraries, BootstrapState::AtlasSkipped, Vec::new());
    }

    match &flags.distribution {
        Distribution::Conda => plan.push_stage(
            Stage::Distribution,
            BootstrapState::CondaProvisioned,
            conda::provision(flags, settings),
        ),
        Distribution::Ubuntu => plan.push_stage(
            Stage::Distribution,
            BootstrapState::UbuntuPackagesInstalled,
            vec![apt.install_python_stack(settings)],
        ),
        Distribution::Unmanaged(_) => {
            info!(
                "Distribution is {}; skipping interpreter provisioning",
                flags.distribution
            );
            plan.push_stage(
                Stage::Distribution,
                BootstrapState::DistributionSkipped,
                Vec::new(),
            )
        }
    }

    plan.push_stage(
        Stage::TargetInstall,
        BootstrapState::TargetInstalled,
        vec![pip::install_target(settings)],
    );

    plan
}
