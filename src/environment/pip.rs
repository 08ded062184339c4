//! Python Package Installer
//!
//! `pip` is resolved through the current `PATH`, so after conda activation
//! these steps install into the test environment.

use crate::config::Settings;
use crate::plan::{Invocation, Step};

fn pip_install<I, S>(packages: I) -> Invocation
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Invocation::new("pip").arg("install").args(packages)
}

/// Installs the coverage upload helper.
pub fn install_coverage_helper(settings: &Settings) -> Step {
    Step::run(
        "pip_install_coverage_helper",
        "Install the coverage upload helper",
        pip_install([settings.coverage_helper.as_str()]),
    )
}

/// Installs the project under test.
pub fn install_target(settings: &Settings) -> Step {
    Step::run(
        "pip_install_target",
        "Install the target package",
        pip_install([settings.target.as_str()]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_target_current_dir() {
        let step = install_target(&Settings::default());
        assert_eq!(step.invocation().unwrap().to_string(), "pip install .");
        assert!(step.is_fatal());
    }

    #[test]
    fn test_install_coverage_helper() {
        let step = install_coverage_helper(&Settings::default());
        assert_eq!(step.invocation().unwrap().argv(), vec!["pip", "install", "coveralls"]);
    }
}
