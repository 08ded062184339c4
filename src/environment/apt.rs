//! OS Package Manager
//!
//! Steps that go through `apt-get`: the index refresh every run starts
//! with, the optional ATLAS libraries and the OS-packaged Python stack.

use crate::config::Settings;
use crate::plan::{Invocation, Step};

/// Builds `apt-get` invocations, optionally through `sudo`.
#[derive(Debug, Clone, Copy)]
pub struct Apt {
    use_sudo: bool,
}

impl Apt {
    /// `use_sudo` prefixes every invocation with `sudo`.
    pub fn new(use_sudo: bool) -> Self {
        Self { use_sudo }
    }

    /// Uses the `use_sudo` setting.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.use_sudo)
    }

    fn command(&self) -> Invocation {
        if self.use_sudo {
            Invocation::new("sudo").arg("apt-get")
        } else {
            Invocation::new("apt-get")
        }
    }

    /// `apt-get update -qq`
    pub fn update(&self) -> Step {
        Step::run(
            "apt_update",
            "Refresh the OS package index",
            self.command().args(["update", "-qq"]),
        )
    }

    /// `apt-get install -qq <packages>`
    pub fn install(&self, id: &str, description: &str, packages: &[String]) -> Step {
        Step::run(
            id,
            description,
            self.command().args(["install", "-qq"]).args(packages.iter().cloned()),
        )
    }

    /// ATLAS runtime and headers.
    pub fn install_atlas(&self, settings: &Settings) -> Step {
        self.install(
            "apt_install_atlas",
            "Install the ATLAS linear-algebra libraries",
            &settings.atlas_packages,
        )
    }

    /// The fixed OS-packaged Python library list.
    pub fn install_python_stack(&self, settings: &Settings) -> Step {
        self.install(
            "apt_install_python",
            "Install OS-packaged Python libraries",
            &settings.ubuntu_packages,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_uses_sudo_by_default() {
        let apt = Apt::from_settings(&Settings::default());
        let step = apt.update();
        assert_eq!(
            step.invocation().unwrap().argv(),
            vec!["sudo", "apt-get", "update", "-qq"]
        );
        assert!(step.is_fatal());
    }

    #[test]
    fn test_without_sudo() {
        let step = Apt::new(false).update();
        assert_eq!(step.invocation().unwrap().program, "apt-get");
    }

    #[test]
    fn test_install_atlas_packages() {
        let settings = Settings::default();
        let step = Apt::from_settings(&settings).install_atlas(&settings);
        assert_eq!(
            step.invocation().unwrap().to_string(),
            "sudo apt-get install -qq libatlas3gf-base libatlas-dev"
        );
    }

    #[test]
    fn test_install_python_stack() {
        let settings = Settings::default();
        let step = Apt::new(true).install_python_stack(&settings);
        let args = &step.invocation().unwrap().args;
        assert_eq!(&args[..3], &["apt-get", "install", "-qq"]);
        assert_eq!(&args[3..], settings.ubuntu_packages.as_slice());
    }
}
