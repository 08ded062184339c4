//! Conda Provisioning
//!
//! Builds the `DISTRIB=conda` branch: fetch the Miniconda batch installer,
//! install it under the configured prefix, put it on `PATH`, make conda
//! non-interactive, create the pinned test environment and activate it.
//! MKL and the coverage helper are toggled afterwards.
//!
//! # Created Environment
//!
//! ```text
//! conda create -n testenv --yes python=$PYTHON_VERSION pip nose coverage \
//!     numpy=$NUMPY_VERSION pyyaml=$PYYAML_VERSION
//! ```

use crate::config::{Flags, Settings};
use crate::plan::{Action, Invocation, Step};

use super::pip;

/// Diagnostic logged when removing the MKL feature fails.
pub const MKL_NOT_INSTALLED: &str = "MKL not installed";

fn conda_command() -> Invocation {
    Invocation::new("conda")
}

/// Formats a `name=version` spec, or just `name` when no version is given.
pub fn pin(name: &str, version: Option<&str>) -> String {
    match version {
        Some(version) => format!("{}={}", name, version),
        None => name.to_string(),
    }
}

/// Package specs for the test environment, in install order.
pub fn environment_specs(flags: &Flags, settings: &Settings) -> Vec<String> {
    let mut specs = vec![pin("python", flags.python_version.as_deref())];
    specs.extend(settings.conda_tools.iter().cloned());
    specs.push(pin("numpy", flags.numpy_version.as_deref()));
    specs.push(pin("pyyaml", flags.pyyaml_version.as_deref()));
    specs
}

/// Steps that download and install Miniconda and put it on `PATH`.
pub fn install_miniconda(settings: &Settings) -> Vec<Step> {
    let installer = settings.installer_path.display().to_string();

    vec![
        Step::new(
            "deactivate_virtualenv",
            "Leave the pre-activated virtualenv",
            Action::DeactivateVirtualenv,
        ),
        Step::run(
            "download_miniconda",
            "Download the Miniconda installer",
            Invocation::new("wget")
                .arg(settings.installer_url.as_str())
                .arg("-O")
                .arg(installer.as_str()),
        ),
        Step::new(
            "chmod_installer",
            "Make the installer executable",
            Action::MakeExecutable {
                path: settings.installer_path.clone(),
            },
        ),
        Step::run(
            "install_miniconda",
            "Run the Miniconda installer in batch mode",
            Invocation::new(installer_program(&installer))
                .arg("-b")
                .arg("-p")
                .arg(settings.install_prefix.display().to_string()),
        ),
        Step::new(
            "prepend_conda_path",
            "Put Miniconda on PATH",
            Action::PrependPath {
                dir: settings.conda_bin_dir(),
            },
        ),
    ]
}

/// A bare file name would be looked up on `PATH`; force a relative path.
fn installer_program(installer: &str) -> String {
    if installer.contains('/') {
        installer.to_string()
    } else {
        format!("./{}", installer)
    }
}

/// Steps that configure conda and create the activated test environment.
pub fn create_environment(flags: &Flags, settings: &Settings) -> Vec<Step> {
    vec![
        Step::run(
            "conda_config",
            "Configure conda for non-interactive use",
            conda_command().args([
                "config",
                "--set",
                "always_yes",
                "yes",
                "--set",
                "changeps1",
                "no",
            ]),
        ),
        Step::run(
            "conda_update",
            "Update conda itself",
            conda_command().args(["update", "-q", "conda"]),
        ),
        Step::run(
            "conda_info",
            "Print conda diagnostics",
            conda_command().args(["info", "-a"]),
        ),
        Step::run(
            "conda_create_env",
            format!("Create the '{}' environment", settings.env_name),
            conda_command()
                .args(["create", "-n", settings.env_name.as_str(), "--yes"])
                .args(environment_specs(flags, settings)),
        ),
        Step::new(
            "activate_env",
            format!("Activate the '{}' environment", settings.env_name),
            Action::ActivateCondaEnv {
                name: settings.env_name.clone(),
                prefix: settings.env_prefix(),
            },
        ),
    ]
}

/// Installs MKL, or removes the feature without failing the run.
pub fn toggle_mkl(flags: &Flags, settings: &Settings) -> Step {
    if flags.install_mkl {
        Step::run(
            "conda_install_mkl",
            "Install MKL",
            conda_command().args(["install", "--yes", settings.mkl_package.as_str()]),
        )
    } else {
        Step::run(
            "conda_remove_mkl",
            "Remove the MKL feature",
            conda_command().args(["remove", "--yes", "--features", settings.mkl_package.as_str()]),
        )
        .tolerate(MKL_NOT_INSTALLED)
    }
}

/// The complete `DISTRIB=conda` branch.
pub fn provision(flags: &Flags, settings: &Settings) -> Vec<Step> {
    let mut steps = install_miniconda(settings);
    steps.extend(create_environment(flags, settings));
    steps.push(toggle_mkl(flags, settings));

    if flags.coverage {
        steps.push(pip::install_coverage_helper(settings));
    }

    steps
}
