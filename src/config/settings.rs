//! Bootstrap Settings
//!
//! Tunables that the CI flags do not cover: where Miniconda comes from and
//! where it goes, the name of the test environment, and the package lists
//! handed to each package manager. Every field is optional in the YAML file;
//! the defaults reproduce the stock Travis setup.
//!
//! # Example YAML Format
//!
//! ```yaml
//! installer_url: http://repo.continuum.io/miniconda/Miniconda3-latest-Linux-x86_64.sh
//! install_prefix: /opt/miniconda
//! env_name: ci
//! use_sudo: false
//! ubuntu_packages:
//!   - python3-numpy
//!   - python3-yaml
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::BootstrapError;

/// Home directory used for home-relative defaults.
pub static HOME_DIR: Lazy<PathBuf> = Lazy::new(|| {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home)
});

/// Miniconda installer fetched when `DISTRIB=conda`.
pub const DEFAULT_INSTALLER_URL: &str =
    "http://repo.continuum.io/miniconda/Miniconda-latest-Linux-x86_64.sh";

/// Name of the conda environment the tests run in.
pub const DEFAULT_ENV_NAME: &str = "testenv";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// URL of the Miniconda batch installer
    pub installer_url: String,

    /// Where the installer is downloaded, relative to the working directory
    pub installer_path: PathBuf,

    /// Miniconda installation prefix
    pub install_prefix: PathBuf,

    /// Name of the conda environment created for the tests
    pub env_name: String,

    /// Prefix OS package manager calls with `sudo`
    pub use_sudo: bool,

    /// OS packages providing ATLAS and its headers
    pub atlas_packages: Vec<String>,

    /// OS-packaged Python libraries for `DISTRIB=ubuntu`
    pub ubuntu_packages: Vec<String>,

    /// Unpinned tools added to the conda environment
    pub conda_tools: Vec<String>,

    /// Conda package (and feature) name of MKL
    pub mkl_package: String,

    /// pip package that uploads coverage results
    pub coverage_helper: String,

    /// Path handed to `pip install` as the target package
    pub target: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            installer_url: DEFAULT_INSTALLER_URL.to_string(),
            installer_path: PathBuf::from("miniconda.sh"),
            install_prefix: HOME_DIR.join("miniconda"),
            env_name: DEFAULT_ENV_NAME.to_string(),
            use_sudo: true,
            atlas_packages: strings(&["libatlas3gf-base", "libatlas-dev"]),
            ubuntu_packages: strings(&[
                "python-numpy",
                "python-yaml",
                "python-nose",
                "python-pip",
                "python-coverage",
            ]),
            conda_tools: strings(&["pip", "nose", "coverage"]),
            mkl_package: "mkl".to_string(),
            coverage_helper: "coveralls".to_string(),
            target: ".".to_string(),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl Settings {
    /// Parses settings from YAML text.
    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        // A document with no content is null, not a map.
        let blank = content.lines().all(|line| {
            let line = line.trim();
            line.is_empty() || line.starts_with('#')
        });
        if blank {
            return Ok(Self::default());
        }

        let settings: Option<Self> = serde_yaml::from_str(content)?;
        Ok(settings.unwrap_or_default())
    }

    /// Loads settings from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, BootstrapError> {
        let path = path.as_ref();
        info!("Loading settings: {}", path.display());

        let content = fs::read_to_string(path).map_err(|e| BootstrapError::Settings {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let settings = Self::from_yaml(&content).map_err(|e| BootstrapError::Settings {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        debug!("Settings: {:?}", settings);
        Ok(settings)
    }

    /// Directory holding the Miniconda executables.
    pub fn conda_bin_dir(&self) -> PathBuf {
        self.install_prefix.join("bin")
    }

    /// Prefix of the named test environment.
    pub fn env_prefix(&self) -> PathBuf {
        self.install_prefix.join("envs").join(&self.env_name)
    }
}
