//! Environment Flags
//!
//! The bootstrap sequence is driven entirely by a handful of environment
//! variables set by the CI matrix. Values are never validated: a boolean
//! flag is on only for the exact string `"true"`, and an unknown
//! distribution name simply skips interpreter provisioning.

use std::env;
use std::fmt;

use serde::{Deserialize, Serialize};

/// `"true"` installs the ATLAS linear-algebra packages.
pub const INSTALL_ATLAS: &str = "INSTALL_ATLAS";
/// Which Python distribution to provision (`conda`, `ubuntu`, other).
pub const DISTRIB: &str = "DISTRIB";
/// Interpreter version pinned in the conda environment.
pub const PYTHON_VERSION: &str = "PYTHON_VERSION";
/// numpy version pinned in the conda environment.
pub const NUMPY_VERSION: &str = "NUMPY_VERSION";
/// PyYAML version pinned in the conda environment.
pub const PYYAML_VERSION: &str = "PYYAML_VERSION";
/// `"true"` installs MKL, anything else tries to remove it.
pub const INSTALL_MKL: &str = "INSTALL_MKL";
/// `"true"` installs the coverage upload helper (conda only).
pub const COVERAGE: &str = "COVERAGE";

/// All variables consulted by [`Flags::from_lookup`].
pub const ALL_FLAGS: &[&str] = &[
    INSTALL_ATLAS,
    DISTRIB,
    PYTHON_VERSION,
    NUMPY_VERSION,
    PYYAML_VERSION,
    INSTALL_MKL,
    COVERAGE,
];

/// Python distribution selected by `DISTRIB`.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Distribution {
    /// Miniconda download plus an isolated conda environment.
    Conda,
    /// Python libraries packaged by the OS.
    Ubuntu,
    /// Unset or unrecognised; interpreter provisioning is skipped.
    Unmanaged(Option<String>),
}

impl Distribution {
    /// Maps the raw `DISTRIB` value. Matching is exact and case sensitive.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("conda") => Self::Conda,
            Some("ubuntu") => Self::Ubuntu,
            other => Self::Unmanaged(other.map(str::to_string)),
        }
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conda => write!(f, "conda"),
            Self::Ubuntu => write!(f, "ubuntu"),
            Self::Unmanaged(Some(name)) => write!(f, "unmanaged ('{}')", name),
            Self::Unmanaged(None) => write!(f, "unmanaged (unset)"),
        }
    }
}

/// Snapshot of the CI flags, read once before the plan is built.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Flags {
    pub install_atlas: bool,
    pub distribution: Distribution,
    pub python_version: Option<String>,
    pub numpy_version: Option<String>,
    pub pyyaml_version: Option<String>,
    pub install_mkl: bool,
    pub coverage: bool,
}

impl Flags {
    /// Reads the flags from the current process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Reads the flags through an arbitrary variable lookup.
    ///
    /// ```
    /// use ci_bootstrap::config::{Distribution, Flags};
    ///
    /// let flags = Flags::from_lookup(|name| match name {
    ///     "DISTRIB" => Some("conda".to_string()),
    ///     "PYTHON_VERSION" => Some("3.8".to_string()),
    ///     _ => None,
    /// });
    /// assert_eq!(flags.distribution, Distribution::Conda);
    /// assert_eq!(flags.python_version.as_deref(), Some("3.8"));
    /// assert!(!flags.install_mkl);
    /// ```
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let is_true = |name: &str| lookup(name).as_deref() == Some("true");
        let version = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        Self {
            install_atlas: is_true(INSTALL_ATLAS),
            distribution: Distribution::parse(lookup(DISTRIB).as_deref()),
            python_version: version(PYTHON_VERSION),
            numpy_version: version(NUMPY_VERSION),
            pyyaml_version: version(PYYAML_VERSION),
            install_mkl: is_true(INSTALL_MKL),
            coverage: is_true(COVERAGE),
        }
    }
}

impl Default for Flags {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}
