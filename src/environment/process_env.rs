//! Process Environment Overlay
//!
//! A private copy of the environment that every spawned command receives.
//! Steps such as "put Miniconda on PATH" or "activate testenv" mutate the
//! overlay instead of the bootstrapper's own environment, which keeps the
//! mutation scoped to this run and makes it inspectable in tests.

use std::collections::BTreeMap;
use std::env;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::BootstrapError;

/// Environment handed to every spawned command.
///
/// Names and values are kept as `OsString` so variables that are not
/// valid UTF-8 reach child processes untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessEnv {
    /// Variables as captured, for computing what changed
    initial: BTreeMap<OsString, OsString>,

    /// Variables as they stand now
    vars: BTreeMap<OsString, OsString>,
}

impl ProcessEnv {
    /// Snapshots the current process environment.
    pub fn capture() -> Self {
        Self::from_vars(env::vars_os())
    }

    /// Builds an overlay from explicit variables.
    pub fn from_vars<I, K, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<OsString>,
        V: Into<OsString>,
    {
        let vars: BTreeMap<OsString, OsString> =
            vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        Self {
            initial: vars.clone(),
            vars,
        }
    }

    /// Returns a variable's value, or `None` if unset or not valid UTF-8.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_os(name).and_then(OsStr::to_str)
    }

    /// Returns a variable's raw value.
    pub fn get_os(&self, name: &str) -> Option<&OsStr> {
        self.vars.get(OsStr::new(name)).map(OsString::as_os_str)
    }

    /// Sets a variable, replacing any previous value.
    pub fn set(&mut self, name: impl Into<OsString>, value: impl Into<OsString>) {
        self.vars.insert(name.into(), value.into());
    }

    /// Removes a variable.
    pub fn unset(&mut self, name: &str) {
        self.vars.remove(OsStr::new(name));
    }

    /// All variables, for handing to a child process.
    pub fn vars(&self) -> &BTreeMap<OsString, OsString> {
        &self.vars
    }

    /// The `PATH` entries in search order.
    pub fn path_entries(&self) -> Vec<PathBuf> {
        self.get_os("PATH")
            .map(|p| env::split_paths(p).collect())
            .unwrap_or_default()
    }

    /// The raw `PATH` value, as used for program lookup.
    pub fn path(&self) -> Option<OsString> {
        self.get_os("PATH").map(OsStr::to_os_string)
    }

    /// Rewrites `PATH`. Fails if an entry contains the path separator.
    fn set_path_entries(&mut self, entries: Vec<PathBuf>) -> Result<(), BootstrapError> {
        let joined = env::join_paths(entries)?;
        self.set("PATH", joined);
        Ok(())
    }

    /// Puts `dir` at the front of `PATH`.
    pub fn prepend_path(&mut self, dir: &Path) -> Result<(), BootstrapError> {
        let mut entries = vec![dir.to_path_buf()];
        entries.extend(self.path_entries());
        self.set_path_entries(entries)?;
        debug!("PATH is now {:?}", self.get_os("PATH").unwrap_or_default());
        Ok(())
    }

    /// Leaves an active virtualenv, if any.
    ///
    /// Returns the virtualenv that was left.
    pub fn deactivate_virtualenv(&mut self) -> Result<Option<PathBuf>, BootstrapError> {
        let Some(venv) = self.get_os("VIRTUAL_ENV").map(PathBuf::from) else {
            return Ok(None);
        };
        let venv_bin = venv.join("bin");

        let entries: Vec<PathBuf> = self
            .path_entries()
            .into_iter()
            .filter(|entry| entry != &venv_bin)
            .collect();
        self.set_path_entries(entries)?;
        self.unset("VIRTUAL_ENV");

        Ok(Some(venv))
    }

    /// Activates a conda environment living at `prefix`.
    ///
    /// Nothing is changed if the environment's `bin` cannot go on `PATH`.
    pub fn activate_conda_env(&mut self, name: &str, prefix: &Path) -> Result<(), BootstrapError> {
        self.prepend_path(&prefix.join("bin"))?;
        self.set("CONDA_PREFIX", prefix.as_os_str());
        self.set("CONDA_DEFAULT_ENV", name);
        Ok(())
    }

    /// Variables whose value differs from the snapshot, with `None` for removed ones.
    pub fn changes(&self) -> BTreeMap<OsString, Option<OsString>> {
        let mut changes = BTreeMap::new();

        for (name, value) in &self.vars {
            if self.initial.get(name) != Some(value) {
                changes.insert(name.clone(), Some(value.clone()));
            }
        }

        for name in self.initial.keys() {
            if !self.vars.contains_key(name) {
                changes.insert(name.clone(), None);
            }
        }

        changes
    }

    /// Renders the changes as a POSIX shell snippet for `source`.
    pub fn export_script(&self) -> String {
        let mut script = String::from("# Environment prepared by ci-bootstrap\n");

        for (name, value) in self.changes() {
            let name = name.to_string_lossy();
            match value {
                Some(value) => script.push_str(&format!(
                    "export {}={}\n",
                    name,
                    quote(&value.to_string_lossy())
                )),
                None => script.push_str(&format!("unset {}\n", name)),
            }
        }

        script
    }
}

/// Single-quotes a value for a POSIX shell.
fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}
