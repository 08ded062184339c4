//! Command Runner
//!
//! The seam between the engine and the operating system. The engine hands
//! over an invocation together with the current environment overlay and
//! working directory; the runner reports how the process exited.

use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

use log::debug;

use crate::environment::ProcessEnv;
use crate::plan::Invocation;

/// Exit status of a finished command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandStatus {
    /// Exit code, `None` when the process was killed by a signal
    pub code: Option<i32>,
}

impl CommandStatus {
    pub fn from_code(code: i32) -> Self {
        Self { code: Some(code) }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Executes external commands on behalf of the engine.
pub trait CommandRunner {
    /// Runs `invocation` to completion.
    ///
    /// An `Err` means the process could not be started at all.
    fn run(
        &mut self,
        invocation: &Invocation,
        env: &ProcessEnv,
        cwd: &Path,
    ) -> io::Result<CommandStatus>;
}

/// Spawns real processes with inherited stdio, so package manager output
/// streams straight to the CI log.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl SystemRunner {
    pub fn new() -> Self {
        Self
    }
}

/// Resolves a program name against the overlay `PATH`.
///
/// Names containing a `/` are paths and resolve against `cwd`.
pub fn resolve_program(program: &str, env: &ProcessEnv, cwd: &Path) -> io::Result<PathBuf> {
    if program.contains('/') {
        let path = Path::new(program);
        return Ok(if path.is_absolute() {
            path.to_path_buf()
        } else {
            cwd.join(path)
        });
    }

    which::which_in(program, env.path(), cwd).map_err(|e| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("'{}' not found on PATH: {}", program, e),
        )
    })
}

impl CommandRunner for SystemRunner {
    fn run(
        &mut self,
        invocation: &Invocation,
        env: &ProcessEnv,
        cwd: &Path,
    ) -> io::Result<CommandStatus> {
        let program = resolve_program(&invocation.program, env, cwd)?;
        debug!("Resolved '{}' to {}", invocation.program, program.display());

        let status = Command::new(&program)
            .args(&invocation.args)
            .env_clear()
            .envs(env.vars())
            .current_dir(cwd)
            .status()?;

        Ok(CommandStatus {
            code: status.code(),
        })
    }
}
