//! Plan Data Model
//!
//! A [`Plan`] is the fully resolved bootstrap sequence: an ordered list of
//! stages, each carrying the steps it runs and the state reached once they
//! all succeed. Nothing here executes anything; see
//! [`crate::execution::Engine`].

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::state::BootstrapState;

/// An external program and its arguments.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    #[serde(default)]
    pub args: Vec<String>,
}

impl Invocation {
    /// Creates an invocation with no arguments.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    /// Appends a single argument.
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Appends several arguments.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Returns the invocation as a single argv vector.
    pub fn argv(&self) -> Vec<&str> {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect()
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.argv().into_iter().map(shell_word).collect();
        write!(f, "{}", rendered.join(" "))
    }
}

/// Quotes a word for display when it would not survive a shell unchanged.
fn shell_word(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:+,@%".contains(c));
    if plain {
        word.to_string()
    } else {
        format!("'{}'", word.replace('\'', r"'\''"))
    }
}

/// What a step does when it runs.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    /// Spawn an external command and wait for it.
    Run(Invocation),
    /// Put a directory at the front of `PATH`.
    PrependPath { dir: PathBuf },
    /// Leave a virtualenv that the CI image activated.
    DeactivateVirtualenv,
    /// Activate a named conda environment.
    ActivateCondaEnv { name: String, prefix: PathBuf },
    /// Set the executable bits on a file (relative paths resolve against the working dir).
    MakeExecutable { path: PathBuf },
}

impl Action {
    /// Returns true if the action spawns a process.
    pub fn is_external(&self) -> bool {
        matches!(self, Self::Run(_))
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Run(invocation) => write!(f, "{}", invocation),
            Self::PrependPath { dir } => write!(f, "export PATH={}:$PATH", dir.display()),
            Self::DeactivateVirtualenv => write!(f, "deactivate"),
            Self::ActivateCondaEnv { name, .. } => write!(f, "source activate {}", name),
            Self::MakeExecutable { path } => write!(f, "chmod +x {}", path.display()),
        }
    }
}

/// How a step failure is treated.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Abort the whole run.
    #[default]
    Fatal,
    /// Log `message` and carry on.
    Tolerated { message: String },
}

/// Phase of the bootstrap sequence a step belongs to.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    SystemSync,
    NativeLibraries,
    Distribution,
    TargetInstall,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SystemSync => "system package sync",
            Self::NativeLibraries => "native libraries",
            Self::Distribution => "python distribution",
            Self::TargetInstall => "target install",
        };
        write!(f, "{}", name)
    }
}

/// A single unit of work in the plan.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Stable identifier used in logs and reports
    pub id: String,

    /// Human readable summary
    pub description: String,

    pub action: Action,

    #[serde(default)]
    pub on_failure: FailurePolicy,
}

impl Step {
    /// Creates a fatal step.
    ///
    /// ```
    /// use ci_bootstrap::plan::{Action, FailurePolicy, Invocation, Step};
    ///
    /// let step = Step::new(
    ///     "apt_update",
    ///     "Refresh the package index",
    ///     Action::Run(Invocation::new("apt-get").args(["update", "-qq"])),
    /// );
    /// assert_eq!(step.on_failure, FailurePolicy::Fatal);
    /// ```
    pub fn new(id: impl Into<String>, description: impl Into<String>, action: Action) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            action,
            on_failure: FailurePolicy::Fatal,
        }
    }

    /// Shorthand for a fatal step that runs a command.
    pub fn run(id: impl Into<String>, description: impl Into<String>, invocation: Invocation) -> Self {
        Self::new(id, description, Action::Run(invocation))
    }

    /// Marks the step as tolerated, logging `message` when it fails.
    pub fn tolerate(mut self, message: impl Into<String>) -> Self {
        self.on_failure = FailurePolicy::Tolerated {
            message: message.into(),
        };
        self
    }

    /// Returns true if a failure of this step aborts the run.
    pub fn is_fatal(&self) -> bool {
        self.on_failure == FailurePolicy::Fatal
    }

    /// Returns the invocation if the step spawns a process.
    pub fn invocation(&self) -> Option<&Invocation> {
        match &self.action {
            Action::Run(invocation) => Some(invocation),
            _ => None,
        }
    }
}

/// A stage of the plan and the state reached when it completes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PlannedStage {
    pub stage: Stage,
    pub reaches: BootstrapState,
    pub steps: Vec<Step>,
}

impl PlannedStage {
    /// Returns true if the stage was skipped by the flags.
    pub fn is_skipped(&self) -> bool {
        self.steps.is_empty()
    }
}

/// The whole bootstrap sequence.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct Plan {
    pub stages: Vec<PlannedStage>,
}

impl Plan {
    /// Creates an empty plan.
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Appends a stage.
    pub fn push_stage(&mut self, stage: Stage, reaches: BootstrapState, steps: Vec<Step>) {
        self.stages.push(PlannedStage {
            stage,
            reaches,
            steps,
        });
    }

    /// Iterates over every step in execution order.
    pub fn steps(&self) -> impl Iterator<Item = &Step> {
        self.stages.iter().flat_map(|s| s.steps.iter())
    }

    /// Returns the number of steps.
    pub fn len(&self) -> usize {
        self.steps().count()
    }

    /// Returns true if the plan has no steps.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Finds a step by id.
    pub fn get_step(&self, id: &str) -> Option<&Step> {
        self.steps().find(|s| s.id == id)
    }

    /// Returns the position of a step in execution order.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.steps().position(|s| s.id == id)
    }

    /// Serializes the plan as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
