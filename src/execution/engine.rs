//! Bootstrap Execution Engine
//!
//! Walks a [`Plan`] stage by stage, strictly in order:
//! - external commands go through a [`CommandRunner`]
//! - environment actions mutate the engine's [`ProcessEnv`] overlay
//! - the first fatal failure aborts the run, tolerated failures are logged
//! - every step is timed and recorded in a [`RunReport`]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use log::{debug, error, info, warn};

use crate::environment::ProcessEnv;
use crate::error::BootstrapError;
use crate::monitoring::{EventType, ExecutionTimeline, RunReport, StepStatus};
use crate::plan::{Action, BootstrapState, FailurePolicy, Plan, Stage, Step};

use super::runner::CommandRunner;

/// Fail-fast plan executor.
///
/// # Example
///
/// ```rust,no_run
/// use ci_bootstrap::config::{Flags, Settings};
/// use ci_bootstrap::environment::ProcessEnv;
/// use ci_bootstrap::execution::{Engine, SystemRunner};
/// use ci_bootstrap::plan::build_plan;
///
/// fn main() -> Result<(), ci_bootstrap::BootstrapError> {
///     let plan = build_plan(&Flags::from_env(), &Settings::default());
///     let mut engine = Engine::new(plan, ProcessEnv::capture());
///     engine.set_working_dir("/home/ci/project");
///     engine.run(&mut SystemRunner::new())?;
///     Ok(())
/// }
/// ```
pub struct Engine {
    plan: Plan,
    env: ProcessEnv,
    working_dir: PathBuf,
    dry_run: bool,
    state: BootstrapState,
    timeline: ExecutionTimeline,
    report: RunReport,
}

impl Engine {
    /// Creates an engine for `plan`, starting from the given environment.
    pub fn new(plan: Plan, env: ProcessEnv) -> Self {
        Self {
            plan,
            env,
            working_dir: PathBuf::from("."),
            dry_run: false,
            state: BootstrapState::Start,
            timeline: ExecutionTimeline::new(),
            report: RunReport::new(false),
        }
    }

    /// Enables or disables dry run mode.
    pub fn set_dry_run(&mut self, dry_run: bool) {
        self.dry_run = dry_run;
    }

    /// Sets the directory commands run in.
    pub fn set_working_dir(&mut self, dir: impl Into<PathBuf>) {
        self.working_dir = dir.into();
    }

    /// The plan this engine executes.
    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    /// Current bootstrap state.
    pub fn state(&self) -> BootstrapState {
        self.state
    }

    /// The environment overlay as left by the executed steps.
    pub fn env(&self) -> &ProcessEnv {
        &self.env
    }

    /// Step timings of the last run.
    pub fn timeline(&self) -> &ExecutionTimeline {
        &self.timeline
    }

    /// Report of the last run, complete once `run` has returned.
    pub fn report(&self) -> &RunReport {
        &self.report
    }

    /// Executes the plan.
    ///
    /// # Returns
    ///
    /// * `Ok(())` - Every stage completed; state is `Done`
    /// * `Err` - A fatal step failed; state is `Aborted`
    pub fn run(&mut self, runner: &mut dyn CommandRunner) -> Result<(), BootstrapError> {
        self.state = BootstrapState::Start;
        self.timeline = ExecutionTimeline::new();
        self.report = RunReport::new(self.dry_run);

        info!(
            "Starting bootstrap ({} steps, dry run: {})",
            self.plan.len(),
            self.dry_run
        );

        let stages = self.plan.stages.clone();

        for planned in &stages {
            if planned.is_skipped() {
                info!("Skipping {}", planned.stage);
            } else {
                info!("==> {}", planned.stage);
            }

            for step in &planned.steps {
                if let Err(e) = self.execute_step(planned.stage, step, runner) {
                    self.transition(BootstrapState::Aborted);
                    self.report
                        .finish(BootstrapState::Aborted, Some(step.id.clone()));
                    return Err(e);
                }
            }

            self.transition(planned.reaches);
        }

        self.transition(BootstrapState::Done);
        self.report.finish(BootstrapState::Done, None);
        info!("Bootstrap complete");

        Ok(())
    }

    fn transition(&mut self, next: BootstrapState) {
        if !self.state.can_advance_to(next) {
            warn!("Unexpected state transition: {} -> {}", self.state, next);
        }
        debug!("State: {} -> {}", self.state, next);
        self.state = next;
    }

    /// Runs one step and applies its failure policy.
    fn execute_step(
        &mut self,
        stage: Stage,
        step: &Step,
        runner: &mut dyn CommandRunner,
    ) -> Result<(), BootstrapError> {
        info!("[{}] {}", step.id, step.action);

        if self.dry_run {
            // Keep the overlay accurate so later commands display as they would run.
            if !matches!(step.action, Action::Run(_) | Action::MakeExecutable { .. }) {
                self.perform(step, runner)?;
            }
            self.report
                .record(stage, step, StepStatus::Planned, Default::default());
            return Ok(());
        }

        self.timeline.add_event(step.id.as_str(), EventType::Started);
        let started = Instant::now();
        let outcome = self.perform(step, runner);
        let elapsed = started.elapsed();

        match outcome {
            Ok(()) => {
                self.timeline.add_event(step.id.as_str(), EventType::Completed);
                self.report
                    .record(stage, step, StepStatus::Succeeded, elapsed);
                Ok(())
            }
            Err(e) => match &step.on_failure {
                FailurePolicy::Tolerated { message } => {
                    warn!("{}", message);
                    debug!("Step '{}' failure tolerated: {}", step.id, e);
                    self.timeline.add_event(step.id.as_str(), EventType::Tolerated);
                    self.report.record(
                        stage,
                        step,
                        StepStatus::Tolerated {
                            message: message.clone(),
                        },
                        elapsed,
                    );
                    Ok(())
                }
                FailurePolicy::Fatal => {
                    error!("{}", e);
                    self.timeline.add_event(step.id.as_str(), EventType::Failed);
                    let code = match &e {
                        BootstrapError::StepFailed { code, .. } => *code,
                        _ => None,
                    };
                    self.report.record(
                        stage,
                        step,
                        StepStatus::Failed {
                            code,
                            error: e.to_string(),
                        },
                        elapsed,
                    );
                    Err(e)
                }
            },
        }
    }

    /// Carries out a step's action.
    fn perform(&mut self, step: &Step, runner: &mut dyn CommandRunner) -> Result<(), BootstrapError> {
        match &step.action {
            Action::Run(invocation) => {
                let status = runner
                    .run(invocation, &self.env, &self.working_dir)
                    .map_err(|source| BootstrapError::Spawn {
                        step: step.id.clone(),
                        source,
                    })?;

                if status.success() {
                    Ok(())
                } else {
                    Err(BootstrapError::StepFailed {
                        step: step.id.clone(),
                        code: status.code,
                    })
                }
            }
            Action::PrependPath { dir } => self.env.prepend_path(dir),
            Action::DeactivateVirtualenv => {
                match self.env.deactivate_virtualenv()? {
                    Some(venv) => info!("Left virtualenv {}", venv.display()),
                    None => debug!("No virtualenv active"),
                }
                Ok(())
            }
            Action::ActivateCondaEnv { name, prefix } => {
                self.env.activate_conda_env(name, prefix)?;
                info!("Activated conda environment '{}'", name);
                Ok(())
            }
            Action::MakeExecutable { path } => {
                make_executable(&self.working_dir.join(path))?;
                Ok(())
            }
        }
    }
}

/// Adds the executable bits to a file.
fn make_executable(path: &Path) -> Result<(), BootstrapError> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let mut permissions = fs::metadata(path)?.permissions();
        permissions.set_mode(permissions.mode() | 0o755);
        fs::set_permissions(path, permissions)?;
    }

    #[cfg(not(unix))]
    {
        fs::metadata(path)?;
    }

    debug!("Made {} executable", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Distribution, Flags, Settings};
    use crate::environment::MKL_NOT_INSTALLED;
    use crate::execution::testing::RecordingRunner;
    use crate::plan::{build_plan, Invocation};
    use tempfile::tempdir;

    const BASE_PATH: &str = "/usr/local/bin:/usr/bin:/bin";

    fn ci_env() -> ProcessEnv {
        ProcessEnv::from_vars([
            ("PATH", format!("/home/travis/virtualenv/python2.7/bin:{}", BASE_PATH)),
            ("VIRTUAL_ENV", "/home/travis/virtualenv/python2.7".to_string()),
        ])
    }

    fn settings() -> Settings {
        Settings {
            install_prefix: PathBuf::from("/home/travis/miniconda"),
            ..Settings::default()
        }
    }

    /// Conda runs need the installer file for the chmod step.
    fn engine_for(flags: &Flags) -> (Engine, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("miniconda.sh"), "#!/bin/sh\n").unwrap();

        let mut engine = Engine::new(build_plan(flags, &settings()), ci_env());
        engine.set_working_dir(dir.path());
        (engine, dir)
    }

    fn conda_flags() -> Flags {
        Flags {
            distribution: Distribution::Conda,
            python_version: Some("3.8".to_string()),
            ..Flags::default()
        }
    }

    #[test]
    fn test_unmanaged_distribution_leaves_path_alone() {
        let (mut engine, _dir) = engine_for(&Flags::default());
        let mut runner = RecordingRunner::new();

        engine.run(&mut runner).unwrap();

        assert_eq!(
            runner.commands(),
            vec!["sudo apt-get update -qq", "pip install ."]
        );
        assert_eq!(engine.env(), &ci_env());
        assert!(engine.env().changes().is_empty());
        assert_eq!(engine.state(), BootstrapState::Done);
    }

    #[test]
    fn test_atlas_ubuntu_scenario() {
        let flags = Flags {
            install_atlas: true,
            distribution: Distribution::Ubuntu,
            ..Flags::default()
        };
        let (mut engine, _dir) = engine_for(&flags);
        let mut runner = RecordingRunner::new();

        engine.run(&mut runner).unwrap();

        assert_eq!(
            runner.commands(),
            vec![
                "sudo apt-get update -qq",
                "sudo apt-get install -qq libatlas3gf-base libatlas-dev",
                "sudo apt-get install -qq python-numpy python-yaml python-nose python-pip python-coverage",
                "pip install .",
            ]
        );
        assert!(engine.report().succeeded());
    }

    #[test]
    fn test_conda_scenario_with_coverage() {
        let flags = Flags {
            coverage: true,
            ..conda_flags()
        };
        let (mut engine, dir) = engine_for(&flags);
        let mut runner = RecordingRunner::new().fail_on("conda remove", 1);

        engine.run(&mut runner).unwrap();

        let commands = runner.commands();
        assert_eq!(
            commands[1],
            "wget http://repo.continuum.io/miniconda/Miniconda-latest-Linux-x86_64.sh -O miniconda.sh"
        );
        assert!(commands.contains(&"conda create -n testenv --yes python=3.8 pip nose coverage numpy pyyaml".to_string()));
        assert!(commands.contains(&"conda remove --yes --features mkl".to_string()));
        assert_eq!(commands[commands.len() - 2], "pip install coveralls");
        assert_eq!(commands.last().unwrap(), "pip install .");

        assert_eq!(engine.report().tolerated_steps(), vec!["conda_remove_mkl"]);
        assert_eq!(engine.state(), BootstrapState::Done);

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(dir.path().join("miniconda.sh"))
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o111, 0o111);
        }
    }

    #[test]
    fn test_conda_target_install_sees_activated_env() {
        let (mut engine, _dir) = engine_for(&conda_flags());
        let mut runner = RecordingRunner::new();

        engine.run(&mut runner).unwrap();

        let target = runner.calls.last().unwrap();
        assert_eq!(target.command, "pip install .");
        assert_eq!(target.conda_env.as_deref(), Some("testenv"));
        assert!(target
            .path
            .starts_with("/home/travis/miniconda/envs/testenv/bin:/home/travis/miniconda/bin:"));
        assert!(!target.path.contains("virtualenv"));

        // conda itself runs after Miniconda is on PATH but before activation
        let update = runner
            .calls
            .iter()
            .find(|c| c.command == "conda update -q conda")
            .unwrap();
        assert!(update.path.starts_with("/home/travis/miniconda/bin:"));
        assert!(update.conda_env.is_none());
    }

    #[test]
    fn test_mkl_install_when_requested() {
        let flags = Flags {
            install_mkl: true,
            ..conda_flags()
        };
        let (mut engine, _dir) = engine_for(&flags);
        let mut runner = RecordingRunner::new();

        engine.run(&mut runner).unwrap();

        let commands = runner.commands();
        assert!(commands.contains(&"conda install --yes mkl".to_string()));
        assert!(!commands.iter().any(|c| c.starts_with("conda remove")));
    }

    #[test]
    fn test_mkl_removal_tolerates_missing_program() {
        let (mut engine, _dir) = engine_for(&conda_flags());
        let mut runner = RecordingRunner::new().missing("conda remove");

        engine.run(&mut runner).unwrap();

        let record = engine
            .report()
            .steps
            .iter()
            .find(|r| r.id == "conda_remove_mkl")
            .unwrap();
        assert_eq!(
            record.status,
            StepStatus::Tolerated {
                message: MKL_NOT_INSTALLED.to_string()
            }
        );
    }

    #[test]
    fn test_fatal_failure_aborts_immediately() {
        let flags = Flags {
            install_atlas: true,
            distribution: Distribution::Ubuntu,
            ..Flags::default()
        };
        let (mut engine, _dir) = engine_for(&flags);
        let mut runner = RecordingRunner::new().fail_on("sudo apt-get install -qq libatlas", 100);

        let err = engine.run(&mut runner).unwrap_err();

        assert_eq!(err.step(), Some("apt_install_atlas"));
        assert_eq!(runner.commands().len(), 2);
        assert_eq!(engine.state(), BootstrapState::Aborted);

        let report = engine.report();
        assert_eq!(report.state, BootstrapState::Aborted);
        assert_eq!(report.failed_step.as_deref(), Some("apt_install_atlas"));
        assert!(matches!(
            report.steps.last().unwrap().status,
            StepStatus::Failed { code: Some(100), .. }
        ));
    }

    #[test]
    fn test_spawn_failure_is_fatal() {
        let (mut engine, _dir) = engine_for(&Flags::default());
        let mut runner = RecordingRunner::new().missing("pip");

        let err = engine.run(&mut runner).unwrap_err();
        assert!(matches!(err, BootstrapError::Spawn { .. }));
        assert_eq!(engine.state(), BootstrapState::Aborted);
    }

    #[test]
    fn test_missing_installer_aborts_conda_branch() {
        let mut engine = Engine::new(build_plan(&conda_flags(), &settings()), ci_env());
        let dir = tempdir().unwrap();
        engine.set_working_dir(dir.path());
        let mut runner = RecordingRunner::new();

        let err = engine.run(&mut runner).unwrap_err();
        assert!(matches!(err, BootstrapError::Io(_)));
        assert_eq!(engine.report().failed_step.as_deref(), Some("chmod_installer"));
        assert!(!runner.commands().iter().any(|c| c.starts_with("pip")));
    }

    #[test]
    fn test_dry_run_spawns_nothing() {
        let mut engine = Engine::new(build_plan(&conda_flags(), &settings()), ci_env());
        engine.set_dry_run(true);
        let mut runner = RecordingRunner::new();

        engine.run(&mut runner).unwrap();

        assert!(runner.calls.is_empty());
        assert_eq!(engine.state(), BootstrapState::Done);
        assert_eq!(engine.report().steps.len(), engine.plan().len());
        assert!(engine
            .report()
            .steps
            .iter()
            .all(|r| r.status == StepStatus::Planned));
        assert_eq!(engine.env().get("CONDA_DEFAULT_ENV"), Some("testenv"));
    }

    #[test]
    fn test_timeline_tracks_executed_steps() {
        let (mut engine, _dir) = engine_for(&Flags::default());
        engine.run(&mut RecordingRunner::new()).unwrap();

        let durations = engine.timeline().durations();
        assert!(durations.contains_key("apt_update"));
        assert!(durations.contains_key("pip_install_target"));
    }

    #[test]
    fn test_custom_plan_runs_in_order() {
        let mut plan = Plan::new();
        plan.push_stage(
            Stage::SystemSync,
            BootstrapState::PackagesSynced,
            vec![
                Step::run("one", "one", Invocation::new("echo").arg("1")),
                Step::run("two", "two", Invocation::new("echo").arg("2")),
            ],
        );
        let mut engine = Engine::new(plan, ProcessEnv::from_vars([("PATH", BASE_PATH)]));
        let mut runner = RecordingRunner::new();

        engine.run(&mut runner).unwrap();
        assert_eq!(runner.commands(), vec!["echo 1", "echo 2"]);
    }

    #[test]
    fn test_unjoinable_prefix_aborts_before_install() {
        let settings = Settings {
            install_prefix: PathBuf::from("/opt/mini:conda"),
            ..Settings::default()
        };
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("miniconda.sh"), "#!/bin/sh\n").unwrap();
        let mut engine = Engine::new(build_plan(&conda_flags(), &settings), ci_env());
        engine.set_working_dir(dir.path());
        let mut runner = RecordingRunner::new();

        let err = engine.run(&mut runner).unwrap_err();

        assert!(matches!(err, BootstrapError::PathJoin(_)));
        assert_eq!(engine.state(), BootstrapState::Aborted);
        assert_eq!(
            engine.report().failed_step.as_deref(),
            Some("prepend_conda_path")
        );
        assert!(!runner.commands().iter().any(|c| c.starts_with("conda")));
        assert!(!runner.commands().iter().any(|c| c.starts_with("pip")));
    }
}
