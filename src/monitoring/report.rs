//! Run Report
//!
//! A JSON record of one bootstrap run, written with `--report` so the CI
//! job can archive what was executed and where it stopped.

use std::fs;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::info;
use serde::{Deserialize, Serialize};

use crate::error::BootstrapError;
use crate::plan::{BootstrapState, Stage, Step};

/// How a single step ended.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepStatus {
    Succeeded,
    Failed { code: Option<i32>, error: String },
    Tolerated { message: String },
    /// Dry run; nothing was executed
    Planned,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    pub id: String,
    pub stage: Stage,
    pub command: String,
    #[serde(flatten)]
    pub status: StepStatus,
    pub duration_ms: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub dry_run: bool,
    pub state: BootstrapState,
    /// Step that aborted the run
    pub failed_step: Option<String>,
    pub steps: Vec<StepRecord>,
}

impl RunReport {
    /// Creates a report for a run starting now.
    pub fn new(dry_run: bool) -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            dry_run,
            state: BootstrapState::Start,
            failed_step: None,
            steps: Vec::new(),
        }
    }

    /// Records the outcome of a step.
    pub fn record(&mut self, stage: Stage, step: &Step, status: StepStatus, duration: Duration) {
        self.steps.push(StepRecord {
            id: step.id.clone(),
            stage,
            command: step.action.to_string(),
            status,
            duration_ms: duration.as_millis() as u64,
        });
    }

    /// Closes the report in its terminal state.
    pub fn finish(&mut self, state: BootstrapState, failed_step: Option<String>) {
        self.state = state;
        self.failed_step = failed_step;
        self.finished_at = Some(Utc::now());
    }

    /// Returns true if the run reached `Done`.
    pub fn succeeded(&self) -> bool {
        self.state == BootstrapState::Done
    }

    /// Ids of steps whose failure was tolerated.
    pub fn tolerated_steps(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|r| matches!(r.status, StepStatus::Tolerated { .. }))
            .map(|r| r.id.as_str())
            .collect()
    }

    /// Writes the report as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), BootstrapError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;

        info!("Saved run report to {}", path.display());
        Ok(())
    }

    /// Loads a previously saved report.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, BootstrapError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}
