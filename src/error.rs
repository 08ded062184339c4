//! Bootstrap Errors
//!
//! Every fallible operation in the crate returns [`BootstrapError`].
//! A step that exits non-zero surfaces as [`BootstrapError::StepFailed`],
//! which is what aborts the run.

use std::env;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading configuration or executing the plan.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("failed to load settings from '{path}': {message}")]
    Settings { path: PathBuf, message: String },

    #[error("step '{step}' could not be started: {source}")]
    Spawn {
        step: String,
        #[source]
        source: io::Error,
    },

    #[error("step '{step}' failed with exit code {}", display_code(.code))]
    StepFailed { step: String, code: Option<i32> },

    #[error("working directory is not usable: {}", .0.display())]
    InvalidWorkingDir(PathBuf),

    #[error("cannot update PATH: {0}")]
    PathJoin(#[from] env::JoinPathsError),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn display_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "none (terminated by signal)".to_string(),
    }
}

impl BootstrapError {
    /// Returns the id of the step that caused the error, if any.
    pub fn step(&self) -> Option<&str> {
        match self {
            Self::Spawn { step, .. } | Self::StepFailed { step, .. } => Some(step),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_step_failed_message() {
        let err = BootstrapError::StepFailed {
            step: "apt_update".to_string(),
            code: Some(100),
        };
        assert_eq!(err.to_string(), "step 'apt_update' failed with exit code 100");
        assert_eq!(err.step(), Some("apt_update"));
    }

    #[test]
    fn test_step_failed_by_signal() {
        let err = BootstrapError::StepFailed {
            step: "conda_update".to_string(),
            code: None,
        };
        assert!(err.to_string().contains("terminated by signal"));
    }

    #[test]
    fn test_path_join_message() {
        let join = env::join_paths(["/opt/mini:conda/bin"]).unwrap_err();
        let err: BootstrapError = join.into();
        assert!(err.to_string().starts_with("cannot update PATH"));
        assert!(err.step().is_none());
    }

    #[test]
    fn test_io_error_has_no_step() {
        let err: BootstrapError = io::Error::new(io::ErrorKind::Other, "boom").into();
        assert!(err.step().is_none());
    }
}
