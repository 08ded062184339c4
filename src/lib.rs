//! ci-bootstrap - CI Environment Bootstrapper
//!
//! Prepares a CI worker for a Python package's test run: refreshes the OS
//! package index, optionally installs ATLAS, provisions a Python
//! distribution (Miniconda with a pinned test environment, or the OS
//! packaged Python stack), toggles MKL and the coverage helper, and finally
//! installs the package under test. The first failing command aborts the
//! run.
//!
//! # Architecture
//!
//! - [`config`]: CI flags from the environment and optional YAML settings
//! - [`plan`]: The bootstrap sequence as data, and the state machine
//! - [`environment`]: Step builders per package manager, environment overlay
//! - [`execution`]: Fail-fast engine and process runner
//! - [`monitoring`]: Step timeline and JSON run report
//!
//! # Example
//!
//! ```rust,no_run
//! use ci_bootstrap::{bootstrap, Flags, Settings};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let report = bootstrap(&Flags::from_env(), &Settings::default())?;
//!     println!("finished in state {}", report.state);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod environment;
pub mod error;
pub mod execution;
pub mod monitoring;
pub mod plan;

// Re-export commonly used types
pub use config::{Distribution, Flags, Settings};
pub use environment::ProcessEnv;
pub use error::BootstrapError;
pub use execution::{Engine, SystemRunner};
pub use monitoring::RunReport;
pub use plan::{build_plan, BootstrapState, Plan};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = "ci-bootstrap";

/// Builds the plan for `flags` and runs it in the current directory with
/// the current process environment.
pub fn bootstrap(flags: &Flags, settings: &Settings) -> Result<RunReport, BootstrapError> {
    let mut engine = Engine::new(build_plan(flags, settings), ProcessEnv::capture());
    engine.run(&mut SystemRunner::new())?;
    Ok(engine.report().clone())
}
