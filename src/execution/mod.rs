//! Execution Module
//!
//! - [`engine`]: Fail-fast executor for a bootstrap plan
//! - [`runner`]: Process spawning behind the [`CommandRunner`] trait

pub mod engine;
pub mod runner;

pub use engine::Engine;
pub use runner::{CommandRunner, CommandStatus, SystemRunner};
