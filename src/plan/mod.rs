//! Bootstrap Plan Module
//!
//! # Structure
//!
//! - [`model`]: Core data structures (Step, Action, Plan)
//! - [`state`]: The bootstrap state machine
//! - [`builder`]: Flags to plan

pub mod builder;
pub mod model;
pub mod state;

pub use builder::build_plan;
pub use model::{Action, FailurePolicy, Invocation, Plan, PlannedStage, Stage, Step};
pub use state::BootstrapState;
