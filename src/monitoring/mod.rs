//! Monitoring Module
//!
//! - [`ExecutionTimeline`]: Step start/end timing
//! - [`RunReport`]: Serializable record of a run

pub mod report;
pub mod timeline;

pub use report::{RunReport, StepRecord, StepStatus};
pub use timeline::{EventType, ExecutionTimeline, TimelineEvent};
