//! Step Timeline
//!
//! Records when each step starts and how it ends, for the timing summary
//! printed at the end of a run.

use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Type of timeline event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Started,
    Completed,
    Failed,
    /// Step failed but its failure policy let the run continue
    Tolerated,
}

impl EventType {
    fn is_end(self) -> bool {
        !matches!(self, Self::Started)
    }
}

/// A single start or end mark for a step.
#[derive(Debug, Clone)]
pub struct TimelineEvent {
    /// Step the event belongs to
    pub step_id: String,

    /// Whether the step started or how it ended
    pub event_type: EventType,

    /// When the event was recorded
    pub timestamp: Instant,
}

/// Ordered step events of one run.
#[derive(Debug, Clone)]
pub struct ExecutionTimeline {
    events: Vec<TimelineEvent>,
    start_time: Instant,
}

impl ExecutionTimeline {
    /// Creates a new timeline starting now.
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            start_time: Instant::now(),
        }
    }

    /// Records an event for `step_id` at the current instant.
    pub fn add_event(&mut self, step_id: impl Into<String>, event_type: EventType) {
        self.events.push(TimelineEvent {
            step_id: step_id.into(),
            event_type,
            timestamp: Instant::now(),
        });
    }

    /// All events in the order they were recorded.
    pub fn events(&self) -> &[TimelineEvent] {
        &self.events
    }

    /// Time since the timeline was created.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Duration of every finished step.
    pub fn durations(&self) -> HashMap<String, Duration> {
        let mut starts: HashMap<&str, Instant> = HashMap::new();
        let mut durations = HashMap::new();

        for event in &self.events {
            if event.event_type.is_end() {
                if let Some(start) = starts.get(event.step_id.as_str()) {
                    durations.insert(
                        event.step_id.clone(),
                        event.timestamp.duration_since(*start),
                    );
                }
            } else {
                starts.insert(event.step_id.as_str(), event.timestamp);
            }
        }

        durations
    }

    /// Renders finished steps in the order they started, one line each.
    ///
    /// The bar is proportional to the step's share of the total run time.
    pub fn summary(&self) -> String {
        let mut output = String::from("\nStep timings:\n\n");
        let total = self.elapsed();
        let durations = self.durations();

        let mut seen = Vec::new();
        for event in &self.events {
            if event.event_type == EventType::Started && !seen.contains(&event.step_id) {
                seen.push(event.step_id.clone());
            }
        }

        for step_id in seen {
            let Some(duration) = durations.get(&step_id) else {
                continue;
            };

            let width = if total.is_zero() {
                1
            } else {
                ((duration.as_secs_f64() / total.as_secs_f64()) * 40.0).max(1.0) as usize
            };

            output.push_str(&format!(
                "{} |{:<40}| {:.1}s\n",
                truncate(&step_id, 28),
                "#".repeat(width.min(40)),
                duration.as_secs_f64()
            ));
        }

        output.push_str(&format!("\nTotal: {:.1}s\n", total.as_secs_f64()));
        output
    }
}

impl Default for ExecutionTimeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Pads or truncates a string to exactly `max_len` characters.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        format!("{:width$}", s, width = max_len)
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}
