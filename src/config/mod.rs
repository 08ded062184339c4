//! Configuration Module
//!
//! - [`flags`]: CI matrix flags read from the process environment
//! - [`settings`]: Optional YAML tunables with stock defaults

pub mod flags;
pub mod settings;

pub use flags::{Distribution, Flags};
pub use settings::{Settings, HOME_DIR};
