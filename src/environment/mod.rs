//! Environment Management Module
//!
//! Step builders for each external package manager, plus the process
//! environment overlay that activation steps mutate.

pub mod apt;
pub mod conda;
pub mod pip;
pub mod process_env;

pub use apt::Apt;
pub use conda::MKL_NOT_INSTALLED;
pub use process_env::ProcessEnv;
