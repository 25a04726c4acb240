//! Shared infrastructure for the log-tailing broadcaster
//!
//! Holds what every binary in the workspace needs regardless of its role:
//! tracing setup and component-tagged logging.

pub mod logging;
pub mod types;

pub use types::*;
