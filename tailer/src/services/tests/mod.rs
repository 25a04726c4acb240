//! Service tests for the tailer
//!
//! Registry fan-out, line splitting and child supervision.

pub mod registry;
