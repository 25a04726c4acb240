//! Live log tailer
//!
//! Runs one command, reads its stdout and stderr line by line and streams
//! every line to all connected WebSocket subscribers. Slow subscribers are
//! ejected instead of being allowed to hold up the producer.

pub mod cli;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod services;
pub mod tailer_impl;
pub mod traits;
pub mod types;
pub mod web;

// Re-export main types
pub use config::{CommandSpec, TailerConfig};
pub use coordinator::{Interrupter, TerminationCoordinator, TriggerSenders};
pub use error::{TailerError, TailerResult};
pub use tailer_impl::{RunningTailer, ShutdownReport, Tailer};
pub use types::*;

// Re-export trait definitions
pub use traits::{ChildHandles, ChildTerminator, OutputStream, ProcessSupervisor, SubscriberRegistry};

// Re-export service implementations
pub use services::{LineReader, RealProcessSupervisor, RealSubscriberRegistry, Subscriber, Subscription};
