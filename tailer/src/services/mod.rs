//! Service implementations
//!
//! Real implementations of the service traits plus the line readers that
//! feed the registry.

pub mod line_reader;
pub mod process_supervisor;
pub mod registry;

#[cfg(test)]
mod tests;

// Re-export service implementations
pub use line_reader::{LineReader, ReaderSummary};
pub use process_supervisor::RealProcessSupervisor;
pub use registry::{Ejector, RealSubscriberRegistry, Subscriber, SubscriberInbox, Subscription};
