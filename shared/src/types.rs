//! Core shared types and identifiers

use std::fmt;

/// Part of the pipeline a log line originates from
///
/// Emitted as the `component` field on every event logged through the
/// `component_*!` macros, so one pipeline stage can be filtered out of a
/// mixed stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Component {
    /// Owns the child process
    Supervisor,
    /// Turns a child output stream into lines
    Reader,
    /// Tracks live subscribers and fans lines out
    Registry,
    /// Per-connection subscribe handler
    Endpoint,
    /// Waits for the first termination trigger and drives shutdown
    Coordinator,
    /// HTTP listener and static files
    Http,
}

impl Component {
    pub fn as_str(&self) -> &'static str {
        match self {
            Component::Supervisor => "supervisor",
            Component::Reader => "reader",
            Component::Registry => "registry",
            Component::Endpoint => "endpoint",
            Component::Coordinator => "coordinator",
            Component::Http => "http",
        }
    }
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
