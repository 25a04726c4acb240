//! Domain types shared across the pipeline

use std::fmt;
use std::ops::Deref;
use std::process::ExitStatus;
use std::sync::Arc;
use uuid::Uuid;

/// One line of child output without its line terminator
///
/// Cloning shares the same allocation, so a single publish hands every
/// subscriber queue a pointer to the same text.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Line(Arc<str>);

impl Line {
    /// Decode raw bytes, replacing invalid UTF-8 sequences
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(Arc::from(String::from_utf8_lossy(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether two handles point at the same allocation
    #[cfg(test)]
    pub(crate) fn shares_allocation(&self, other: &Line) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Deref for Line {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Line {
    fn from(text: &str) -> Self {
        Self(Arc::from(text))
    }
}

impl From<String> for Line {
    fn from(text: String) -> Self {
        Self(Arc::from(text))
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier for a connected subscriber
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriberId(Uuid);

impl SubscriberId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SubscriberId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which child output stream a reader is attached to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamKind::Stdout => write!(f, "stdout"),
            StreamKind::Stderr => write!(f, "stderr"),
        }
    }
}

/// How the child process ended
#[derive(Debug)]
pub enum ChildExit {
    /// Exited with status zero
    Clean,
    /// Exited non-zero or was killed by a signal
    Failed(ExitStatus),
    /// Waiting on the child failed
    WaitFailed(std::io::Error),
    /// The exit watcher went away without reporting
    Lost,
}

impl ChildExit {
    pub fn is_clean(&self) -> bool {
        matches!(self, ChildExit::Clean)
    }
}

impl From<std::io::Result<ExitStatus>> for ChildExit {
    fn from(result: std::io::Result<ExitStatus>) -> Self {
        match result {
            Ok(status) if status.success() => ChildExit::Clean,
            Ok(status) => ChildExit::Failed(status),
            Err(e) => ChildExit::WaitFailed(e),
        }
    }
}

impl fmt::Display for ChildExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChildExit::Clean => write!(f, "without error"),
            ChildExit::Failed(status) => write!(f, "{status}"),
            ChildExit::WaitFailed(e) => write!(f, "wait failed: {e}"),
            ChildExit::Lost => write!(f, "exit status lost"),
        }
    }
}

/// The event that ended the run
#[derive(Debug)]
pub enum Trigger {
    /// The HTTP server's serve call returned
    ListenerStopped(std::io::Result<()>),
    /// The process received an interrupt
    Interrupted,
    /// The child process exited
    ChildExited(ChildExit),
    /// Every trigger source closed without firing
    SourcesClosed,
}

impl Trigger {
    pub fn name(&self) -> &'static str {
        match self {
            Trigger::ListenerStopped(_) => "http server error",
            Trigger::Interrupted => "signal received",
            Trigger::ChildExited(_) => "command exited",
            Trigger::SourcesClosed => "trigger sources closed",
        }
    }
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trigger::ListenerStopped(Ok(())) => write!(f, "{}: server stopped", self.name()),
            Trigger::ListenerStopped(Err(e)) => write!(f, "{}: {e}", self.name()),
            Trigger::Interrupted => write!(f, "{}: interrupt", self.name()),
            Trigger::ChildExited(exit) => write!(f, "{}: {exit}", self.name()),
            Trigger::SourcesClosed => write!(f, "{}", self.name()),
        }
    }
}

/// Outcome of one `publish` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishOutcome {
    /// Subscribers that got the line queued
    pub delivered: usize,
    /// Subscribers whose queue was full and were scheduled for eject
    pub ejected: usize,
}

/// Why a subscriber session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The peer sent a close frame or dropped the connection
    PeerClosed(Option<u16>),
    /// Global shutdown cancelled the session
    ShuttingDown,
    /// The queue overflowed and the subscriber was ejected
    Ejected,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_clone_shares_allocation() {
        let line = Line::from("hello");
        let copy = line.clone();
        assert!(line.shares_allocation(&copy));
        assert_eq!(copy.as_str(), "hello");
    }

    #[test]
    fn test_line_from_invalid_utf8_is_replaced() {
        let line = Line::from_bytes(b"ok \xff done");
        assert_eq!(line.as_str(), "ok \u{FFFD} done");
    }

    #[test]
    fn test_trigger_display_names_source() {
        let trigger = Trigger::ChildExited(ChildExit::Clean);
        assert_eq!(trigger.to_string(), "command exited: without error");
        assert_eq!(Trigger::Interrupted.to_string(), "signal received: interrupt");
    }

    #[test]
    fn test_subscriber_ids_are_unique() {
        assert_ne!(SubscriberId::new(), SubscriberId::new());
    }
}
