//! Service trait definitions for dependency injection
//!
//! The registry and the process supervisor sit behind these traits so the
//! pipeline can be exercised with in-memory streams and mocks.

use futures_util::future::BoxFuture;
use tokio::io::AsyncRead;
use tokio::sync::{oneshot, watch};

use crate::config::CommandSpec;
use crate::error::TailerResult;
use crate::services::registry::Subscriber;
use crate::types::{ChildExit, Line, PublishOutcome, SubscriberId};

/// Set of live subscribers with non-blocking fan-out
#[mockall::automock]
pub trait SubscriberRegistry: Send + Sync + 'static {
    /// Insert a subscriber, returning the number registered afterwards
    fn add(&self, subscriber: Subscriber) -> usize;

    /// Remove a subscriber; `false` if it was not registered
    fn remove(&self, id: SubscriberId) -> bool;

    /// Offer one line to every current subscriber without blocking
    fn publish(&self, line: Line) -> PublishOutcome;

    /// Number of registered subscribers
    fn subscriber_count(&self) -> usize;

    /// Watch the subscriber count as it changes
    fn watch_count(&self) -> watch::Receiver<usize>;
}

/// Launches the child process whose output is tailed
#[mockall::automock]
pub trait ProcessSupervisor: Send + Sync {
    /// Start the command, handing back its output streams and exit future
    fn start(&self, spec: &CommandSpec) -> TailerResult<ChildHandles>;
}

/// Readable output stream of the child
pub type OutputStream = Box<dyn AsyncRead + Send + Unpin>;

/// Everything the pipeline needs from a started child
pub struct ChildHandles {
    pub pid: Option<u32>,
    pub stdout: OutputStream,
    pub stderr: OutputStream,
    /// Resolves once the child has exited
    pub exit: BoxFuture<'static, ChildExit>,
    pub terminator: ChildTerminator,
}

/// One-shot request to kill the child
///
/// Dropping the terminator without calling [`ChildTerminator::terminate`]
/// leaves the child running.
#[derive(Debug, Default)]
pub struct ChildTerminator {
    kill_tx: Option<oneshot::Sender<()>>,
}

impl ChildTerminator {
    pub fn new(kill_tx: oneshot::Sender<()>) -> Self {
        Self { kill_tx: Some(kill_tx) }
    }

    /// Ask for the child to be killed; `true` if the request was delivered
    pub fn terminate(&mut self) -> bool {
        match self.kill_tx.take() {
            Some(kill_tx) => kill_tx.send(()).is_ok(),
            None => false,
        }
    }
}
