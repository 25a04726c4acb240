//! Termination coordinator
//!
//! Three independent sources can end a run: the HTTP server returning, an
//! interrupt signal, and the child exiting. Each reports through its own
//! single-slot channel; the first to fire wins and the coordinator then
//! drives a graceful shutdown bounded by the grace period.

use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use shared::{Component, component_debug, component_error, component_info, logging};

use crate::error::{TailerError, TailerResult};
use crate::types::{ChildExit, Trigger};

/// Sending halves handed to the three trigger sources
pub struct TriggerSenders {
    pub listener: oneshot::Sender<std::io::Result<()>>,
    pub interrupt: Interrupter,
    pub child: oneshot::Sender<ChildExit>,
}

/// Cloneable handle that delivers the interrupt trigger
#[derive(Clone, Debug)]
pub struct Interrupter {
    tx: mpsc::Sender<()>,
}

impl Interrupter {
    /// Fire the interrupt trigger; `false` if one is already pending or
    /// the coordinator is gone
    pub fn interrupt(&self) -> bool {
        self.tx.try_send(()).is_ok()
    }
}

/// Waits for the first trigger and shuts the endpoint down
pub struct TerminationCoordinator {
    listener_rx: oneshot::Receiver<std::io::Result<()>>,
    interrupt_rx: mpsc::Receiver<()>,
    child_rx: oneshot::Receiver<ChildExit>,
    shutdown: CancellationToken,
    grace: Duration,
}

impl TerminationCoordinator {
    /// Create a coordinator that cancels `shutdown` once a trigger fires
    pub fn new(shutdown: CancellationToken, grace: Duration) -> (Self, TriggerSenders) {
        let (listener_tx, listener_rx) = oneshot::channel();
        let (interrupt_tx, interrupt_rx) = mpsc::channel(1);
        let (child_tx, child_rx) = oneshot::channel();

        let coordinator = Self {
            listener_rx,
            interrupt_rx,
            child_rx,
            shutdown,
            grace,
        };
        let senders = TriggerSenders {
            listener: listener_tx,
            interrupt: Interrupter { tx: interrupt_tx },
            child: child_tx,
        };
        (coordinator, senders)
    }

    /// Wait for whichever trigger fires first
    ///
    /// A source whose sender is dropped without firing is ignored.
    pub async fn wait_first(&mut self) -> Trigger {
        let trigger = tokio::select! {
            Ok(result) = &mut self.listener_rx => Trigger::ListenerStopped(result),
            Some(()) = self.interrupt_rx.recv() => Trigger::Interrupted,
            Ok(exit) = &mut self.child_rx => Trigger::ChildExited(exit),
            else => Trigger::SourcesClosed,
        };
        component_info!(Component::Coordinator, "⏹️ {}", trigger);
        trigger
    }

    /// Cancel the endpoint and wait for the server and all subscribers
    ///
    /// Past the grace period the server task is aborted and the shutdown
    /// reports [`TailerError::ShutdownTimeout`].
    pub async fn shutdown(self, mut server: JoinHandle<()>, mut subscribers: watch::Receiver<usize>) -> TailerResult<()> {
        logging::log_shutdown(Component::Coordinator, &format!("grace period {:?}", self.grace));
        self.shutdown.cancel();

        let drain = async {
            if let Err(e) = (&mut server).await {
                component_error!(Component::Coordinator, "HTTP server task failed: {}", e);
            }
            component_debug!(Component::Coordinator, "HTTP server stopped, waiting for subscribers");
            let _ = subscribers.wait_for(|count| *count == 0).await;
        };

        match timeout(self.grace, drain).await {
            Ok(()) => {
                logging::log_success(Component::Coordinator, "Shutdown complete");
                Ok(())
            }
            Err(_) => {
                server.abort();
                logging::log_error(Component::Coordinator, "Graceful shutdown", &"grace period elapsed, forcing close");
                Err(TailerError::ShutdownTimeout(self.grace))
            }
        }
    }
}

/// Deliver the interrupt trigger when the process receives Ctrl+C
pub fn listen_for_interrupt(interrupter: Interrupter) -> JoinHandle<()> {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                logging::log_shutdown(Component::Coordinator, "Received Ctrl+C signal");
                interrupter.interrupt();
            }
            Err(err) => {
                logging::log_error(Component::Coordinator, "Signal handling", &err);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coordinator(grace: Duration) -> (TerminationCoordinator, TriggerSenders, CancellationToken) {
        let token = CancellationToken::new();
        let (coordinator, senders) = TerminationCoordinator::new(token.clone(), grace);
        (coordinator, senders, token)
    }

    #[tokio::test]
    async fn test_child_exit_wins() {
        let (mut coordinator, senders, _) = coordinator(Duration::from_secs(1));
        senders.child.send(ChildExit::Clean).unwrap();

        let trigger = coordinator.wait_first().await;
        assert!(matches!(trigger, Trigger::ChildExited(ChildExit::Clean)));
    }

    #[tokio::test]
    async fn test_interrupt_wins() {
        let (mut coordinator, senders, _) = coordinator(Duration::from_secs(1));
        assert!(senders.interrupt.interrupt());

        let trigger = coordinator.wait_first().await;
        assert!(matches!(trigger, Trigger::Interrupted));
        drop(senders);
    }

    #[tokio::test]
    async fn test_interrupt_slot_holds_one_signal() {
        let (_coordinator, senders, _) = coordinator(Duration::from_secs(1));
        assert!(senders.interrupt.interrupt());
        assert!(!senders.interrupt.interrupt());
    }

    #[tokio::test]
    async fn test_listener_failure_wins() {
        let (mut coordinator, senders, _) = coordinator(Duration::from_secs(1));
        let error = std::io::Error::new(std::io::ErrorKind::Other, "accept failed");
        senders.listener.send(Err(error)).unwrap();

        match coordinator.wait_first().await {
            Trigger::ListenerStopped(Err(e)) => assert_eq!(e.to_string(), "accept failed"),
            other => panic!("unexpected trigger: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_dropped_source_is_ignored() {
        let (mut coordinator, senders, _) = coordinator(Duration::from_secs(1));
        let TriggerSenders { listener, interrupt, child } = senders;
        drop(listener);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            child.send(ChildExit::Lost).unwrap();
            drop(interrupt);
        });

        let trigger = coordinator.wait_first().await;
        assert!(matches!(trigger, Trigger::ChildExited(ChildExit::Lost)));
    }

    #[tokio::test]
    async fn test_all_sources_closed() {
        let (mut coordinator, senders, _) = coordinator(Duration::from_secs(1));
        drop(senders);
        assert!(matches!(coordinator.wait_first().await, Trigger::SourcesClosed));
    }

    #[tokio::test]
    async fn test_shutdown_cancels_and_completes() {
        let (coordinator, _senders, token) = coordinator(Duration::from_secs(1));
        let watched = token.clone();
        let server = tokio::spawn(async move { watched.cancelled().await });
        let (_count_tx, count_rx) = watch::channel(0usize);

        coordinator.shutdown(server, count_rx).await.unwrap();
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn test_shutdown_waits_for_subscribers_to_drain() {
        let (coordinator, _senders, _token) = coordinator(Duration::from_secs(1));
        let server = tokio::spawn(async {});
        let (count_tx, count_rx) = watch::channel(2usize);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            count_tx.send_replace(1);
            tokio::time::sleep(Duration::from_millis(20)).await;
            count_tx.send_replace(0);
            tokio::time::sleep(Duration::from_millis(200)).await;
        });

        assert!(coordinator.shutdown(server, count_rx).await.is_ok());
    }

    #[tokio::test]
    async fn test_shutdown_times_out_on_stuck_server() {
        let (coordinator, _senders, _token) = coordinator(Duration::from_millis(50));
        let server = tokio::spawn(std::future::pending::<()>());
        let (_count_tx, count_rx) = watch::channel(0usize);

        let started = std::time::Instant::now();
        let result = coordinator.shutdown(server, count_rx).await;
        assert!(matches!(result, Err(TailerError::ShutdownTimeout(_))));
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
