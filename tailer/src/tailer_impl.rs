//! Main tailer implementation
//!
//! Assembles the pipeline with dependency injection: starts the child, wires
//! its streams into line readers, serves the subscribe endpoint and the
//! static front-end, then hands control to the termination coordinator.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, routing::get};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{services::ServeDir, timeout::TimeoutLayer, trace::TraceLayer};

use shared::{Component, component_debug, component_error, component_info, logging};

use crate::config::TailerConfig;
use crate::coordinator::{Interrupter, TerminationCoordinator, TriggerSenders, listen_for_interrupt};
use crate::error::{TailerError, TailerResult};
use crate::services::{LineReader, ReaderSummary};
use crate::traits::{ChildHandles, ChildTerminator, OutputStream, ProcessSupervisor, SubscriberRegistry};
use crate::types::{StreamKind, Trigger};
use crate::web::handlers::{SubscribeState, subscribe_handler};

/// What a completed run reports
#[derive(Debug)]
pub struct ShutdownReport {
    /// The trigger that ended the run
    pub trigger: Trigger,
    /// Readers that reached end-of-stream by the time shutdown finished
    pub readers: Vec<(StreamKind, ReaderSummary)>,
}

impl ShutdownReport {
    /// Lines published across all finished readers
    pub fn lines_published(&self) -> u64 {
        self.readers.iter().map(|(_, summary)| summary.published).sum()
    }
}

/// Log-tailing broadcaster with injected services
pub struct Tailer<P, R> {
    config: TailerConfig,
    supervisor: P,
    registry: Arc<R>,
}

impl<P, R> Tailer<P, R>
where
    P: ProcessSupervisor,
    R: SubscriberRegistry,
{
    /// Create a tailer with dependency injection
    pub fn new(config: TailerConfig, supervisor: P, registry: R) -> Self {
        Self {
            config,
            supervisor,
            registry: Arc::new(registry),
        }
    }

    pub fn config(&self) -> &TailerConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<R> {
        &self.registry
    }

    /// Build the router: `/subscribe` plus static files for everything else
    pub fn build_router(&self, shutdown: CancellationToken) -> Router {
        let state = SubscribeState {
            registry: self.registry.clone(),
            shutdown,
            queue_capacity: self.config.queue_capacity,
            write_timeout: self.config.write_timeout,
        };

        Router::new()
            .route("/subscribe", get(subscribe_handler::<R>))
            .fallback_service(ServeDir::new(&self.config.public_dir))
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(TimeoutLayer::new(self.config.http_timeout))
                    .into_inner(),
            )
            .with_state(state)
    }

    /// Start the child, bind the listener and spawn every pipeline task
    ///
    /// Any failure here is a startup error; nothing has been served yet.
    pub async fn start(self) -> TailerResult<RunningTailer<R>> {
        self.config.validate()?;

        logging::log_startup(Component::Supervisor, &format!("command '{}'", self.config.command.program));
        let ChildHandles {
            pid,
            stdout,
            stderr,
            exit,
            mut terminator,
        } = self.supervisor.start(&self.config.command)?;
        component_info!(Component::Supervisor, "command started successfully (PID: {:?})", pid);

        let listener = match bind_listener(&self.config.listen_addr).await {
            Ok(bound) => bound,
            Err(e) => {
                terminator.terminate();
                return Err(e);
            }
        };
        let local_addr = listener.1;
        component_info!(Component::Http, "🌐 listening on {}", local_addr);

        let readers = vec![
            (StreamKind::Stdout, self.spawn_reader(StreamKind::Stdout, stdout)),
            (StreamKind::Stderr, self.spawn_reader(StreamKind::Stderr, stderr)),
        ];

        let shutdown = CancellationToken::new();
        let (coordinator, senders) = TerminationCoordinator::new(shutdown.clone(), self.config.shutdown_grace);
        let TriggerSenders {
            listener: listener_tx,
            interrupt,
            child: child_tx,
        } = senders;

        let router = self.build_router(shutdown.clone());
        let server = tokio::spawn(async move {
            let result = axum::serve(listener.0, router.into_make_service_with_connect_info::<SocketAddr>())
                .with_graceful_shutdown(async move { shutdown.cancelled().await })
                .await;
            if let Err(e) = &result {
                component_error!(Component::Http, "HTTP server error: {}", e);
            }
            let _ = listener_tx.send(result);
        });

        let signal_task = listen_for_interrupt(interrupt.clone());

        tokio::spawn(async move {
            let outcome = exit.await;
            let _ = child_tx.send(outcome);
        });

        Ok(RunningTailer {
            local_addr,
            pid,
            registry: self.registry,
            coordinator,
            server,
            signal_task,
            readers,
            interrupter: interrupt,
            terminator,
            kill_child_on_shutdown: self.config.kill_child_on_shutdown,
        })
    }

    /// Start and block until the run has shut down
    pub async fn run(self) -> TailerResult<ShutdownReport> {
        self.start().await?.wait().await
    }

    fn spawn_reader(&self, stream: StreamKind, source: OutputStream) -> JoinHandle<ReaderSummary> {
        let reader = LineReader::new(stream, source, self.registry.clone(), self.config.max_line_bytes);
        tokio::spawn(reader.run())
    }
}

async fn bind_listener(addr: &str) -> TailerResult<(TcpListener, SocketAddr)> {
    let bind_failed = |source| TailerError::BindFailed {
        addr: addr.to_string(),
        source,
    };
    let listener = TcpListener::bind(addr).await.map_err(bind_failed)?;
    let local_addr = listener.local_addr().map_err(bind_failed)?;
    Ok((listener, local_addr))
}

/// A started tailer waiting for its first termination trigger
pub struct RunningTailer<R> {
    local_addr: SocketAddr,
    pid: Option<u32>,
    registry: Arc<R>,
    coordinator: TerminationCoordinator,
    server: JoinHandle<()>,
    signal_task: JoinHandle<()>,
    readers: Vec<(StreamKind, JoinHandle<ReaderSummary>)>,
    interrupter: Interrupter,
    terminator: ChildTerminator,
    kill_child_on_shutdown: bool,
}

impl<R> RunningTailer<R>
where
    R: SubscriberRegistry,
{
    /// Address the listener actually bound to
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn registry(&self) -> &Arc<R> {
        &self.registry
    }

    /// Handle that fires the interrupt trigger, same as Ctrl+C
    pub fn interrupter(&self) -> Interrupter {
        self.interrupter.clone()
    }

    /// Wait for the first trigger, then shut down within the grace period
    pub async fn wait(self) -> TailerResult<ShutdownReport> {
        let RunningTailer {
            registry,
            mut coordinator,
            server,
            signal_task,
            readers,
            mut terminator,
            kill_child_on_shutdown,
            ..
        } = self;

        let trigger = coordinator.wait_first().await;

        if kill_child_on_shutdown && !matches!(trigger, Trigger::ChildExited(_)) && terminator.terminate() {
            component_info!(Component::Supervisor, "🔪 Child kill requested for shutdown");
        }

        let result = coordinator.shutdown(server, registry.watch_count()).await;
        signal_task.abort();
        let readers = collect_finished(readers).await;
        result.map(|()| ShutdownReport { trigger, readers })
    }
}

/// Summaries of readers that have already finished
///
/// A reader still attached to a live child is left running detached.
async fn collect_finished(readers: Vec<(StreamKind, JoinHandle<ReaderSummary>)>) -> Vec<(StreamKind, ReaderSummary)> {
    let mut finished = Vec::new();
    for (stream, reader) in readers {
        if !reader.is_finished() {
            component_debug!(Component::Reader, "{} still open at shutdown", stream);
            continue;
        }
        match reader.await {
            Ok(summary) => finished.push((stream, summary)),
            Err(e) => component_error!(Component::Reader, "{} reader task failed: {}", stream, e),
        }
    }
    finished
}
