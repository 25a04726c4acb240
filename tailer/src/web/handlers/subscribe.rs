//! Subscribe endpoint
//!
//! Upgrades `/subscribe` requests to WebSocket connections and streams every
//! published line to the peer as one text frame. Anything the peer sends is
//! discarded; its close only cancels the session.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ConnectInfo, State, WebSocketUpgrade,
        ws::{CloseFrame, Message, WebSocket, close_code, rejection::WebSocketUpgradeRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use shared::{Component, component_debug, component_info, component_warn};

use crate::error::{TailerError, TailerResult};
use crate::services::registry::{SubscriberInbox, Subscription};
use crate::traits::SubscriberRegistry;
use crate::types::{Line, SessionEnd};

/// Close reason sent to an ejected subscriber
pub const EJECT_REASON: &str = "connection too slow to keep up with messages";

/// Close reason sent when the server shuts down
pub const SHUTDOWN_REASON: &str = "server shutting down";

/// Shared state for the subscribe route
pub struct SubscribeState<R> {
    pub registry: Arc<R>,
    /// Cancelled when global shutdown begins
    pub shutdown: CancellationToken,
    pub queue_capacity: usize,
    pub write_timeout: Duration,
}

impl<R> Clone for SubscribeState<R> {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            shutdown: self.shutdown.clone(),
            queue_capacity: self.queue_capacity,
            write_timeout: self.write_timeout,
        }
    }
}

/// How the streaming loop stopped
enum LoopExit {
    Ejected,
    Cancelled,
    WriteFailed(TailerError),
}

/// WebSocket upgrade handler for `/subscribe`
pub async fn subscribe_handler<R>(
    State(state): State<SubscribeState<R>>,
    connect_info: Option<ConnectInfo<SocketAddr>>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response
where
    R: SubscriberRegistry,
{
    let peer = connect_info
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "unknown".to_string());

    if state.shutdown.is_cancelled() {
        component_debug!(Component::Endpoint, "Refusing {} during shutdown", peer);
        return (StatusCode::SERVICE_UNAVAILABLE, "shutting down").into_response();
    }

    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => {
            component_warn!(Component::Endpoint, "subscribe error: {}: {}", peer, rejection);
            return rejection.into_response();
        }
    };

    let failed_peer = peer.clone();
    ws.on_failed_upgrade(move |e| {
        component_warn!(Component::Endpoint, "subscribe error: {}: {}", failed_peer, e);
    })
    .on_upgrade(move |socket| serve_subscriber(socket, peer, state))
}

/// Run one subscriber session to completion and log how it ended
pub async fn serve_subscriber<R>(socket: WebSocket, peer: String, state: SubscribeState<R>)
where
    R: SubscriberRegistry,
{
    match stream_lines(socket, &peer, &state).await {
        Ok(SessionEnd::PeerClosed(code)) if is_quiet_close(code) => {
            component_debug!(Component::Endpoint, "{} closed the connection", peer);
        }
        Ok(SessionEnd::PeerClosed(code)) => {
            component_warn!(Component::Endpoint, "subscribe error: {}: peer closed with status {:?}", peer, code);
        }
        Ok(SessionEnd::ShuttingDown) => {
            component_debug!(Component::Endpoint, "{} closed for shutdown", peer);
        }
        Ok(SessionEnd::Ejected) => {
            component_warn!(Component::Endpoint, "🐢 {} ejected: {}", peer, EJECT_REASON);
        }
        Err(e) => {
            component_warn!(Component::Endpoint, "subscribe error: {}: {}", peer, e);
        }
    }
}

/// Register a subscriber on `socket` and drain its queue to the wire
pub async fn stream_lines<R>(socket: WebSocket, peer: &str, state: &SubscribeState<R>) -> TailerResult<SessionEnd>
where
    R: SubscriberRegistry,
{
    let (mut sink, stream) = socket.split();

    let session = state.shutdown.child_token();
    let peer_watch = tokio::spawn(read_to_cancel(stream, session.clone()));

    let (mut subscription, total) = Subscription::register(state.registry.clone(), state.queue_capacity);
    component_info!(Component::Endpoint, "🔗 connected: {}, total subscribers: {}", peer, total);

    let ejected = subscription.inbox().eject_signal();

    let exit = loop {
        tokio::select! {
            biased;
            _ = ejected.cancelled() => break LoopExit::Ejected,
            _ = session.cancelled() => break LoopExit::Cancelled,
            line = subscription.inbox().recv() => {
                let Some(line) = line else {
                    break LoopExit::Cancelled;
                };
                tokio::select! {
                    biased;
                    _ = ejected.cancelled() => break LoopExit::Ejected,
                    written = write_frame(&mut sink, line, state.write_timeout) => {
                        if let Err(e) = written {
                            break LoopExit::WriteFailed(e);
                        }
                    }
                }
            }
        }
    };

    // Shutdown drains on the subscriber count, so the going-away frame is
    // written before this subscriber leaves the registry.
    let shutting_down = matches!(exit, LoopExit::Cancelled) && state.shutdown.is_cancelled();
    if !shutting_down {
        subscription.deregister();
    }

    let peer_closed = matches!(exit, LoopExit::Cancelled) && !shutting_down;
    let peer_result = if peer_closed {
        Some(peer_watch_result(peer_watch).await)
    } else {
        peer_watch.abort();
        None
    };

    let end = match exit {
        LoopExit::Ejected => {
            send_close(&mut sink, close_code::POLICY, EJECT_REASON, state.write_timeout).await;
            Ok(SessionEnd::Ejected)
        }
        LoopExit::Cancelled if shutting_down => {
            flush_queued(&mut sink, subscription.inbox(), state.queue_capacity, state.write_timeout).await;
            send_close(&mut sink, close_code::AWAY, SHUTDOWN_REASON, state.write_timeout).await;
            subscription.deregister();
            Ok(SessionEnd::ShuttingDown)
        }
        LoopExit::Cancelled => {
            let _ = timeout(state.write_timeout, sink.close()).await;
            peer_result.unwrap_or(Ok(None)).map(SessionEnd::PeerClosed)
        }
        LoopExit::WriteFailed(e) => Err(e),
    };

    let total = state.registry.subscriber_count();
    component_info!(Component::Endpoint, "👋 disconnected: {}, total subscribers: {}", peer, total);
    end
}

/// Discard everything the peer sends; cancel the session when it goes away
///
/// Resolves to the peer's close code, if it sent one.
async fn read_to_cancel(mut stream: SplitStream<WebSocket>, session: CancellationToken) -> TailerResult<Option<u16>> {
    let result = loop {
        match stream.next().await {
            Some(Ok(Message::Close(frame))) => break Ok(frame.map(|frame| frame.code)),
            Some(Ok(_)) => continue,
            Some(Err(e)) => break Err(TailerError::from(e)),
            None => break Ok(None),
        }
    };
    session.cancel();
    result
}

async fn peer_watch_result(peer_watch: tokio::task::JoinHandle<TailerResult<Option<u16>>>) -> TailerResult<Option<u16>> {
    match peer_watch.await {
        Ok(result) => result,
        Err(_) => Ok(None),
    }
}

/// Write one line as a text frame under the write deadline
async fn write_frame(sink: &mut SplitSink<WebSocket, Message>, line: Line, deadline: Duration) -> TailerResult<()> {
    match timeout(deadline, sink.send(Message::Text(line.to_string()))).await {
        Ok(result) => result.map_err(TailerError::from),
        Err(_) => Err(TailerError::WriteTimeout(deadline)),
    }
}

/// Write lines that were already queued when shutdown began
///
/// Bounded by the queue capacity so a reader that keeps publishing cannot
/// hold the session open.
async fn flush_queued(sink: &mut SplitSink<WebSocket, Message>, inbox: &mut SubscriberInbox, limit: usize, deadline: Duration) {
    for _ in 0..limit {
        let Some(line) = inbox.try_recv() else {
            break;
        };
        if let Err(e) = write_frame(sink, line, deadline).await {
            component_debug!(Component::Endpoint, "Flush before close stopped: {}", e);
            break;
        }
    }
}

/// Best-effort close frame; the connection is dropped right after either way
async fn send_close(sink: &mut SplitSink<WebSocket, Message>, code: u16, reason: &'static str, deadline: Duration) {
    let frame = CloseFrame {
        code,
        reason: reason.into(),
    };
    if timeout(deadline, sink.send(Message::Close(Some(frame)))).await.is_err() {
        component_debug!(Component::Endpoint, "Close frame ({}) timed out", code);
    }
}

/// Normal closure, going-away, or no code at all
pub fn is_quiet_close(code: Option<u16>) -> bool {
    matches!(code, None | Some(close_code::NORMAL) | Some(close_code::AWAY))
}
