//! Test helper utilities for tailer integration tests

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

pub type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How a client's stream ended
#[derive(Debug)]
pub enum Ending {
    Closed(Option<u16>),
    Dropped,
}

/// Helper to wait for conditions with timeout
pub async fn wait_for_condition<F>(mut condition: F, timeout_ms: u64) -> bool
where
    F: FnMut() -> bool,
{
    let start = std::time::Instant::now();
    let timeout = Duration::from_millis(timeout_ms);

    loop {
        if condition() {
            return true;
        }

        if start.elapsed() > timeout {
            return false;
        }

        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Open a WebSocket connection to `/subscribe`
pub async fn connect(addr: SocketAddr) -> Client {
    let (client, _response) = connect_async(format!("ws://{addr}/subscribe"))
        .await
        .expect("WebSocket connect failed");
    client
}

/// Next text frame, skipping control frames; `None` once the stream ends
pub async fn next_text(client: &mut Client) -> Option<String> {
    let frame = tokio::time::timeout(Duration::from_secs(5), async {
        while let Some(message) = client.next().await {
            match message {
                Ok(Message::Text(text)) => return Some(text),
                Ok(Message::Close(_)) | Err(_) => return None,
                Ok(_) => continue,
            }
        }
        None
    })
    .await;
    frame.expect("timed out waiting for a frame")
}

/// Read until the connection ends, discarding text frames
pub async fn read_to_end(client: &mut Client, timeout_ms: u64) -> Ending {
    let ending = tokio::time::timeout(Duration::from_millis(timeout_ms), async {
        while let Some(message) = client.next().await {
            match message {
                Ok(Message::Close(frame)) => return Ending::Closed(frame.map(close_code)),
                Ok(_) => continue,
                Err(_) => return Ending::Dropped,
            }
        }
        Ending::Dropped
    })
    .await;
    ending.expect("timed out waiting for the connection to end")
}

fn close_code(frame: CloseFrame<'_>) -> u16 {
    frame.code.into()
}
