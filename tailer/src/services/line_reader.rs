//! Line reader service
//!
//! Splits one child output stream into lines and publishes each to the
//! registry. Lines over the length limit are skipped without buffering them,
//! and the reader keeps going; end-of-stream or a read error stops only this
//! reader.

use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

use shared::{Component, component_debug, component_info, component_warn};

use crate::traits::SubscriberRegistry;
use crate::types::{Line, StreamKind};

/// Counts reported when a reader finishes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReaderSummary {
    pub published: u64,
    pub dropped: u64,
}

/// Reads one output stream of the child and publishes its lines
pub struct LineReader<S, R> {
    stream: StreamKind,
    source: BufReader<S>,
    registry: Arc<R>,
    max_line_bytes: usize,
}

impl<S, R> LineReader<S, R>
where
    S: AsyncRead + Unpin,
    R: SubscriberRegistry,
{
    pub fn new(stream: StreamKind, source: S, registry: Arc<R>, max_line_bytes: usize) -> Self {
        Self {
            stream,
            source: BufReader::new(source),
            registry,
            max_line_bytes,
        }
    }

    /// Read until end-of-stream, publishing every complete line
    pub async fn run(mut self) -> ReaderSummary {
        let mut summary = ReaderSummary::default();
        let mut pending: Vec<u8> = Vec::new();
        let mut overflowed = false;

        loop {
            let chunk = match self.source.fill_buf().await {
                Ok(chunk) => chunk,
                Err(e) => {
                    component_warn!(Component::Reader, "{} read failed: {}", self.stream, e);
                    break;
                }
            };

            if chunk.is_empty() {
                // An unterminated final line still counts.
                if overflowed {
                    self.report_dropped(&mut summary);
                } else if !pending.is_empty() {
                    self.emit(&pending, &mut summary);
                }
                break;
            }

            let (consumed, line_complete) = match chunk.iter().position(|b| *b == b'\n') {
                Some(newline) => {
                    if !overflowed {
                        if pending.len() + newline > self.max_line_bytes {
                            overflowed = true;
                        } else {
                            pending.extend_from_slice(&chunk[..newline]);
                        }
                    }
                    (newline + 1, true)
                }
                None => {
                    if !overflowed {
                        if pending.len() + chunk.len() > self.max_line_bytes {
                            overflowed = true;
                            pending.clear();
                        } else {
                            pending.extend_from_slice(chunk);
                        }
                    }
                    (chunk.len(), false)
                }
            };
            self.source.consume(consumed);

            if line_complete {
                if overflowed {
                    self.report_dropped(&mut summary);
                } else {
                    self.emit(&pending, &mut summary);
                }
                pending.clear();
                overflowed = false;
            }
        }

        component_info!(
            Component::Reader,
            "📭 {} closed after {} lines ({} dropped)",
            self.stream,
            summary.published,
            summary.dropped
        );
        summary
    }

    fn emit(&self, raw: &[u8], summary: &mut ReaderSummary) {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        let outcome = self.registry.publish(Line::from_bytes(raw));
        summary.published += 1;
        if outcome.ejected > 0 {
            component_debug!(
                Component::Reader,
                "{} line reached {} subscribers, {} ejected",
                self.stream,
                outcome.delivered,
                outcome.ejected
            );
        }
    }

    fn report_dropped(&self, summary: &mut ReaderSummary) {
        summary.dropped += 1;
        component_warn!(
            Component::Reader,
            "✂️ Dropped {} line longer than {} bytes",
            self.stream,
            self.max_line_bytes
        );
    }
}
