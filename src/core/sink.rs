// src/core/sink.rs

//! Delivery of progress events to whoever is watching a scan.
//!
//! Scanners never talk to the sink directly. Each scan gets an ordered channel; scanners
//! hold a [`ProgressReporter`] on the sending side and a forwarding task drains the
//! receiving side into the [`ProgressSink`], so a failing sink never fails the scan. A
//! push that does not resolve within [`SINK_PUSH_TIMEOUT`] marks the sink as stalled and
//! the rest of the stream is dropped.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, warn};

use crate::core::error::SinkError;
use crate::core::events::{LiveMetrics, LogLevel, ProgressEvent};

/// Longest a single push may take before the sink is given up on.
pub const SINK_PUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Per-scan destination for progress events.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn push(&self, scan_id: &str, event: &ProgressEvent) -> Result<(), SinkError>;
}

/// One live destination per scan id, kept in a concurrent map.
///
/// Registering a scan id again replaces the previous destination. Events pushed while no
/// destination is registered are dropped; there is no replay.
#[derive(Debug, Default)]
pub struct SinkRegistry {
    destinations: RwLock<HashMap<String, mpsc::UnboundedSender<ProgressEvent>>>,
}

impl SinkRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, scan_id: &str) -> mpsc::UnboundedReceiver<ProgressEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        if self
            .destinations
            .write()
            .await
            .insert(scan_id.to_string(), tx)
            .is_some()
        {
            debug!(scan_id, "Replaced existing progress destination");
        }
        rx
    }

    pub async fn unregister(&self, scan_id: &str) {
        self.destinations.write().await.remove(scan_id);
    }

    pub async fn is_registered(&self, scan_id: &str) -> bool {
        self.destinations.read().await.contains_key(scan_id)
    }

    /// Drops the destination only if its viewer is gone. The scan may have been
    /// registered again since a failed send.
    async fn remove_if_closed(&self, scan_id: &str) {
        let mut destinations = self.destinations.write().await;
        if destinations.get(scan_id).is_some_and(|destination| destination.is_closed()) {
            destinations.remove(scan_id);
        }
    }
}

#[async_trait]
impl ProgressSink for SinkRegistry {
    async fn push(&self, scan_id: &str, event: &ProgressEvent) -> Result<(), SinkError> {
        let sent = match self.destinations.read().await.get(scan_id) {
            Some(destination) => destination.send(event.clone()).is_ok(),
            None => return Ok(()),
        };
        if sent {
            return Ok(());
        }

        self.remove_if_closed(scan_id).await;
        Err(SinkError::Disconnected(scan_id.to_string()))
    }
}

/// Sending half of a scan's event stream, tagged with the phase it reports for.
#[derive(Debug, Clone)]
pub struct ProgressReporter {
    phase: String,
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ProgressReporter {
    pub fn new(phase: &str, tx: mpsc::UnboundedSender<ProgressEvent>) -> Self {
        Self {
            phase: phase.to_string(),
            tx,
        }
    }

    /// A reporter whose events can be read back from the returned receiver.
    pub fn channel(phase: &str) -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self::new(phase, tx), rx)
    }

    pub fn for_phase(&self, phase: &str) -> Self {
        Self::new(phase, self.tx.clone())
    }

    pub fn phase(&self) -> &str {
        &self.phase
    }

    /// Queues an event. A closed stream is not an error for the scan.
    pub fn emit(&self, event: ProgressEvent) {
        if self.tx.send(event).is_err() {
            debug!(phase = %self.phase, "Progress stream closed; event dropped");
        }
    }

    pub fn log(&self, level: LogLevel, message: impl Into<String>) {
        self.emit(ProgressEvent::log(&self.phase, level, message));
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(LogLevel::Info, message);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.log(LogLevel::Success, message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.log(LogLevel::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(LogLevel::Error, message);
    }

    pub fn progress(&self, percent: u8, message: impl Into<String>, live_metrics: Option<LiveMetrics>) {
        self.emit(ProgressEvent::progress(&self.phase, percent, message, live_metrics));
    }
}

/// Drains one scan's event stream into `sink` in order. Returns how many events were
/// accepted by the sink.
pub async fn forward_events(
    scan_id: String,
    events: mpsc::UnboundedReceiver<ProgressEvent>,
    sink: Arc<dyn ProgressSink>,
) -> usize {
    forward_events_with_timeout(scan_id, events, sink, SINK_PUSH_TIMEOUT).await
}

/// [`forward_events`] with an explicit per-push time limit.
pub async fn forward_events_with_timeout(
    scan_id: String,
    mut events: mpsc::UnboundedReceiver<ProgressEvent>,
    sink: Arc<dyn ProgressSink>,
    push_timeout: Duration,
) -> usize {
    let mut delivered = 0;
    while let Some(event) = events.recv().await {
        match tokio::time::timeout(push_timeout, sink.push(&scan_id, &event)).await {
            Ok(Ok(())) => delivered += 1,
            Ok(Err(e)) => warn!(scan_id = %scan_id, kind = event.kind(), error = %e, "Progress push failed"),
            Err(_) => {
                warn!(scan_id = %scan_id, kind = event.kind(), "Progress sink stalled; dropping the rest of the stream");
                events.close();
                let mut dropped = 0;
                while events.recv().await.is_some() {
                    dropped += 1;
                }
                debug!(scan_id = %scan_id, dropped, "Progress events dropped");
                break;
            }
        }
    }
    delivered
}
