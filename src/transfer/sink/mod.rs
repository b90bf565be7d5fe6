//! Event Sinks
//!
//! Delivery channels for [`TransferEvent`]s. The coordinator publishes after
//! a successful save and treats sink failures as non-fatal.

pub mod channel;
pub mod webhook;

pub use channel::{ChannelEventSink, EventReceiver, event_channel};
pub use webhook::WebhookEventSink;

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use thiserror::Error;

use super::events::TransferEvent;

#[derive(Error, Debug)]
pub enum EventSinkError {
    #[error("Event channel closed")]
    ChannelClosed,

    #[error("Event serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Webhook delivery failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Webhook rejected event with status {0}")]
    Rejected(u16),

    #[error("Event sink unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait TransferEventSink: Send + Sync {
    /// Sink name for logging
    fn name(&self) -> &'static str;

    async fn publish(&self, event: &TransferEvent) -> Result<(), EventSinkError>;
}

/// Writes each event as a structured tracing record
#[derive(Debug, Clone, Default)]
pub struct LogEventSink;

#[async_trait]
impl TransferEventSink for LogEventSink {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn publish(&self, event: &TransferEvent) -> Result<(), EventSinkError> {
        tracing::info!(
            target: crate::logging::EVENT_TARGET,
            event_id = %event.event_id,
            event_type = %event.event_type,
            transfer_id = %event.transfer_id,
            reference_number = %event.reference_number,
            source = %event.source_warehouse_id,
            destination = %event.destination_warehouse_id,
            status = %event.status,
            previous = ?event.previous_status(),
            "Transfer event"
        );
        Ok(())
    }
}

/// Discards events
#[derive(Debug, Clone, Default)]
pub struct NoopEventSink;

#[async_trait]
impl TransferEventSink for NoopEventSink {
    fn name(&self) -> &'static str {
        "noop"
    }

    async fn publish(&self, _event: &TransferEvent) -> Result<(), EventSinkError> {
        Ok(())
    }
}

/// Keeps published events in memory; can be switched to fail
#[derive(Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<TransferEvent>>,
    fail: AtomicBool,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail every publish while set; failed events are not recorded
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn events(&self) -> Vec<TransferEvent> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<TransferEvent>> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl TransferEventSink for RecordingEventSink {
    fn name(&self) -> &'static str {
        "recording"
    }

    async fn publish(&self, event: &TransferEvent) -> Result<(), EventSinkError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(EventSinkError::Unavailable("recording sink set to fail".into()));
        }
        self.lock().push(event.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::types::{NewTransferItem, NewTransferRequest, TransferRequest};
    use chrono::Utc;

    fn event() -> TransferEvent {
        let transfer = TransferRequest::draft(
            NewTransferRequest::new("W1", "W2", vec![NewTransferItem::new("SKU-1", 1)]),
            "TR-20260101-1234".into(),
            Utc::now(),
        );
        TransferEvent::created(&transfer)
    }

    #[tokio::test]
    async fn test_recording_sink() {
        let sink = RecordingEventSink::new();
        sink.publish(&event()).await.unwrap();
        assert_eq!(sink.len(), 1);

        sink.set_fail(true);
        assert!(sink.publish(&event()).await.is_err());
        assert_eq!(sink.len(), 1);

        sink.set_fail(false);
        sink.clear();
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_log_and_noop_sinks_accept() {
        assert!(LogEventSink.publish(&event()).await.is_ok());
        assert!(NoopEventSink.publish(&event()).await.is_ok());
    }
}
