//! In-process event channel
//!
//! Bounded tokio mpsc pair for consumers living in the same process
//! (notification workers, projections).

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use super::{EventSinkError, TransferEventSink};
use crate::transfer::events::TransferEvent;

/// Sender side, handed to the coordinator
#[derive(Clone)]
pub struct ChannelEventSink {
    tx: mpsc::Sender<TransferEvent>,
}

#[async_trait]
impl TransferEventSink for ChannelEventSink {
    fn name(&self) -> &'static str {
        "channel"
    }

    async fn publish(&self, event: &TransferEvent) -> Result<(), EventSinkError> {
        self.tx
            .send(event.clone())
            .await
            .map_err(|_| EventSinkError::ChannelClosed)?;
        debug!(event_id = %event.event_id, "Event queued");
        Ok(())
    }
}

/// Receiver side, owned by the consumer
pub struct EventReceiver {
    rx: mpsc::Receiver<TransferEvent>,
}

impl EventReceiver {
    /// Non-blocking receive
    pub fn try_recv(&mut self) -> Option<TransferEvent> {
        self.rx.try_recv().ok()
    }

    /// Wait for the next event; `None` once every sender is dropped
    pub async fn recv(&mut self) -> Option<TransferEvent> {
        self.rx.recv().await
    }

    /// Drain everything currently queued
    pub fn drain(&mut self) -> Vec<TransferEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }
}

/// Create a new event channel pair
pub fn event_channel(buffer: usize) -> (ChannelEventSink, EventReceiver) {
    let (tx, rx) = mpsc::channel(buffer);
    (ChannelEventSink { tx }, EventReceiver { rx })
}
