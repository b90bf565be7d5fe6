//! Webhook event sink
//!
//! POSTs each event as JSON. Non-2xx responses are delivery failures.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use super::{EventSinkError, TransferEventSink};
use crate::transfer::events::TransferEvent;

pub struct WebhookEventSink {
    client: reqwest::Client,
    url: String,
}

impl WebhookEventSink {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, EventSinkError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl TransferEventSink for WebhookEventSink {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn publish(&self, event: &TransferEvent) -> Result<(), EventSinkError> {
        let response = self
            .client
            .post(&self.url)
            .header("X-Event-Type", event.event_type.as_str())
            .json(event)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(EventSinkError::Rejected(status.as_u16()));
        }

        debug!(event_id = %event.event_id, url = %self.url, "Event delivered");
        Ok(())
    }
}
