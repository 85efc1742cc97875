use std::sync::Arc;
use std::time::Duration;

use super::format::{compose, Framing};
use super::{DeliveryError, MessageSink, SinkIdentity};
use crate::config::AppConfig;
use crate::feed::FeedItem;

/// Delivers items to a sink one at a time, paced for the sink's rate limits
#[derive(Clone)]
pub struct DeliveryClient {
    sink: Arc<dyn MessageSink>,
    delay: Duration,
    link_preview: bool,
}

impl DeliveryClient {
    pub fn new(sink: Arc<dyn MessageSink>, delay: Duration) -> Self {
        Self {
            sink,
            delay,
            link_preview: true,
        }
    }

    pub fn from_config(sink: Arc<dyn MessageSink>, config: &AppConfig) -> Self {
        Self::new(sink, Duration::from_millis(config.telegram.delivery_delay_ms))
            .with_link_preview(config.telegram.link_preview)
    }

    pub fn with_link_preview(mut self, enabled: bool) -> Self {
        self.link_preview = enabled;
        self
    }

    /// Check the sink is reachable
    pub async fn probe(&self) -> Result<SinkIdentity, DeliveryError> {
        self.sink.identity().await
    }

    /// Send one item, as a captioned image when it has an image and as text otherwise
    pub async fn deliver_one(&self, item: &FeedItem) -> Result<(), DeliveryError> {
        let framing = Framing::for_item(item);
        let message = compose(item, framing);

        match (&item.image_url, framing) {
            (Some(image_url), Framing::ImageCaption) => {
                tracing::info!("Sending photo: {}", item.short_title());
                self.sink.send_image(image_url, &message).await
            }
            _ => {
                tracing::info!("Sending text message: {}", item.short_title());
                self.sink.send_text(&message, self.link_preview).await
            }
        }
    }

    /// Deliver items in input order, returning whether each one was confirmed.
    ///
    /// A failed item is logged and skipped; later items are still attempted.
    pub async fn deliver_each(&self, items: &[FeedItem]) -> Vec<bool> {
        let mut outcomes = Vec::with_capacity(items.len());

        tracing::info!("Delivering {} items", items.len());

        for (i, item) in items.iter().enumerate() {
            match self.deliver_one(item).await {
                Ok(()) => outcomes.push(true),
                Err(e) => {
                    tracing::error!(
                        item = i + 1,
                        total = items.len(),
                        "Failed to deliver '{}': {}",
                        item.short_title(),
                        e
                    );
                    outcomes.push(false);
                }
            }

            if i + 1 < items.len() && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
        }

        let delivered = outcomes.iter().filter(|ok| **ok).count();
        tracing::info!("Delivered {}/{} items", delivered, items.len());

        outcomes
    }

    /// Deliver items in input order and return how many were confirmed
    pub async fn deliver_many(&self, items: &[FeedItem]) -> usize {
        self.deliver_each(items).await.into_iter().filter(|ok| *ok).count()
    }
}
