mod client;
mod format;
mod telegram;

pub use client::DeliveryClient;
pub use format::{compose, Framing, CAPTION_LIMIT, TEXT_LIMIT};
pub use telegram::TelegramClient;

use thiserror::Error;

/// Why a single call to the messaging sink failed
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Telegram API error: {0}")]
    Api(String),

    #[error("HTTP {status}: {description}")]
    Status { status: u16, description: String },
}

/// Identity reported by the sink's reachability probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SinkIdentity {
    pub id: i64,
    pub username: Option<String>,
}

/// A messaging endpoint that accepts one message per call.
///
/// The target chat is part of the sink's own configuration.
#[async_trait::async_trait]
pub trait MessageSink: Send + Sync {
    /// Lightweight probe used to check the sink is reachable before a run
    async fn identity(&self) -> Result<SinkIdentity, DeliveryError>;

    async fn send_text(&self, text: &str, link_preview: bool) -> Result<(), DeliveryError>;

    async fn send_image(&self, image_url: &str, caption: &str) -> Result<(), DeliveryError>;
}
