use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::{DeliveryError, MessageSink, SinkIdentity};
use crate::config::AppConfig;
use crate::{Error, Result};

#[derive(Serialize)]
struct SendMessageRequest<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

#[derive(Serialize)]
struct SendPhotoRequest<'a> {
    chat_id: &'a str,
    photo: &'a str,
    caption: &'a str,
    parse_mode: &'static str,
}

#[derive(Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    description: Option<String>,
    result: Option<T>,
}

#[derive(Deserialize)]
struct BotUser {
    id: i64,
    username: Option<String>,
}

/// Telegram Bot API sink posting to a single chat
pub struct TelegramClient {
    client: Client,
    api_base: String,
    chat_id: String,
    probe_timeout: Duration,
}

impl TelegramClient {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let (token, chat_id) = config.validate_delivery()?;
        let telegram = &config.telegram;

        let client = Client::builder()
            .timeout(Duration::from_secs(telegram.request_timeout_secs))
            .build()
            .map_err(Error::Http)?;

        Ok(Self {
            client,
            api_base: format!("{}/bot{}", telegram.api_base.trim_end_matches('/'), token),
            chat_id: chat_id.to_string(),
            probe_timeout: Duration::from_secs(telegram.probe_timeout_secs),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.api_base, method)
    }

    /// Decode the `{ok, description, result}` envelope, treating anything but
    /// HTTP 200 with `ok = true` as a failure
    async fn decode<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> std::result::Result<Option<T>, DeliveryError> {
        let status = response.status();
        let body = response.text().await?;
        let parsed: Option<ApiResponse<T>> = serde_json::from_str(&body).ok();

        match parsed {
            Some(envelope) if status.is_success() && envelope.ok => Ok(envelope.result),
            Some(envelope) => {
                let description = envelope
                    .description
                    .unwrap_or_else(|| "Unknown error".to_string());
                if status.is_success() {
                    Err(DeliveryError::Api(description))
                } else {
                    Err(DeliveryError::Status {
                        status: status.as_u16(),
                        description,
                    })
                }
            }
            None => Err(DeliveryError::Status {
                status: status.as_u16(),
                description: "Unknown error".to_string(),
            }),
        }
    }
}

#[async_trait::async_trait]
impl MessageSink for TelegramClient {
    async fn identity(&self) -> std::result::Result<SinkIdentity, DeliveryError> {
        let response = self
            .client
            .get(self.method_url("getMe"))
            .timeout(self.probe_timeout)
            .send()
            .await?;

        let user: Option<BotUser> = Self::decode(response).await?;
        let user = user.ok_or_else(|| DeliveryError::Api("getMe returned no bot".to_string()))?;

        Ok(SinkIdentity {
            id: user.id,
            username: user.username,
        })
    }

    async fn send_text(&self, text: &str, link_preview: bool) -> std::result::Result<(), DeliveryError> {
        let request = SendMessageRequest {
            chat_id: &self.chat_id,
            text,
            parse_mode: "HTML",
            disable_web_page_preview: !link_preview,
        };

        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&request)
            .send()
            .await?;

        Self::decode::<serde_json::Value>(response).await?;
        Ok(())
    }

    async fn send_image(&self, image_url: &str, caption: &str) -> std::result::Result<(), DeliveryError> {
        let request = SendPhotoRequest {
            chat_id: &self.chat_id,
            photo: image_url,
            caption,
            parse_mode: "HTML",
        };

        let response = self
            .client
            .post(self.method_url("sendPhoto"))
            .json(&request)
            .send()
            .await?;

        Self::decode::<serde_json::Value>(response).await?;
        Ok(())
    }
}
