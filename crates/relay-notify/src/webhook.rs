//! Webhook payload types and HTTP sender.
//!
//! The payload mirrors the destination's embed format. Delivery is a single
//! JSON `POST`; the destination signals acceptance with `204 No Content`
//! and anything else is a delivery failure.

use crate::error::{NotifyError, NotifyResult};
use futures_util::future::BoxFuture;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;

/// Default timeout for webhook requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Serialize)]
pub struct Author {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EmbedField {
    pub name: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Footer {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Thumbnail {
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Image {
    pub url: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Embed {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<Author>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<EmbedField>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<Thumbnail>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<Image>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<Footer>,
}

/// A rendered notification payload.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Webhook {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embeds: Option<Vec<Embed>>,
}

/// Delivery seam used by the queue; `WebhookClient` is the production
/// implementation.
pub trait DeliverySink: Send + Sync {
    /// `POST` the payload to one destination URL.
    fn deliver<'a>(&'a self, url: &'a str, payload: &'a Webhook) -> BoxFuture<'a, NotifyResult<()>>;
}

/// HTTP sender for webhook payloads.
pub struct WebhookClient {
    client: Client,
}

impl WebhookClient {
    /// Create a new webhook client.
    pub fn new() -> NotifyResult<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| NotifyError::HttpClient(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }

    /// Send one payload to one destination.
    pub async fn send(&self, url: &str, payload: &Webhook) -> NotifyResult<()> {
        let response = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|e| NotifyError::HttpClient(format!("Webhook request failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT {
            Ok(())
        } else {
            Err(NotifyError::Delivery {
                status: status.as_u16(),
            })
        }
    }
}

impl DeliverySink for WebhookClient {
    fn deliver<'a>(&'a self, url: &'a str, payload: &'a Webhook) -> BoxFuture<'a, NotifyResult<()>> {
        Box::pin(self.send(url, payload))
    }
}
