// Graph API client for WhatsApp Cloud API, Messenger and Instagram

use anyhow::{Context, Result};
use async_trait::async_trait;
use chatsa_types::Channel;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::outbound::{instagram_payloads, messenger_payloads, whatsapp_payloads, OutboundMessage};
use super::{MetaMessenger, SendTarget};

pub const DEFAULT_GRAPH_BASE_URL: &str = "https://graph.facebook.com";
pub const DEFAULT_GRAPH_VERSION: &str = "v21.0";

const SUBSCRIBED_FIELDS: &str = "messages,messaging_postbacks,message_echoes";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub graph_base_url: String,
    pub graph_version: String,
    /// Id of our own app, used to tell bot echoes from agent replies
    pub app_id: Option<u64>,
    pub app_secret: String,
    pub verify_token: String,
}

impl Default for MetaConfig {
    fn default() -> Self {
        Self {
            graph_base_url: DEFAULT_GRAPH_BASE_URL.to_string(),
            graph_version: DEFAULT_GRAPH_VERSION.to_string(),
            app_id: None,
            app_secret: String::new(),
            verify_token: String::new(),
        }
    }
}

pub struct GraphApiClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl GraphApiClient {
    pub fn new(config: &MetaConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http_client,
            base_url: format!(
                "{}/{}",
                config.graph_base_url.trim_end_matches('/'),
                config.graph_version
            ),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post(&self, path: &str, access_token: &str, payload: &Value) -> Result<Value> {
        let response = self
            .http_client
            .post(format!("{}/{}", self.base_url, path))
            .bearer_auth(access_token)
            .json(payload)
            .send()
            .await
            .context("Failed to send Graph API request")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Graph API error ({}): {}", status, error_text);
        }

        response.json().await.context("Failed to parse Graph API response")
    }
}

/// Message id from a send response, whichever shape the channel uses
fn sent_message_id(body: &Value) -> Option<String> {
    body.get("messages")
        .and_then(|m| m.get(0))
        .and_then(|m| m.get("id"))
        .or_else(|| body.get("message_id"))
        .and_then(Value::as_str)
        .map(String::from)
}

#[async_trait]
impl MetaMessenger for GraphApiClient {
    async fn send(&self, target: &SendTarget, message: &OutboundMessage) -> Result<Vec<String>> {
        let payloads = match target.channel {
            Channel::WhatsApp => whatsapp_payloads(&target.recipient_id, message),
            Channel::Messenger => messenger_payloads(&target.recipient_id, message),
            Channel::Instagram => instagram_payloads(&target.recipient_id, message),
            Channel::Web => anyhow::bail!("Web conversations are not delivered through Meta"),
        };

        let path = format!("{}/messages", target.account_id);
        let mut ids = Vec::with_capacity(payloads.len());
        for payload in &payloads {
            let body = self.post(&path, &target.access_token, payload).await?;
            if let Some(id) = sent_message_id(&body) {
                ids.push(id);
            }
        }

        tracing::debug!(
            channel = %target.channel,
            account_id = %target.account_id,
            parts = payloads.len(),
            "Sent outbound message"
        );
        Ok(ids)
    }

    async fn subscribe_app(&self, channel: Channel, account_id: &str, access_token: &str) -> Result<()> {
        match channel {
            // WhatsApp webhooks are configured on the app itself
            Channel::WhatsApp | Channel::Web => Ok(()),
            Channel::Messenger | Channel::Instagram => {
                let path = format!("{}/subscribed_apps", account_id);
                self.post(
                    &path,
                    access_token,
                    &serde_json::json!({ "subscribed_fields": SUBSCRIBED_FIELDS }),
                )
                .await?;
                tracing::info!(channel = %channel, account_id = %account_id, "Subscribed app to account webhooks");
                Ok(())
            }
        }
    }
}
