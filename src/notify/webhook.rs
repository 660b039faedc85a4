//! Webhook notification sink.
//!
//! POSTs each alert as JSON to a configured URL (Slack-compatible
//! payloads work with a thin receiver in between). The URL usually
//! carries a secret path segment, so it is read from an environment
//! variable rather than the config file.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use super::{Notification, NotificationSink};
use crate::types::EngineError;

const SINK_NAME: &str = "webhook";

const REQUEST_TIMEOUT_SECS: u64 = 10;

pub struct WebhookSink {
    http: Client,
    url: String,
}

impl WebhookSink {
    pub fn new(url: String) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .context("Failed to build HTTP client for webhook sink")?;

        Ok(Self { http, url })
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    async fn notify(&self, notification: &Notification) -> Result<()> {
        let resp = self
            .http
            .post(&self.url)
            .json(notification)
            .send()
            .await
            .map_err(|e| EngineError::Notification(format!("Webhook request failed: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(EngineError::Notification(format!(
                "Webhook delivery failed {status}: {body}"
            ))
            .into());
        }

        debug!(dedupe_key = %notification.dedupe_key, "Webhook delivered");
        Ok(())
    }

    fn name(&self) -> &str {
        SINK_NAME
    }
}
