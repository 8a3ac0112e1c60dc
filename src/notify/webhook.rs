use std::time::Duration;
use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use crate::config::credentials::redact_credentials;
use crate::errors::{with_retry, AttestError, RetryConfig};
use super::{Notification, Notifier};

/// POSTs each notification as JSON to a single endpoint.
pub struct WebhookNotifier {
    client: Client,
    url: String,
    retry: RetryConfig,
}

impl WebhookNotifier {
    pub fn new(url: &str) -> Result<Self, AttestError> {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(AttestError::Config(format!("webhook url must be http(s): {}", url)));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| AttestError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client, url: url.to_string(), retry: RetryConfig::default() })
    }

    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    async fn post(&self, notification: &Notification) -> Result<(), AttestError> {
        let resp = self.client
            .post(&self.url)
            .header("X-Attest-Template", &notification.template_id)
            .json(notification)
            .send()
            .await
            .map_err(|e| {
                let message = redact_credentials(&e.to_string(), &[self.url.as_str()]);
                AttestError::Network(format!("Webhook request failed: {}", message))
            })?;

        let status = resp.status();
        if status.is_success() {
            Ok(())
        } else if status.is_server_error() || status.as_u16() == 429 {
            Err(AttestError::Network(format!("Webhook returned HTTP {}", status)))
        } else {
            Err(AttestError::InvalidInput(format!("Webhook rejected notification: HTTP {}", status)))
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn send(&self, notification: &Notification) -> Result<(), AttestError> {
        with_retry("webhook_notify", &self.retry, || self.post(notification)).await?;
        debug!(url = %self.url, template_id = %notification.template_id, "Notification delivered");
        Ok(())
    }

    fn name(&self) -> &str {
        "webhook"
    }
}
