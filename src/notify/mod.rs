//! Outbound notifications. Delivery is fire-and-forget: failures are logged
//! and never change the outcome of the work that triggered them.

pub mod webhook;

use std::sync::Arc;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;
use crate::config::NotificationSettings;
use crate::errors::AttestError;

pub use webhook::WebhookNotifier;

/// Template ids understood by the downstream notification service.
pub const DOCUMENT_EVALUATED: &str = "document_evaluated";
pub const AUDIT_COMPLETED: &str = "audit_completed";
pub const CROSS_FRAMEWORK_CHECKED: &str = "cross_framework_checked";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub channel: String,
    pub template_id: String,
    pub recipients: Vec<String>,
    pub variables: Value,
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: &Notification) -> Result<(), AttestError>;
    fn name(&self) -> &str;
}

/// Used when no webhook is configured.
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn send(&self, _notification: &Notification) -> Result<(), AttestError> {
        Ok(())
    }

    fn name(&self) -> &str {
        "noop"
    }
}

/// Channel, recipients and the notifier picked from configuration.
#[derive(Clone)]
pub struct NotificationHub {
    notifier: Arc<dyn Notifier>,
    channel: String,
    recipients: Vec<String>,
}

impl NotificationHub {
    pub fn new(notifier: Arc<dyn Notifier>, channel: &str, recipients: Vec<String>) -> Self {
        Self { notifier, channel: channel.to_string(), recipients }
    }

    pub fn disabled() -> Self {
        Self::new(Arc::new(NoopNotifier), "none", Vec::new())
    }

    pub fn from_settings(settings: &NotificationSettings) -> Result<Self, AttestError> {
        let Some(url) = settings.webhook_url.as_deref() else {
            return Ok(Self::disabled());
        };
        let channel = settings.channel.clone().unwrap_or_else(|| "webhook".to_string());
        Ok(Self::new(Arc::new(WebhookNotifier::new(url)?), &channel, settings.recipients.clone()))
    }

    pub fn notifier_name(&self) -> &str {
        self.notifier.name()
    }

    pub fn build(&self, template_id: &str, variables: Value) -> Notification {
        Notification {
            channel: self.channel.clone(),
            template_id: template_id.to_string(),
            recipients: self.recipients.clone(),
            variables,
        }
    }

    /// Send in the background. Must be called inside a tokio runtime.
    pub fn dispatch(&self, template_id: &str, variables: Value) {
        let notification = self.build(template_id, variables);
        let notifier = Arc::clone(&self.notifier);
        tokio::spawn(async move {
            if let Err(e) = notifier.send(&notification).await {
                warn!(
                    notifier = notifier.name(),
                    template_id = %notification.template_id,
                    error = %e,
                    "Notification delivery failed"
                );
            }
        });
    }
}
