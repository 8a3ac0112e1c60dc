use std::sync::Arc;
use std::time::{Duration, Instant};
use serde_json::Value;
use tracing::{debug, warn};
use crate::config::LlmSettings;
use crate::errors::AttestError;
use super::json::extract_json_object;
use super::provider::LLMProvider;
use super::router::create_provider;
use super::types::CallTags;

/// The one path to the model. Enforces the per-call timeout and folds every
/// transport failure into `LLMUnavailable`.
#[derive(Clone)]
pub struct LlmClient {
    provider: Arc<dyn LLMProvider>,
    timeout: Duration,
}

impl LlmClient {
    pub fn new(provider: Arc<dyn LLMProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    pub fn from_settings(settings: &LlmSettings) -> Result<Self, AttestError> {
        let provider: Arc<dyn LLMProvider> = Arc::from(create_provider(settings)?);
        Ok(Self::new(provider, Duration::from_secs(settings.timeout_secs)))
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }

    pub fn provider_name(&self) -> &str {
        self.provider.provider_name()
    }

    /// Submit a prompt and return the raw text response.
    pub async fn chat(&self, prompt: &str, system: Option<&str>, tags: CallTags) -> Result<String, AttestError> {
        let started = Instant::now();
        debug!(
            provider = %self.provider.provider_name(),
            model = %self.provider.model_name(),
            audit_id = ?tags.audit_id,
            document_id = ?tags.document_id,
            model_type = tags.model_type.as_str(),
            prompt_chars = prompt.len(),
            "LLM call"
        );

        let result = tokio::time::timeout(self.timeout, self.provider.complete(prompt, system)).await;
        let response = match result {
            Err(_) => {
                warn!(
                    audit_id = ?tags.audit_id,
                    document_id = ?tags.document_id,
                    timeout_secs = self.timeout.as_secs(),
                    "LLM call timed out"
                );
                return Err(AttestError::LLMUnavailable(format!(
                    "LLM call timed out after {}s",
                    self.timeout.as_secs()
                )));
            }
            Ok(Err(AttestError::Network(msg))) => return Err(AttestError::LLMUnavailable(msg)),
            Ok(Err(e)) => {
                warn!(audit_id = ?tags.audit_id, document_id = ?tags.document_id, error = %e, "LLM call failed");
                return Err(e);
            }
            Ok(Ok(response)) => response,
        };

        if response.content.trim().is_empty() {
            return Err(AttestError::LLMParseFailed("LLM returned an empty response".into()));
        }

        debug!(
            audit_id = ?tags.audit_id,
            document_id = ?tags.document_id,
            model_type = tags.model_type.as_str(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            input_tokens = ?response.input_tokens,
            output_tokens = ?response.output_tokens,
            "LLM call complete"
        );
        Ok(response.content)
    }

    /// `chat` followed by tolerant JSON object recovery.
    pub async fn chat_json(&self, prompt: &str, system: Option<&str>, tags: CallTags) -> Result<Value, AttestError> {
        let raw = self.chat(prompt, system, tags).await?;
        extract_json_object(&raw)
    }
}
