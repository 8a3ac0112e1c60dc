use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use crate::errors::AttestError;
use super::provider::LLMProvider;
use super::types::{LLMResponse, Message};

/// Any server exposing an OpenAI-style `/chat/completions` endpoint
/// (vLLM, llama.cpp server, LM Studio, hosted gateways).
pub struct OpenAICompatibleProvider {
    client: Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
    temperature: f64,
    max_tokens: u32,
}

impl OpenAICompatibleProvider {
    pub fn new(base_url: &str, api_key: Option<&str>, model: &str, temperature: f64, max_tokens: u32) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.filter(|k| !k.is_empty()).map(String::from),
            model: model.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            temperature,
            max_tokens,
        }
    }
}

#[async_trait]
impl LLMProvider for OpenAICompatibleProvider {
    async fn complete(&self, prompt: &str, system: Option<&str>) -> Result<LLMResponse, AttestError> {
        let body = json!({
            "model": self.model,
            "messages": Message::conversation(prompt, system),
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "stream": false,
        });

        let mut request = self.client
            .post(format!("{}/chat/completions", self.base_url))
            .json(&body);
        if let Some(key) = &self.api_key {
            request = request.header("Authorization", format!("Bearer {}", key));
        }

        let resp = request
            .send()
            .await
            .map_err(|e| AttestError::LLMUnavailable(format!("LLM request failed: {}", e)))?;

        let status = resp.status();
        if status.as_u16() == 429 {
            return Err(AttestError::LLMUnavailable("LLM rate limit".into()));
        }
        if status.as_u16() == 401 {
            return Err(AttestError::Config("LLM endpoint rejected the API key".into()));
        }
        if !status.is_success() {
            return Err(AttestError::LLMUnavailable(format!("LLM endpoint returned {}", status)));
        }

        let data: Value = resp.json().await
            .map_err(|e| AttestError::LLMParseFailed(format!("Failed to parse LLM response: {}", e)))?;

        if let Some(error) = data.get("error") {
            return Err(AttestError::LLMUnavailable(error["message"].as_str().unwrap_or("Unknown").to_string()));
        }

        let content = data["choices"][0]["message"]["content"].as_str()
            .ok_or_else(|| AttestError::LLMParseFailed("No content in LLM response".into()))?
            .to_string();

        Ok(LLMResponse {
            content,
            input_tokens: data["usage"]["prompt_tokens"].as_u64(),
            output_tokens: data["usage"]["completion_tokens"].as_u64(),
            model: self.model.clone(),
        })
    }

    fn provider_name(&self) -> &str { "openai_compatible" }
    fn model_name(&self) -> &str { &self.model }
}
