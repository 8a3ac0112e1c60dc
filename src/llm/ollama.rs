use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use crate::errors::AttestError;
use super::provider::LLMProvider;
use super::types::{LLMResponse, Message};

/// Native Ollama `/api/chat` backend.
pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
    temperature: f64,
    max_tokens: u32,
}

impl OllamaProvider {
    pub fn new(base_url: Option<&str>, model: Option<&str>, temperature: f64, max_tokens: u32) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.unwrap_or("http://localhost:11434").trim_end_matches('/').to_string(),
            model: model.unwrap_or("llama3.1:8b").to_string(),
            temperature,
            max_tokens,
        }
    }

    fn request_body(&self, prompt: &str, system: Option<&str>) -> Value {
        json!({
            "model": self.model,
            "messages": Message::conversation(prompt, system),
            "stream": false,
            "options": {
                "temperature": self.temperature,
                "num_predict": self.max_tokens,
            },
        })
    }
}

#[async_trait]
impl LLMProvider for OllamaProvider {
    async fn complete(&self, prompt: &str, system: Option<&str>) -> Result<LLMResponse, AttestError> {
        let resp = self.client
            .post(format!("{}/api/chat", self.base_url))
            .json(&self.request_body(prompt, system))
            .send()
            .await
            .map_err(|e| AttestError::LLMUnavailable(format!("Ollama request failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AttestError::LLMUnavailable(format!("Ollama returned {}: {}", status, body.chars().take(200).collect::<String>())));
        }

        let data: Value = resp.json().await
            .map_err(|e| AttestError::LLMParseFailed(format!("Failed to parse Ollama response: {}", e)))?;

        if let Some(error) = data.get("error").and_then(|e| e.as_str()) {
            return Err(AttestError::LLMUnavailable(error.to_string()));
        }

        let content = data["message"]["content"].as_str()
            .ok_or_else(|| AttestError::LLMParseFailed("No message content in Ollama response".into()))?
            .to_string();

        Ok(LLMResponse {
            content,
            input_tokens: data["prompt_eval_count"].as_u64(),
            output_tokens: data["eval_count"].as_u64(),
            model: self.model.clone(),
        })
    }

    fn provider_name(&self) -> &str { "ollama" }
    fn model_name(&self) -> &str { &self.model }
}
