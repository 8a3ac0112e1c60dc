use crate::config::credentials::resolve_credential;
use crate::config::{LlmSettings, ProviderKind};
use crate::errors::AttestError;
use super::provider::LLMProvider;
use super::ollama::OllamaProvider;
use super::openai::OpenAICompatibleProvider;

pub fn create_provider(settings: &LlmSettings) -> Result<Box<dyn LLMProvider>, AttestError> {
    if settings.base_url.trim().is_empty() {
        return Err(AttestError::Config("llm.base_url is empty".into()));
    }
    if settings.model.trim().is_empty() {
        return Err(AttestError::Config("llm.model is empty".into()));
    }

    let api_key = settings.api_key.as_deref().map(resolve_credential);

    match settings.provider {
        ProviderKind::Ollama => Ok(Box::new(OllamaProvider::new(
            Some(&settings.base_url),
            Some(&settings.model),
            settings.temperature,
            settings.max_tokens,
        ))),
        ProviderKind::OpenaiCompatible => Ok(Box::new(OpenAICompatibleProvider::new(
            &settings.base_url,
            api_key.as_deref(),
            &settings.model,
            settings.temperature,
            settings.max_tokens,
        ))),
    }
}
