pub mod provider;
pub mod ollama;
pub mod openai;
pub mod router;
pub mod types;
pub mod client;
pub mod json;

pub use provider::LLMProvider;
pub use router::create_provider;
pub use types::{CallTags, LLMResponse, ModelType};
pub use client::LlmClient;
pub use json::extract_json_object;
