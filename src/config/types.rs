use serde::{Deserialize, Serialize};

/// Top-level configuration file. Every section is optional.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct AttestConfig {
    pub llm: LlmSettings,
    pub evaluation: EvaluationSettings,
    pub fanout: FanoutSettings,
    pub jobs: JobSettings,
    pub storage: StorageSettings,
    pub notifications: NotificationSettings,
    /// Directory whose `*.txt` files override the embedded prompt templates.
    pub prompts_dir: Option<String>,
    pub database: Option<String>,
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    #[default]
    Ollama,
    OpenaiCompatible,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::OpenaiCompatible => "openai_compatible",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().replace('-', "_").as_str() {
            "ollama" | "local" => Some(Self::Ollama),
            "openai_compatible" | "openai" => Some(Self::OpenaiCompatible),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LlmSettings {
    pub provider: ProviderKind,
    pub base_url: String,
    pub model: String,
    /// Literal key or `$ENV_VAR` reference.
    pub api_key: Option<String>,
    pub temperature: f64,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Ollama,
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.1:8b".to_string(),
            api_key: None,
            temperature: 0.1,
            max_tokens: 800,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct EvaluationSettings {
    pub batch_size: usize,
    /// Characters of extracted text passed to the model per call.
    pub text_char_cap: usize,
    /// Larger cap used when two documents are compared.
    pub cross_document_char_cap: usize,
    pub max_list_items: usize,
    pub max_item_chars: usize,
    pub enrich_findings: bool,
}

impl Default for EvaluationSettings {
    fn default() -> Self {
        Self {
            batch_size: 5,
            text_char_cap: 12_000,
            cross_document_char_cap: 40_000,
            max_list_items: 10,
            max_item_chars: 2048,
            enrich_findings: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct FanoutSettings {
    pub max_requirements_per_framework: usize,
    pub auto_on_upload: bool,
}

impl Default for FanoutSettings {
    fn default() -> Self {
        Self { max_requirements_per_framework: 10, auto_on_upload: false }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct JobSettings {
    pub max_concurrent: usize,
    pub timeout_secs: u64,
    pub auto_check_on_upload: bool,
}

impl Default for JobSettings {
    fn default() -> Self {
        Self { max_concurrent: 4, timeout_secs: 900, auto_check_on_upload: false }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct StorageSettings {
    pub media_root: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self { media_root: "./media".to_string() }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
#[serde(default)]
pub struct NotificationSettings {
    pub webhook_url: Option<String>,
    pub channel: Option<String>,
    pub recipients: Vec<String>,
}
