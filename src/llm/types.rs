use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LLMResponse {
    pub content: String,
    pub input_tokens: Option<u64>,
    pub output_tokens: Option<u64>,
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    pub fn system(content: &str) -> Self {
        Self { role: "system".to_string(), content: content.to_string() }
    }
    pub fn user(content: &str) -> Self {
        Self { role: "user".to_string(), content: content.to_string() }
    }

    /// System message (when given) followed by the user prompt.
    pub fn conversation(prompt: &str, system: Option<&str>) -> Vec<Self> {
        let mut messages = Vec::with_capacity(2);
        if let Some(sys) = system {
            messages.push(Self::system(sys));
        }
        messages.push(Self::user(prompt));
        messages
    }
}

/// What a call is for; recorded alongside every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    #[default]
    Compliance,
    Analysis,
    Recommendations,
}

impl ModelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compliance => "compliance",
            Self::Analysis => "analysis",
            Self::Recommendations => "recommendations",
        }
    }
}

/// Caller tags attached to an LLM call for tracing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallTags {
    pub audit_id: Option<i64>,
    pub document_id: Option<i64>,
    pub model_type: ModelType,
}

impl CallTags {
    pub fn new(model_type: ModelType) -> Self {
        Self { model_type, ..Default::default() }
    }

    pub fn audit(mut self, audit_id: i64) -> Self {
        self.audit_id = Some(audit_id);
        self
    }

    pub fn document(mut self, document_id: i64) -> Self {
        self.document_id = Some(document_id);
        self
    }
}
