use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use regex::Regex;
use crate::errors::AttestError;
use tracing::debug;

static INCLUDE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"@include\(([^)]+)\)").unwrap());
static PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\{\{[A-Z0-9_]+\}\}").unwrap());

/// Templates compiled into the binary, keyed by path relative to the prompts dir.
const EMBEDDED: &[(&str, &str)] = &[
    ("compliance-system.txt", include_str!("../../prompts/compliance-system.txt")),
    ("compliance-batch.txt", include_str!("../../prompts/compliance-batch.txt")),
    ("finding-enrichment.txt", include_str!("../../prompts/finding-enrichment.txt")),
    ("sebi-cross-period.txt", include_str!("../../prompts/sebi-cross-period.txt")),
    ("sebi-cross-document.txt", include_str!("../../prompts/sebi-cross-document.txt")),
    ("sebi-narrative.txt", include_str!("../../prompts/sebi-narrative.txt")),
    ("sebi-last-day.txt", include_str!("../../prompts/sebi-last-day.txt")),
    ("sebi-recurring-edits.txt", include_str!("../../prompts/sebi-recurring-edits.txt")),
    ("shared/_scoring_rubric.txt", include_str!("../../prompts/shared/_scoring_rubric.txt")),
];

/// Values for `{{VARIABLE}}` placeholders. Unset placeholders render empty.
#[derive(Debug, Clone, Default)]
pub struct PromptVariables {
    values: BTreeMap<String, String>,
}

impl PromptVariables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, name: &str, value: impl Into<String>) -> Self {
        self.values.insert(name.to_string(), value.into());
        self
    }

    pub fn set_opt(self, name: &str, value: Option<&str>) -> Self {
        let rendered = value.filter(|v| !v.trim().is_empty()).unwrap_or("Not specified");
        self.set(name, rendered)
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }
}

/// Loads prompt templates with include directives and variable interpolation.
/// Files in the override directory shadow the embedded templates.
#[derive(Debug, Clone, Default)]
pub struct PromptLoader {
    override_dir: Option<PathBuf>,
}

const MAX_INCLUDE_DEPTH: u8 = 5;

impl PromptLoader {
    pub fn new(override_dir: Option<PathBuf>) -> Self {
        if let Some(dir) = &override_dir {
            debug!(dir = %dir.display(), "PromptLoader using override directory");
        }
        Self { override_dir }
    }

    pub fn embedded() -> Self {
        Self { override_dir: None }
    }

    /// Load a prompt template by name (without .txt extension), processing @include directives.
    pub fn load(&self, prompt_name: &str) -> Result<String, AttestError> {
        let content = self.read(&format!("{}.txt", prompt_name))?;
        self.process_includes(&content, 0)
    }

    /// Load and interpolate in one step.
    pub fn render(&self, prompt_name: &str, vars: &PromptVariables) -> Result<String, AttestError> {
        Ok(self.interpolate(&self.load(prompt_name)?, vars))
    }

    /// Replace {{VARIABLE}} placeholders; placeholders without a value become empty.
    pub fn interpolate(&self, template: &str, vars: &PromptVariables) -> String {
        PLACEHOLDER_RE
            .replace_all(template, |caps: &regex::Captures| {
                let name = caps[0].trim_start_matches("{{").trim_end_matches("}}");
                vars.get(name).unwrap_or("").to_string()
            })
            .into_owned()
    }

    fn read(&self, relative: &str) -> Result<String, AttestError> {
        if relative.contains("..") {
            return Err(AttestError::Prompt(format!("Invalid prompt path: {}", relative)));
        }
        if let Some(dir) = &self.override_dir {
            let file_path = dir.join(relative);
            if file_path.exists() {
                return std::fs::read_to_string(&file_path).map_err(|e| {
                    AttestError::Prompt(format!("Failed to read prompt {}: {}", file_path.display(), e))
                });
            }
        }
        EMBEDDED
            .iter()
            .find(|(name, _)| *name == relative)
            .map(|(_, body)| body.to_string())
            .ok_or_else(|| AttestError::Prompt(format!("Prompt not found: {}", relative)))
    }

    /// Process @include(path) directives recursively with depth limit.
    fn process_includes(&self, content: &str, depth: u8) -> Result<String, AttestError> {
        if depth >= MAX_INCLUDE_DEPTH {
            return Err(AttestError::Prompt(format!(
                "Include depth limit ({}) exceeded, possible circular include",
                MAX_INCLUDE_DEPTH
            )));
        }

        let mut result = content.to_string();

        // Collect matches first to avoid borrow issues
        let matches: Vec<(String, String)> = INCLUDE_RE
            .captures_iter(content)
            .map(|cap| (cap[0].to_string(), cap[1].trim().to_string()))
            .collect();

        for (full_match, include_path) in matches {
            let included_content = self.read(&include_path).map_err(|_| {
                AttestError::Prompt(format!("Included file not found (referenced as @include({}))", include_path))
            })?;
            let processed = self.process_includes(&included_content, depth + 1)?;
            result = result.replace(&full_match, processed.trim_end());
        }

        Ok(result)
    }

    /// Check if a prompt template exists, on disk or embedded.
    pub fn has_prompt(&self, prompt_name: &str) -> bool {
        self.read(&format!("{}.txt", prompt_name)).is_ok()
    }

    pub fn override_dir(&self) -> Option<&Path> {
        self.override_dir.as_deref()
    }
}
