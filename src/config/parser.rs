use std::path::Path;
use crate::errors::AttestError;
use super::types::AttestConfig;
use super::schema::CONFIG_SCHEMA;
use tracing::{debug, warn};

pub async fn parse_config(path: &Path) -> Result<AttestConfig, AttestError> {
    if !path.exists() {
        return Err(AttestError::Config(format!("Config file not found: {}", path.display())));
    }

    let metadata = tokio::fs::metadata(path).await?;
    if metadata.len() > 1_048_576 {
        return Err(AttestError::Config("Config file exceeds 1MB limit".into()));
    }

    let content = tokio::fs::read_to_string(path).await?;
    parse_config_str(&content)
}

/// Parse the config file when given, otherwise fall back to defaults.
pub async fn load_or_default(path: Option<&Path>) -> Result<AttestConfig, AttestError> {
    match path {
        Some(p) => parse_config(p).await,
        None => {
            debug!("No config file given, using defaults");
            Ok(AttestConfig::default())
        }
    }
}

pub fn parse_config_str(content: &str) -> Result<AttestConfig, AttestError> {
    let yaml: serde_yaml::Value = serde_yaml::from_str(content)?;
    if yaml.is_null() {
        return Ok(AttestConfig::default());
    }

    // JSON Schema validation
    validate_schema(&yaml)?;

    // Parse into typed config
    let config: AttestConfig = serde_yaml::from_value(yaml)?;

    validate_semantics(&config)?;

    Ok(config)
}

/// Validate config against the JSON schema for structural correctness.
fn validate_schema(yaml: &serde_yaml::Value) -> Result<(), AttestError> {
    // Convert YAML value to JSON for schema validation
    let json_value = serde_json::to_value(yaml)
        .map_err(|e| AttestError::Config(format!("Config conversion error: {}", e)))?;

    let compiled = jsonschema::JSONSchema::compile(&CONFIG_SCHEMA)
        .map_err(|e| AttestError::Config(format!("Schema compilation error: {}", e)))?;

    let result = compiled.validate(&json_value);
    if let Err(errors) = result {
        // Advisory: typed parsing below is the hard gate
        for e in errors {
            warn!(validation_error = %format!("{} at {}", e, e.instance_path), "Config schema warning");
        }
    }

    Ok(())
}

fn validate_semantics(config: &AttestConfig) -> Result<(), AttestError> {
    let eval = &config.evaluation;
    if eval.batch_size == 0 {
        return Err(AttestError::Config("evaluation.batch_size must be at least 1".into()));
    }
    if eval.text_char_cap == 0 || eval.cross_document_char_cap == 0 {
        return Err(AttestError::Config("evaluation character caps must be positive".into()));
    }
    if eval.max_list_items == 0 || eval.max_item_chars == 0 {
        return Err(AttestError::Config("evaluation list limits must be positive".into()));
    }
    if !(0.0..=2.0).contains(&config.llm.temperature) {
        return Err(AttestError::Config(format!(
            "llm.temperature must be within [0, 2], got {}",
            config.llm.temperature
        )));
    }
    if config.llm.timeout_secs == 0 {
        return Err(AttestError::Config("llm.timeout_secs must be positive".into()));
    }
    if config.fanout.max_requirements_per_framework == 0 {
        return Err(AttestError::Config("fanout.max_requirements_per_framework must be positive".into()));
    }
    if config.jobs.max_concurrent == 0 {
        return Err(AttestError::Config("jobs.max_concurrent must be positive".into()));
    }
    if eval.text_char_cap > eval.cross_document_char_cap {
        warn!("evaluation.text_char_cap exceeds cross_document_char_cap");
    }
    if let Some(url) = &config.notifications.webhook_url {
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(AttestError::Config(format!("notifications.webhook_url must be http(s): {}", url)));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_yields_defaults() {
        let config = parse_config_str("").unwrap();
        assert_eq!(config, AttestConfig::default());
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let err = parse_config_str("evaluation:\n  batch_size: 0\n").unwrap_err();
        assert!(matches!(err, AttestError::Config(_)));
    }

    #[test]
    fn test_temperature_out_of_range_rejected() {
        assert!(parse_config_str("llm:\n  temperature: 3.5\n").is_err());
    }

    #[test]
    fn test_non_http_webhook_rejected() {
        assert!(parse_config_str("notifications:\n  webhook_url: ftp://example.com\n").is_err());
    }

    #[test]
    fn test_full_config_parses() {
        let yaml = r#"
llm:
  provider: openai_compatible
  base_url: http://localhost:8000/v1
  model: mistral
  api_key: $LLM_KEY
evaluation:
  batch_size: 10
fanout:
  auto_on_upload: true
jobs:
  max_concurrent: 2
storage:
  media_root: /var/lib/attest/media
"#;
        let config = parse_config_str(yaml).unwrap();
        assert_eq!(config.llm.provider, crate::config::ProviderKind::OpenaiCompatible);
        assert_eq!(config.llm.api_key.as_deref(), Some("$LLM_KEY"));
        assert_eq!(config.evaluation.batch_size, 10);
        assert!(config.fanout.auto_on_upload);
        assert_eq!(config.jobs.max_concurrent, 2);
    }

    #[tokio::test]
    async fn test_missing_file_is_config_error() {
        let err = parse_config(Path::new("/nonexistent/attest.yaml")).await.unwrap_err();
        assert!(matches!(err, AttestError::Config(_)));
    }
}
