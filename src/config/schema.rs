use serde_json::{json, Value};
use std::sync::LazyLock;

pub static CONFIG_SCHEMA: LazyLock<Value> = LazyLock::new(|| {
    json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "type": "object",
        "properties": {
            "llm": {
                "type": "object",
                "properties": {
                    "provider": { "type": "string", "enum": ["ollama", "openai_compatible"] },
                    "base_url": { "type": "string" },
                    "model": { "type": "string" },
                    "api_key": { "type": "string" },
                    "temperature": { "type": "number", "minimum": 0, "maximum": 2 },
                    "max_tokens": { "type": "integer", "minimum": 1 },
                    "timeout_secs": { "type": "integer", "minimum": 1 }
                },
                "additionalProperties": false
            },
            "evaluation": {
                "type": "object",
                "properties": {
                    "batch_size": { "type": "integer", "minimum": 1 },
                    "text_char_cap": { "type": "integer", "minimum": 1 },
                    "cross_document_char_cap": { "type": "integer", "minimum": 1 },
                    "max_list_items": { "type": "integer", "minimum": 1 },
                    "max_item_chars": { "type": "integer", "minimum": 1 },
                    "enrich_findings": { "type": "boolean" }
                },
                "additionalProperties": false
            },
            "fanout": {
                "type": "object",
                "properties": {
                    "max_requirements_per_framework": { "type": "integer", "minimum": 1 },
                    "auto_on_upload": { "type": "boolean" }
                }
            },
            "jobs": {
                "type": "object",
                "properties": {
                    "max_concurrent": { "type": "integer", "minimum": 1 },
                    "timeout_secs": { "type": "integer", "minimum": 1 },
                    "auto_check_on_upload": { "type": "boolean" }
                }
            },
            "storage": {
                "type": "object",
                "properties": {
                    "media_root": { "type": "string" }
                }
            },
            "notifications": {
                "type": "object",
                "properties": {
                    "webhook_url": { "type": "string", "format": "uri" },
                    "channel": { "type": "string" },
                    "recipients": { "type": "array", "items": { "type": "string" } }
                }
            },
            "prompts_dir": { "type": "string" },
            "database": { "type": "string" }
        }
    })
});
