//! Tolerant recovery of a JSON object from free-form model output.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use crate::errors::AttestError;

static TRAILING_COMMA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r",\s*([}\]])").unwrap());
static PY_LITERAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"([:\[,]\s*)(True|False|None)(\s*[,}\]])").unwrap());

/// Strip fences, locate the outermost object, sanitize, parse. The result is
/// always a JSON object or an `LLMParseFailed` error.
pub fn extract_json_object(text: &str) -> Result<Value, AttestError> {
    let unfenced = strip_code_fences(text);
    let candidate = outermost_object(&unfenced)
        .or_else(|| outermost_object(text))
        .ok_or_else(|| AttestError::LLMParseFailed(format!(
            "No JSON object found in response: {}",
            preview(text)
        )))?;

    if let Ok(v @ Value::Object(_)) = serde_json::from_str::<Value>(&candidate) {
        return Ok(v);
    }

    let sanitized = sanitize(&candidate);
    match serde_json::from_str::<Value>(&sanitized) {
        Ok(v @ Value::Object(_)) => Ok(v),
        Ok(_) => Err(AttestError::LLMParseFailed("Response JSON is not an object".into())),
        Err(e) => Err(AttestError::LLMParseFailed(format!("{} in: {}", e, preview(&sanitized)))),
    }
}

/// Return the body of the first ``` fenced block, or the input unchanged.
fn strip_code_fences(text: &str) -> String {
    let Some(open) = text.find("```") else {
        return text.to_string();
    };
    let after_marker = open + 3;
    // Skip an info string such as `json`
    let body_start = text[after_marker..]
        .find('\n')
        .map(|off| after_marker + off + 1)
        .unwrap_or(after_marker);
    match text[body_start..].find("```") {
        Some(end) => text[body_start..body_start + end].trim().to_string(),
        None => text[body_start..].trim().to_string(),
    }
}

/// First balanced `{...}` span, honouring string literals and escapes.
fn outermost_object(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(text[start..start + i + 1].to_string());
                }
            }
            _ => {}
        }
    }

    // Unterminated: close what is open and let the parser decide
    if depth > 0 {
        let mut repaired = text[start..].trim_end().to_string();
        if in_string {
            repaired.push('"');
        }
        repaired.push_str(&"}".repeat(depth));
        return Some(repaired);
    }
    None
}

/// Fix the malformations local models produce most often.
fn sanitize(raw: &str) -> String {
    let mut s: String = raw
        .chars()
        .map(|c| match c {
            '\u{201C}' | '\u{201D}' => '"',
            '\u{2018}' | '\u{2019}' => '\'',
            c if c.is_control() && c != '\n' && c != '\t' && c != '\r' => ' ',
            c => c,
        })
        .collect();

    s = TRAILING_COMMA.replace_all(&s, "$1").into_owned();
    // Apply twice: adjacent literals share a delimiter
    for _ in 0..2 {
        s = PY_LITERAL
            .replace_all(&s, |caps: &regex::Captures| {
                let lit = match &caps[2] {
                    "True" => "true",
                    "False" => "false",
                    _ => "null",
                };
                format!("{}{}{}", &caps[1], lit, &caps[3])
            })
            .into_owned();
    }
    escape_raw_newlines_in_strings(&s)
}

/// JSON forbids literal newlines inside strings; models emit them anyway.
fn escape_raw_newlines_in_strings(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_string = false;
    let mut escaped = false;
    for ch in s.chars() {
        if in_string {
            if escaped {
                escaped = false;
                out.push(ch);
                continue;
            }
            match ch {
                '\\' => {
                    escaped = true;
                    out.push(ch);
                }
                '"' => {
                    in_string = false;
                    out.push(ch);
                }
                '\n' => out.push_str("\\n"),
                '\r' => {}
                '\t' => out.push_str("\\t"),
                _ => out.push(ch),
            }
        } else {
            if ch == '"' {
                in_string = true;
            }
            out.push(ch);
        }
    }
    out
}

fn preview(text: &str) -> String {
    let flat: String = text.chars().take(120).collect();
    flat.replace('\n', " ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_object() {
        let v = extract_json_object(r#"{"compliance_analyses": []}"#).unwrap();
        assert!(v["compliance_analyses"].is_array());
    }

    #[test]
    fn test_prose_around_object() {
        let v = extract_json_object("Here is my analysis: {\"score\": 0.8} Hope that helps {not json}").unwrap();
        assert_eq!(v["score"], 0.8);
    }

    #[test]
    fn test_braces_inside_strings_do_not_confuse_depth() {
        let v = extract_json_object(r#"{"quote": "uses {curly} braces", "n": 1}"#).unwrap();
        assert_eq!(v["n"], 1);
    }

    #[test]
    fn test_sanitizer_repairs_common_malformations() {
        let raw = "```json\n{\u{201C}status\u{201D}: \"compliant\", \"flag\": True, \"x\": None, \"list\": [1, 2,],}\n```";
        let v = extract_json_object(raw).unwrap();
        assert_eq!(v["status"], "compliant");
        assert_eq!(v["flag"], true);
        assert!(v["x"].is_null());
        assert_eq!(v["list"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_raw_newline_inside_string() {
        let v = extract_json_object("{\"comment\": \"line one\nline two\"}").unwrap();
        assert_eq!(v["comment"], "line one\nline two");
    }

    #[test]
    fn test_truncated_object_is_closed() {
        let v = extract_json_object(r#"{"a": {"b": 1}"#).unwrap();
        assert_eq!(v["a"]["b"], 1);
    }

    #[test]
    fn test_no_object_is_parse_error() {
        let err = extract_json_object("I cannot help with that.").unwrap_err();
        assert!(matches!(err, AttestError::LLMParseFailed(_)));
    }

    #[test]
    fn test_garbage_object_is_parse_error() {
        assert!(matches!(extract_json_object("{status: compliant???}"), Err(AttestError::LLMParseFailed(_))));
    }
}
