use super::types::AttestError;

#[derive(Debug, Clone)]
pub struct ErrorClassification {
    pub error_type: &'static str,
    pub retryable: bool,
}

impl AttestError {
    /// Classify this error to determine its type and whether it can be retried.
    pub fn classify(&self) -> ErrorClassification {
        match self {
            // Retryable errors
            AttestError::LLMUnavailable(_) => ErrorClassification {
                error_type: "LLMUnavailable",
                retryable: true,
            },
            AttestError::LLMParseFailed(_) => ErrorClassification {
                error_type: "LLMParseFailed",
                retryable: true,
            },
            AttestError::PersistenceConflict(_) => ErrorClassification {
                error_type: "PersistenceConflict",
                retryable: true,
            },
            AttestError::Network(_) => ErrorClassification {
                error_type: "NetworkError",
                retryable: true,
            },
            AttestError::Io(_) => ErrorClassification {
                error_type: "IoError",
                retryable: true,
            },
            AttestError::Database(_) => ErrorClassification {
                error_type: "DatabaseError",
                retryable: true,
            },

            // Non-retryable errors
            AttestError::InvalidInput(_) => ErrorClassification {
                error_type: "InvalidInput",
                retryable: false,
            },
            AttestError::NotFound(_) => ErrorClassification {
                error_type: "NotFound",
                retryable: false,
            },
            AttestError::ExtractionFailed(_) => ErrorClassification {
                error_type: "ExtractionFailed",
                retryable: false,
            },
            AttestError::Config(_) => ErrorClassification {
                error_type: "ConfigError",
                retryable: false,
            },
            AttestError::Prompt(_) => ErrorClassification {
                error_type: "PromptError",
                retryable: false,
            },
            AttestError::Json(_) => ErrorClassification {
                error_type: "JsonError",
                retryable: false,
            },
            AttestError::Yaml(_) => ErrorClassification {
                error_type: "YamlError",
                retryable: false,
            },
            AttestError::Internal(_) => ErrorClassification {
                error_type: "InternalError",
                retryable: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_llm_unavailable_is_retryable() {
        let err = AttestError::LLMUnavailable("connection refused".into());
        let class = err.classify();
        assert!(class.retryable);
        assert_eq!(class.error_type, "LLMUnavailable");
    }

    #[test]
    fn test_invalid_input_not_retryable() {
        let err = AttestError::InvalidInput("missing audit_id".into());
        let class = err.classify();
        assert!(!class.retryable);
        assert_eq!(class.error_type, "InvalidInput");
    }

    #[test]
    fn test_not_found_not_retryable() {
        assert!(!AttestError::NotFound("audit 7".into()).classify().retryable);
    }

    #[test]
    fn test_extraction_failed_not_retryable() {
        assert!(!AttestError::ExtractionFailed("empty".into()).classify().retryable);
    }

    #[test]
    fn test_persistence_conflict_retryable() {
        assert!(AttestError::PersistenceConflict("busy".into()).classify().retryable);
    }

    #[test]
    fn test_network_retryable() {
        assert!(AttestError::Network("webhook down".into()).classify().retryable);
    }

    #[test]
    fn test_config_not_retryable() {
        assert!(!AttestError::Config("bad batch size".into()).classify().retryable);
    }
}
