use thiserror::Error;

#[derive(Debug, Error)]
pub enum AttestError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Text extraction failed: {0}")]
    ExtractionFailed(String),

    #[error("LLM unavailable: {0}")]
    LLMUnavailable(String),

    #[error("LLM response could not be parsed: {0}")]
    LLMParseFailed(String),

    #[error("Persistence conflict: {0}")]
    PersistenceConflict(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Prompt error: {0}")]
    Prompt(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AttestError {
    /// Map a rusqlite failure into the taxonomy. Busy/locked databases and
    /// unique-key races become `PersistenceConflict`, foreign-key failures
    /// mean the owning row is gone.
    pub fn from_sqlite(context: &str, err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(ref code, ref msg) = err {
            let detail = msg.clone().unwrap_or_else(|| code.to_string());
            match code.code {
                rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked => {
                    return AttestError::PersistenceConflict(format!("{}: {}", context, detail));
                }
                rusqlite::ErrorCode::ConstraintViolation => {
                    if code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY {
                        return AttestError::NotFound(format!("{}: referenced row no longer exists", context));
                    }
                    if code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                        || code.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                    {
                        return AttestError::PersistenceConflict(format!("{}: {}", context, detail));
                    }
                }
                _ => {}
            }
        }
        AttestError::Database(format!("{}: {}", context, err))
    }

    pub fn is_llm_failure(&self) -> bool {
        matches!(self, AttestError::LLMUnavailable(_) | AttestError::LLMParseFailed(_))
    }
}
