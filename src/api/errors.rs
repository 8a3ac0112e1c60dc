use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use tracing::error;
use crate::errors::AttestError;

impl AttestError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AttestError::InvalidInput(_) | AttestError::Config(_) | AttestError::Json(_) | AttestError::Yaml(_) => {
                StatusCode::BAD_REQUEST
            }
            AttestError::NotFound(_) => StatusCode::NOT_FOUND,
            AttestError::ExtractionFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AttestError::PersistenceConflict(_) => StatusCode::CONFLICT,
            AttestError::LLMUnavailable(_) | AttestError::LLMParseFailed(_) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AttestError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(error = %self, "Request failed");
        }
        (status, Json(json!({"error": self.to_string()}))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(AttestError::NotFound("audit 4".into()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AttestError::InvalidInput("bad".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(AttestError::ExtractionFailed("empty".into()).status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(AttestError::Database("locked".into()).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
