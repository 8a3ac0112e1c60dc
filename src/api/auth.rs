use axum::{
    extract::{FromRequestParts, Request},
    http::{request::Parts, StatusCode},
    middleware::Next,
    response::Response,
    Json,
};
use serde_json::json;
use crate::errors::AttestError;

pub const TENANT_HEADER: &str = "x-tenant-id";

/// Tenant every read and write of the request is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tenant(pub i64);

impl<S> FromRequestParts<S> for Tenant
where
    S: Send + Sync,
{
    type Rejection = AttestError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(TENANT_HEADER)
            .ok_or_else(|| AttestError::InvalidInput("missing X-Tenant-Id header".into()))?
            .to_str()
            .map_err(|_| AttestError::InvalidInput("X-Tenant-Id must be ASCII".into()))?;
        match raw.trim().parse::<i64>() {
            Ok(id) if id > 0 => Ok(Tenant(id)),
            _ => Err(AttestError::InvalidInput(format!("invalid tenant id: {}", raw))),
        }
    }
}

pub async fn api_auth_middleware(
    request: Request,
    next: Next,
) -> Result<Response, (StatusCode, Json<serde_json::Value>)> {
    // Check for API token if ATTEST_API_TOKEN is set
    if let Ok(expected_token) = std::env::var("ATTEST_API_TOKEN") {
        if !expected_token.is_empty() {
            let auth_header = request.headers()
                .get("Authorization")
                .and_then(|v| v.to_str().ok());

            match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
                Some(token) if token == expected_token => {}
                Some(_) => {
                    return Err((StatusCode::UNAUTHORIZED, Json(json!({"error": "Invalid API token"}))));
                }
                None => {
                    return Err((StatusCode::UNAUTHORIZED, Json(json!({"error": "Missing Authorization header"}))));
                }
            }
        }
    }

    Ok(next.run(request).await)
}
