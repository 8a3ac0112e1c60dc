use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use tracing::info;
use crate::api::auth::Tenant;
use crate::api::models::{CheckRequest, RawUploadQuery};
use crate::api::AppState;
use crate::errors::AttestError;
use crate::ingest::UploadOutcome;
use crate::models::{DocumentVerdict, NewEvidence};

/// Attach an artifact that is already in storage.
pub async fn upload(
    State(state): State<AppState>,
    Tenant(tenant_id): Tenant,
    Path(audit_id): Path<i64>,
    Json(evidence): Json<NewEvidence>,
) -> Result<(StatusCode, Json<UploadOutcome>), AttestError> {
    let outcome = state.ingestor.register(tenant_id, audit_id, &evidence).await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

/// Store the request body as a new artifact and attach it.
pub async fn upload_raw(
    State(state): State<AppState>,
    Tenant(tenant_id): Tenant,
    Path(audit_id): Path<i64>,
    Query(query): Query<RawUploadQuery>,
    body: Bytes,
) -> Result<(StatusCode, Json<UploadOutcome>), AttestError> {
    if body.is_empty() {
        return Err(AttestError::InvalidInput("upload body is empty".into()));
    }
    let outcome = state
        .ingestor
        .store_and_register(tenant_id, audit_id, &query.file_name, &body, query.mappings())
        .await?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

pub async fn check(
    State(state): State<AppState>,
    Tenant(tenant_id): Tenant,
    Path((audit_id, document_id)): Path<(i64, i64)>,
    body: Option<Json<CheckRequest>>,
) -> Result<Json<DocumentVerdict>, AttestError> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let ids = request.compliance_ids.filter(|ids| !ids.is_empty());
    info!(tenant_id, audit_id, document_id, requested = ids.as_ref().map_or(0, Vec::len), "Compliance check requested");
    let verdict = state.engine.evaluate_document(tenant_id, audit_id, document_id, ids.as_deref()).await?;
    Ok(Json(verdict))
}
