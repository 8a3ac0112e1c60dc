use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use tracing::info;
use crate::api::auth::Tenant;
use crate::api::models::{CompleteResponse, DeleteResponse};
use crate::api::AppState;
use crate::errors::AttestError;

pub async fn complete(
    State(state): State<AppState>,
    Tenant(tenant_id): Tenant,
    Path(audit_id): Path<i64>,
) -> Result<Json<CompleteResponse>, AttestError> {
    state.db.require_audit(tenant_id, audit_id)?;
    let completed = state.db.complete_audit(tenant_id, audit_id, Utc::now())?;
    info!(tenant_id, audit_id, completed, "Audit completion requested");
    Ok(Json(CompleteResponse { audit_id, completed }))
}

/// Cancel the audit's background jobs, then delete it with everything it owns.
pub async fn delete_audit(
    State(state): State<AppState>,
    Tenant(tenant_id): Tenant,
    Path(audit_id): Path<i64>,
) -> Result<Json<DeleteResponse>, AttestError> {
    state.db.require_audit(tenant_id, audit_id)?;
    let jobs_cancelled = state.jobs.cancel_audit(audit_id);
    let deleted = state.db.delete_audit(tenant_id, audit_id)?;
    if !deleted {
        return Err(AttestError::NotFound(format!("audit {}", audit_id)));
    }
    info!(tenant_id, audit_id, jobs_cancelled, "Audit deleted");
    Ok(Json(DeleteResponse { audit_id, deleted, jobs_cancelled }))
}
