use axum::{extract::State, Json};
use crate::api::auth::Tenant;
use crate::api::AppState;
use crate::errors::AttestError;
use crate::fanout::{FanoutReport, FanoutRequest};

pub async fn check(
    State(state): State<AppState>,
    Tenant(tenant_id): Tenant,
    Json(request): Json<FanoutRequest>,
) -> Result<Json<FanoutReport>, AttestError> {
    Ok(Json(state.fanout.run(tenant_id, &request).await?))
}
