use axum::{
    extract::{Path, Query, State},
    Json,
};
use crate::api::auth::Tenant;
use crate::api::models::{AccuracyQuery, EvidencePackQuery};
use crate::api::AppState;
use crate::errors::AttestError;
use crate::sebi::accuracy::AccuracyReport;
use crate::sebi::dashboard::Dashboard;
use crate::sebi::evidence_pack::EvidencePack;
use crate::sebi::patterns::PatternReport;
use crate::sebi::risk::RiskReport;
use crate::sebi::timeliness::TimelinessReport;
use crate::sebi::{EnableResult, SebiResponse, UseCase};

type SebiResult<T> = Result<Json<SebiResponse<T>>, AttestError>;

pub async fn enable(
    State(state): State<AppState>,
    Tenant(tenant_id): Tenant,
    Path(framework_id): Path<i64>,
) -> Result<Json<EnableResult>, AttestError> {
    Ok(Json(state.sebi.enable(tenant_id, framework_id)?))
}

pub async fn filing_accuracy(
    State(state): State<AppState>,
    Tenant(tenant_id): Tenant,
    Path(audit_id): Path<i64>,
    Query(query): Query<AccuracyQuery>,
) -> SebiResult<AccuracyReport> {
    Ok(Json(state.sebi.filing_accuracy(tenant_id, audit_id, query.document_id).await?))
}

pub async fn timeliness(
    State(state): State<AppState>,
    Tenant(tenant_id): Tenant,
    Path(audit_id): Path<i64>,
) -> SebiResult<TimelinessReport> {
    Ok(Json(state.sebi.timeliness(tenant_id, audit_id).await?))
}

pub async fn risk_score(
    State(state): State<AppState>,
    Tenant(tenant_id): Tenant,
    Path(audit_id): Path<i64>,
) -> SebiResult<RiskReport> {
    Ok(Json(state.sebi.risk_score(tenant_id, audit_id).await?))
}

pub async fn patterns(
    State(state): State<AppState>,
    Tenant(tenant_id): Tenant,
    Path(audit_id): Path<i64>,
) -> SebiResult<PatternReport> {
    Ok(Json(state.sebi.patterns(tenant_id, audit_id).await?))
}

pub async fn evidence_pack(
    State(state): State<AppState>,
    Tenant(tenant_id): Tenant,
    Path(audit_id): Path<i64>,
    Query(query): Query<EvidencePackQuery>,
) -> SebiResult<EvidencePack> {
    let use_case = match query.use_case.as_deref() {
        Some(raw) => raw.parse::<UseCase>()?,
        None => UseCase::default(),
    };
    Ok(Json(state.sebi.evidence_pack(tenant_id, audit_id, use_case).await?))
}

pub async fn dashboard(
    State(state): State<AppState>,
    Tenant(tenant_id): Tenant,
    Path(audit_id): Path<i64>,
) -> SebiResult<Dashboard> {
    Ok(Json(state.sebi.dashboard(tenant_id, audit_id).await?))
}
