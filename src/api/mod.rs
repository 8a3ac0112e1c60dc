pub mod auth;
pub mod errors;
pub mod models;
pub mod routes;

use axum::routing::{delete, get, post};
use axum::{middleware, Router};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use crate::config::AttestConfig;
use crate::db::Database;
use crate::errors::AttestError;
use crate::evaluation::EvaluationEngine;
use crate::fanout::FanoutService;
use crate::ingest::{Followups, Ingestor};
use crate::jobs::JobRunner;
use crate::sebi::SebiAuditor;

pub const DEFAULT_DB_PATH: &str = "./data/attest.db";

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub engine: EvaluationEngine,
    pub fanout: FanoutService,
    pub sebi: SebiAuditor,
    pub ingestor: Ingestor,
    pub jobs: JobRunner,
}

impl AppState {
    /// Build the service graph around an existing engine.
    pub fn new(engine: EvaluationEngine, config: &AttestConfig) -> Self {
        let db = engine.db().clone();
        let fanout = FanoutService::new(engine.clone(), &config.fanout);
        let jobs = JobRunner::new(&config.jobs);
        let followups = Followups::new(
            jobs.clone(),
            engine.clone(),
            fanout.clone(),
            config.jobs.auto_check_on_upload,
            config.fanout.auto_on_upload,
        );
        let ingestor = Ingestor::new(db.clone(), &config.storage.media_root).with_followups(followups);
        let sebi = SebiAuditor::from_engine(&engine);
        Self { db, engine, fanout, sebi, ingestor, jobs }
    }

    pub fn from_config(config: &AttestConfig) -> Result<Self, AttestError> {
        let db = Database::new(config.database.as_deref().unwrap_or(DEFAULT_DB_PATH))?;
        let engine = EvaluationEngine::from_config(db, config)?;
        Ok(Self::new(engine, config))
    }
}

pub fn build_router(state: AppState) -> Router {
    let sebi = Router::new()
        .route("/{framework_id}/enable", post(routes::sebi::enable))
        .route("/audit/{audit_id}/filing-accuracy", get(routes::sebi::filing_accuracy).post(routes::sebi::filing_accuracy))
        .route("/audit/{audit_id}/timeliness-sla", get(routes::sebi::timeliness).post(routes::sebi::timeliness))
        .route("/audit/{audit_id}/risk-score", get(routes::sebi::risk_score).post(routes::sebi::risk_score))
        .route("/audit/{audit_id}/patterns", get(routes::sebi::patterns).post(routes::sebi::patterns))
        .route("/audit/{audit_id}/evidence-pack", get(routes::sebi::evidence_pack).post(routes::sebi::evidence_pack))
        .route("/audit/{audit_id}/dashboard", get(routes::sebi::dashboard).post(routes::sebi::dashboard));

    let api = Router::new()
        .route("/audits/{audit_id}/documents", post(routes::documents::upload))
        .route("/audits/{audit_id}/documents/raw", post(routes::documents::upload_raw))
        .route("/audit/{audit_id}/documents/{document_id}/check", post(routes::documents::check))
        .route("/audit/{audit_id}/complete", post(routes::audits::complete))
        .route("/audit/{audit_id}", delete(routes::audits::delete_audit))
        .route("/cross-framework/check", post(routes::fanout::check))
        .nest("/sebi-auditor", sebi)
        .layer(middleware::from_fn(auth::api_auth_middleware));

    Router::new()
        .route("/api/health", get(routes::health::health_check))
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
