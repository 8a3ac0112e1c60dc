use axum::{extract::State, Json};
use serde_json::{json, Value};
use crate::api::AppState;

pub async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let analyzer = state.engine.analyzer();
    Json(json!({
        "status": "healthy",
        "service": "attest",
        "version": env!("CARGO_PKG_VERSION"),
        "build_timestamp": option_env!("BUILD_TIMESTAMP").unwrap_or("unknown"),
        "git_hash": option_env!("GIT_HASH").unwrap_or("unknown"),
        "llm": {
            "provider": analyzer.llm().provider_name(),
            "model": analyzer.llm().model_name(),
        },
        "active_audit_jobs": state.jobs.active_audits(),
    }))
}
