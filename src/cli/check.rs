use std::time::Instant;
use tracing::info;
use crate::cli::commands::{CheckArgs, FanoutArgs, GlobalArgs};
use crate::cli::output;
use crate::config::AttestConfig;
use crate::db::Database;
use crate::errors::AttestError;
use crate::evaluation::EvaluationEngine;
use crate::fanout::{FanoutRequest, FanoutService};
use crate::utils::formatting::format_duration;

pub(crate) fn open_engine(config: &AttestConfig) -> Result<EvaluationEngine, AttestError> {
    let db = Database::new(config.database.as_deref().unwrap_or(crate::api::DEFAULT_DB_PATH))?;
    EvaluationEngine::from_config(db, config)
}

pub async fn handle_check(args: CheckArgs, global: &GlobalArgs) -> Result<(), AttestError> {
    let config = global.load_config().await?;
    let engine = open_engine(&config)?;
    let ids = (!args.compliance.is_empty()).then_some(args.compliance.as_slice());

    let started = Instant::now();
    let verdict = engine.evaluate_document(args.tenant, args.audit, args.document, ids).await?;
    info!(
        audit_id = args.audit,
        document_id = args.document,
        status = verdict.compliance_status.as_str(),
        elapsed = %format_duration(started.elapsed().as_millis() as u64),
        "Check finished"
    );

    if args.json {
        output::print_json(&verdict)
    } else {
        output::print_verdict(&verdict);
        Ok(())
    }
}

pub async fn handle_fanout(args: FanoutArgs, global: &GlobalArgs) -> Result<(), AttestError> {
    let config = global.load_config().await?;
    let fanout = FanoutService::new(open_engine(&config)?, &config.fanout);
    let request = FanoutRequest {
        document_id: args.document,
        primary_framework_id: args.framework,
        audit_id: args.audit,
        target_framework_ids: (!args.targets.is_empty()).then_some(args.targets),
    };

    let report = fanout.run(args.tenant, &request).await?;
    if args.json {
        output::print_json(&report)
    } else {
        output::print_fanout(&report);
        Ok(())
    }
}
