use std::path::Path;
use crate::cli::check::open_engine;
use crate::cli::commands::{GlobalArgs, SebiArgs};
use crate::cli::output;
use crate::errors::AttestError;
use crate::sebi::{ExternalSignals, SebiAuditor, UseCase, REPORTS};

async fn load_signals(path: &Path) -> Result<ExternalSignals, AttestError> {
    let content = tokio::fs::read_to_string(path).await?;
    Ok(serde_json::from_str(&content)?)
}

pub async fn handle_sebi(args: SebiArgs, global: &GlobalArgs) -> Result<(), AttestError> {
    if !REPORTS.contains(&args.report.as_str()) {
        return Err(AttestError::InvalidInput(format!(
            "Unknown report '{}'; expected one of {}",
            args.report,
            REPORTS.join(", ")
        )));
    }

    let config = global.load_config().await?;
    let engine = open_engine(&config)?;
    let mut auditor = SebiAuditor::from_engine(&engine);
    if let Some(path) = &args.signals {
        auditor = auditor.with_signals(load_signals(Path::new(path)).await?);
    }

    let value = match args.report.as_str() {
        "filing-accuracy" => serde_json::to_value(auditor.filing_accuracy(args.tenant, args.audit, args.document).await?)?,
        "evidence-pack" => {
            let use_case = match args.use_case.as_deref() {
                Some(raw) => raw.parse::<UseCase>()?,
                None => UseCase::default(),
            };
            serde_json::to_value(auditor.evidence_pack(args.tenant, args.audit, use_case).await?)?
        }
        other => auditor.report_json(args.tenant, args.audit, other).await?,
    };
    output::print_json(&value)
}
