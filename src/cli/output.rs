use console::style;
use serde::Serialize;
use crate::errors::AttestError;
use crate::fanout::FanoutReport;
use crate::models::{ComplianceStatus, DocumentVerdict};

pub fn print_json<T: Serialize>(value: &T) -> Result<(), AttestError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn status_label(status: ComplianceStatus) -> String {
    let text = status.as_str();
    match status {
        ComplianceStatus::Compliant => style(text).green().bold().to_string(),
        ComplianceStatus::PartiallyCompliant => style(text).yellow().bold().to_string(),
        ComplianceStatus::NonCompliant => style(text).red().bold().to_string(),
        ComplianceStatus::RequiresReview => style(text).dim().to_string(),
    }
}

pub fn print_verdict(verdict: &DocumentVerdict) {
    println!(
        "{} {} (confidence {:.0}%)",
        style(format!("Document {}", verdict.document_id)).white().bold(),
        status_label(verdict.compliance_status),
        verdict.confidence * 100.0,
    );
    if let Some(message) = &verdict.message {
        println!("  {}", style(message).dim());
    }
    for analysis in &verdict.analyses {
        println!(
            "  {:>6}  {:<40} {} score {:.2}",
            analysis.compliance_id,
            analysis.title,
            status_label(analysis.status),
            analysis.score,
        );
    }
}

pub fn print_fanout(report: &FanoutReport) {
    println!(
        "{} {} frameworks checked, {} mappings created",
        style(format!("Document {}", report.document_id)).white().bold(),
        report.frameworks_checked,
        report.mappings_created,
    );
    for summary in &report.summaries {
        println!(
            "  {:<30} {} ({} requirements, {}/{}/{}/{} C/PC/NC/RR)",
            summary.framework_name,
            status_label(summary.overall_status),
            summary.requirements_checked,
            summary.compliant,
            summary.partially_compliant,
            summary.non_compliant,
            summary.requires_review,
        );
    }
}
