mod common;

use std::collections::HashMap;
use serde_json::json;
use attest::errors::AttestError;
use attest::extract::TextExtractor;
use attest::models::{AuditStatus, NewAudit, NewCompliance, RiskLevel};
use attest::prompts::PromptLoader;
use attest::sebi::accuracy::{ConsistencyStatus, MatchStatus};
use attest::sebi::timeliness::BreachSeverity;
use attest::sebi::{Check, ExternalSignals, SebiAuditor, UseCase};
use common::{ymd, Fixture, ScriptedProvider, Verdict, TENANT};

fn auditor(fx: &Fixture, provider: std::sync::Arc<ScriptedProvider>) -> SebiAuditor {
    let settings = Fixture::settings(5);
    SebiAuditor::new(
        fx.db.clone(),
        Fixture::llm(provider),
        PromptLoader::new(None),
        TextExtractor::new(fx.media.path(), &settings),
    )
}

fn sebi_framework(fx: &Fixture) -> i64 {
    let (framework_id, _) = fx.framework("SEBI LODR", &[("Results filed within 45 days", "High", true)]);
    fx.db.set_framework_sebi_enabled(TENANT, framework_id, true).unwrap();
    framework_id
}

fn filed_audit(fx: &Fixture, framework_id: i64, title: &str, due: chrono::DateTime<chrono::Utc>, filed: chrono::DateTime<chrono::Utc>) -> i64 {
    let mut audit = NewAudit::new(framework_id, title, due);
    audit.status = AuditStatus::Completed;
    audit.completion_date = Some(filed);
    fx.db.insert_audit(TENANT, &audit).unwrap()
}

fn no_llm() -> std::sync::Arc<ScriptedProvider> {
    ScriptedProvider::new(|_| Err(AttestError::LLMUnavailable("not expected".into())))
}

#[tokio::test]
async fn test_financial_results_filed_five_days_late() {
    let fx = Fixture::new();
    let framework_id = sebi_framework(&fx);
    let audit_id = filed_audit(&fx, framework_id, "Q1 Financial Results", ymd(2025, 1, 1), ymd(2025, 2, 20));

    let response = auditor(&fx, no_llm()).timeliness(TENANT, audit_id).await.unwrap();
    let report = response.report().unwrap();
    assert!(report.filing.sla_breach);
    assert_eq!(report.filing.days_delayed, 5);
    assert_eq!(report.filing.severity, Some(BreachSeverity::Medium));
    assert_eq!(report.aggregate.late, 1);
    assert_eq!(report.aggregate.on_time, 0);
    assert_eq!(report.aggregate.avg_delay_days, 5.0);
    assert_eq!(report.aggregate.violations.len(), 1);

    let value = serde_json::to_value(&response).unwrap();
    assert_eq!(value["enabled"], true);
    assert_eq!(value["sla_breach"], true);
}

#[tokio::test]
async fn test_reports_disabled_without_activation() {
    let fx = Fixture::new();
    let (framework_id, _) = fx.framework("ISO 27001", &[("Access reviews", "Medium", false)]);
    let audit_id = fx.audit(framework_id, "Annual review");
    let auditor = auditor(&fx, no_llm());

    let value = auditor.report_json(TENANT, audit_id, "risk-score").await.unwrap();
    assert_eq!(value, json!({
        "enabled": false,
        "framework_id": framework_id,
        "message": "SEBI auditor is not enabled for this framework",
    }));

    let enabled = auditor.enable(TENANT, framework_id).unwrap();
    assert!(enabled.enabled);
    assert!(auditor.risk_score(TENANT, audit_id).await.unwrap().is_enabled());
}

#[tokio::test]
async fn test_compliance_flag_activates_framework() {
    let fx = Fixture::new();
    let (framework_id, _) = fx.framework("Exchange circulars", &[]);
    let policy_id = fx.db.insert_policy(TENANT, framework_id, "Disclosures").unwrap();
    let sub_policy_id = fx.db.insert_sub_policy(TENANT, policy_id, "Material events").unwrap();
    let mut c = NewCompliance::new(sub_policy_id, "Reg 30 disclosure", "Material events disclosed within 24 hours.");
    c.ai_bse_enabled = true;
    fx.db.insert_compliance(TENANT, &c).unwrap();
    let audit_id = fx.audit(framework_id, "Reg 30 material event");

    assert!(auditor(&fx, no_llm()).patterns(TENANT, audit_id).await.unwrap().is_enabled());
}

#[tokio::test]
async fn test_unknown_report_and_audit() {
    let fx = Fixture::new();
    let framework_id = sebi_framework(&fx);
    let audit_id = fx.audit(framework_id, "Shareholding pattern");
    let auditor = auditor(&fx, no_llm());
    assert!(matches!(auditor.report_json(TENANT, audit_id, "peer-review").await, Err(AttestError::InvalidInput(_))));
    assert!(matches!(auditor.timeliness(TENANT, 999).await, Err(AttestError::NotFound(_))));
}

#[tokio::test]
async fn test_filing_accuracy_combines_checks() {
    let fx = Fixture::new();
    let framework_id = sebi_framework(&fx);
    let audit_id = fx.audit(framework_id, "Q4 Financial Results");
    // within 120 days but without evidence, so the pair is skipped
    fx.audit(framework_id, "Q3 Financial Results");
    let first = fx
        .document(audit_id, "results.txt", "Revenue for the quarter rose 12% to 480 crore. Net profit was 52 crore.", &[])
        .await;
    fx.document(audit_id, "press-release.txt", "Revenue for the quarter rose 10% to 480 crore. Net profit was 52 crore.", &[])
        .await;

    let provider = ScriptedProvider::new(|prompt| {
        if prompt.starts_with("Two evidence documents") {
            Ok(json!({"match_score": 0.6, "status": "partial match", "discrepancies": ["Revenue growth 12% vs 10%"]}).to_string())
        } else if prompt.starts_with("Review the narrative") {
            Ok(json!({"inconsistencies": [], "summary": "Narrative is internally consistent"}).to_string())
        } else {
            Err(AttestError::LLMParseFailed(format!("unexpected prompt: {}", &prompt[..40.min(prompt.len())])))
        }
    });
    let response = auditor(&fx, provider.clone()).filing_accuracy(TENANT, audit_id, None).await.unwrap();
    let report = response.report().unwrap();

    assert_eq!(report.document_id, Some(first));
    assert!(report.cross_period.is_empty());
    assert_eq!(report.cross_document.len(), 1);
    let comparison = report.cross_document[0].done().unwrap();
    assert_eq!(comparison.status, MatchStatus::PartialMatch);
    assert!(comparison.textual_similarity > 0.0);
    assert_eq!(report.total_checks, 2);
    assert_eq!(report.issues_found, 1);
    assert_eq!(report.accuracy_score, Some(50.0));
    assert!(report.arithmetic_checks.is_empty());
    assert_eq!(provider.call_count(), 2);
}

#[tokio::test]
async fn test_filing_accuracy_degrades_when_model_fails() {
    let fx = Fixture::new();
    let framework_id = sebi_framework(&fx);
    let earlier = filed_audit(&fx, framework_id, "Q3 Financial Results", ymd(2025, 2, 14), ymd(2025, 2, 10));
    let later = filed_audit(&fx, framework_id, "Q4 Financial Results", ymd(2025, 5, 30), ymd(2025, 5, 28));
    fx.document(earlier, "q3.txt", "Revenue for the quarter was 430 crore with net profit of 47 crore.", &[]).await;
    fx.document(later, "q4.txt", "Revenue for the quarter was 480 crore with net profit of 52 crore.", &[]).await;

    let provider = ScriptedProvider::new(|_| Err(AttestError::LLMUnavailable("model offline".into())));
    let response = auditor(&fx, provider).filing_accuracy(TENANT, later, None).await.unwrap();
    let report = response.report().unwrap();

    assert_eq!(report.cross_period.len(), 1);
    assert!(report.cross_period[0].is_failed());
    assert!(matches!(report.narrative, Some(Check::Failed { .. })));
    assert_eq!(report.total_checks, 0);
    assert_eq!(report.accuracy_score, None);

    let value = serde_json::to_value(&response).unwrap();
    assert_eq!(value["cross_period"][0]["status"], "analysis_failed");
}

#[tokio::test]
async fn test_cross_period_consistency() {
    let fx = Fixture::new();
    let framework_id = sebi_framework(&fx);
    let earlier = filed_audit(&fx, framework_id, "Q3 Financial Results", ymd(2025, 2, 14), ymd(2025, 2, 10));
    let later = filed_audit(&fx, framework_id, "Q4 Financial Results", ymd(2025, 5, 30), ymd(2025, 5, 28));
    fx.document(earlier, "q3.txt", "Revenue for the quarter was 430 crore with net profit of 47 crore.", &[]).await;

    let provider = ScriptedProvider::new(|prompt| {
        if prompt.starts_with("Compare two periodic filings") {
            Ok(json!({"consistency_score": 92, "status": "consistent", "issues": []}).to_string())
        } else {
            Err(AttestError::LLMUnavailable("only cross-period expected".into()))
        }
    });
    // the later audit has no documents of its own
    let response = auditor(&fx, provider.clone()).filing_accuracy(TENANT, later, None).await.unwrap();
    let report = response.report().unwrap();
    assert!(report.cross_period.is_empty());
    assert!(report.narrative.is_none());
    assert_eq!(provider.call_count(), 0);

    fx.document(later, "q4.txt", "Revenue for the quarter was 480 crore with net profit of 52 crore.", &[]).await;
    let response = auditor(&fx, provider).filing_accuracy(TENANT, later, None).await.unwrap();
    let report = response.report().unwrap();
    let pair = report.cross_period[0].done().unwrap();
    assert_eq!((pair.earlier_audit_id, pair.later_audit_id), (earlier, later));
    assert_eq!(pair.status, ConsistencyStatus::Consistent);
    assert_eq!(pair.consistency_score, 0.92);
}

#[tokio::test]
async fn test_risk_score_uses_history_and_signals() {
    let fx = Fixture::new();
    let framework_id = sebi_framework(&fx);
    let audit_id = filed_audit(&fx, framework_id, "Q1 Financial Results", ymd(2025, 1, 1), ymd(2025, 1, 20));

    let signals = ExternalSignals { insider_trade_anomalies: Some(1.0), ..Default::default() };
    let response = auditor(&fx, no_llm()).with_signals(signals).risk_score(TENANT, audit_id).await.unwrap();
    let report = response.report().unwrap();
    // one late filing (0.1 * 0.30), one gap (1/3 * 0.20), insider anomalies (1.0 * 0.15)
    assert_eq!(report.risk_score, 24.7);
    assert_eq!(report.risk_level, RiskLevel::Low);
    assert_eq!(report.high_risk_factors, 1);
}

#[tokio::test]
async fn test_last_day_filings_pattern() {
    let fx = Fixture::new();
    let framework_id = sebi_framework(&fx);
    let mut ids = Vec::new();
    for (i, month) in [1u32, 4, 7].iter().enumerate() {
        let due = ymd(2025, *month, 15);
        ids.push(filed_audit(&fx, framework_id, &format!("Shareholding pattern {}", i + 1), due, due));
    }

    let provider = ScriptedProvider::new(|prompt| {
        assert!(prompt.contains("Total filings reviewed: 3"));
        Ok(json!({"risk_level": "high", "compliance_culture_score": "35", "observations": ["Every filing on the deadline"]}).to_string())
    });
    let response = auditor(&fx, provider).patterns(TENANT, ids[0]).await.unwrap();
    let report = response.report().unwrap();
    assert_eq!(report.pattern_types, vec!["frequent_last_day_filings"]);
    assert_eq!(report.patterns_detected, 1);
    let assessment = report.last_day_filings.assessment.as_ref().unwrap().done().unwrap();
    assert_eq!(assessment.risk_level, RiskLevel::High);
    assert_eq!(assessment.compliance_culture_score, 35);
    assert_eq!(report.event_silence["status"], "requires_external_data");
}

#[tokio::test]
async fn test_evidence_pack_and_dashboard_after_evaluation() {
    let fx = Fixture::new();
    let (framework_id, ids) = fx.framework(
        "SEBI LODR",
        &[("Results filed within 45 days", "High", true), ("Board approval recorded", "Medium", false)],
    );
    fx.db.set_framework_sebi_enabled(TENANT, framework_id, true).unwrap();
    let audit_id = fx.audit(framework_id, "Q4 Financial Results");
    let document_id = fx
        .document(audit_id, "results.txt", "Board approved the audited results on 28 May. Filing with the exchange is pending.", &[])
        .await;

    let provider = ScriptedProvider::verdicts(HashMap::from([
        (ids[0], Verdict::new("non_compliant", 0.1, "high")),
        (ids[1], Verdict::new("compliant", 0.9, "low").snippet("Board approved the audited results on 28 May")),
    ]));
    fx.engine(provider, 5).evaluate_document(TENANT, audit_id, document_id, None).await.unwrap();

    let auditor = auditor(&fx, no_llm());
    let inspection = auditor.evidence_pack(TENANT, audit_id, UseCase::SebiInspection).await.unwrap();
    let pack = inspection.report().unwrap();
    assert_eq!(pack.summary.clauses, 2);
    assert_eq!(pack.summary.non_compliant, 1);
    let board = pack.clause_wise_evidence.iter().find(|c| c.compliance_id == ids[1]).unwrap();
    assert_eq!(board.evidence, vec!["Board approved the audited results on 28 May".to_string()]);
    assert_eq!(board.documents, vec!["results.txt".to_string()]);
    assert!(pack.timestamped_proofs.iter().any(|p| p.content_sha256.is_some()));
    assert!(pack.disclosure_timeline.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));

    let enforcement = auditor.evidence_pack(TENANT, audit_id, UseCase::Enforcement).await.unwrap();
    assert_eq!(enforcement.report().unwrap().summary.clauses, 1);

    let dashboard = auditor.dashboard(TENANT, audit_id).await.unwrap();
    let dashboard = dashboard.report().unwrap();
    assert_eq!(dashboard.total_audits, 1);
    assert_eq!(dashboard.evidence_documents, 1);
    assert_eq!(dashboard.findings_by_check.get("0"), Some(&1));
    assert_eq!(dashboard.findings_by_check.get("2"), Some(&1));
}
