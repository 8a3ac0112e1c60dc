use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use crate::errors::AttestError;
use crate::models::Audit;
use super::{SebiAuditor, SebiScope};

/// Disclosure categories with a regulatory deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilingType {
    FinancialResults,
    MaterialEvent,
    Shareholding,
    AuditorResignation,
    CorporateGovernance,
    Unclassified,
}

/// Keyword table used when the audit carries no explicit filing type.
/// Checked in order; the first match wins.
const TITLE_KEYWORDS: &[(&str, FilingType)] = &[
    ("auditor resignation", FilingType::AuditorResignation),
    ("resignation of auditor", FilingType::AuditorResignation),
    ("resignation of statutory auditor", FilingType::AuditorResignation),
    ("financial result", FilingType::FinancialResults),
    ("quarterly result", FilingType::FinancialResults),
    ("annual result", FilingType::FinancialResults),
    ("regulation 30", FilingType::MaterialEvent),
    ("reg 30", FilingType::MaterialEvent),
    ("reg-30", FilingType::MaterialEvent),
    ("material event", FilingType::MaterialEvent),
    ("shareholding", FilingType::Shareholding),
    ("corporate governance", FilingType::CorporateGovernance),
];

impl FilingType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "financial_results" | "financial_result" => Some(Self::FinancialResults),
            "material_event" | "material_events" | "reg_30" | "regulation_30" => Some(Self::MaterialEvent),
            "shareholding" | "shareholding_pattern" => Some(Self::Shareholding),
            "auditor_resignation" => Some(Self::AuditorResignation),
            "corporate_governance" => Some(Self::CorporateGovernance),
            _ => None,
        }
    }

    /// Explicit attribute first, then title keywords.
    pub fn for_audit(audit: &Audit) -> Self {
        if let Some(explicit) = audit.filing_type.as_deref().and_then(Self::parse) {
            return explicit;
        }
        let title = audit.title.to_lowercase();
        TITLE_KEYWORDS
            .iter()
            .find(|(keyword, _)| title.contains(keyword))
            .map(|(_, kind)| *kind)
            .unwrap_or(Self::Unclassified)
    }

    pub fn sla(&self) -> Sla {
        match self {
            Self::FinancialResults => Sla::Days(45),
            Self::MaterialEvent => Sla::Hours(24),
            Self::Shareholding => Sla::Days(21),
            Self::AuditorResignation => Sla::SameDay,
            Self::CorporateGovernance | Self::Unclassified => Sla::Unspecified,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sla {
    Days(i64),
    Hours(i64),
    SameDay,
    Unspecified,
}

impl Sla {
    pub fn describe(&self) -> String {
        match self {
            Self::Days(d) => format!("{} days", d),
            Self::Hours(h) => format!("{} hours", h),
            Self::SameDay => "same day".to_string(),
            Self::Unspecified => "not specified".to_string(),
        }
    }

    /// Deadline measured from the audit's due date (the period or event date).
    pub fn deadline(&self, due: DateTime<Utc>) -> Option<DateTime<Utc>> {
        match self {
            Self::Days(d) => Some(due + Duration::days(*d)),
            Self::Hours(h) => Some(due + Duration::hours(*h)),
            Self::SameDay => due
                .date_naive()
                .and_hms_opt(23, 59, 59)
                .map(|end| end.and_utc()),
            Self::Unspecified => None,
        }
    }

    fn is_hourly(&self) -> bool {
        matches!(self, Self::Hours(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreachSeverity {
    Low,
    Medium,
    High,
}

impl BreachSeverity {
    pub fn for_days(days: i64) -> Self {
        if days > 7 {
            Self::High
        } else if days > 3 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn for_hours(hours: i64) -> Self {
        if hours > 48 {
            Self::High
        } else if hours > 24 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// SLA evaluation of a single audit.
#[derive(Debug, Clone, Serialize)]
pub struct FilingTimeliness {
    pub audit_id: i64,
    pub title: String,
    pub filing_type: FilingType,
    pub sla: String,
    pub due_date: DateTime<Utc>,
    pub deadline: Option<DateTime<Utc>>,
    pub completion_date: Option<DateTime<Utc>>,
    /// False while an open filing is still within its deadline.
    pub filed: bool,
    pub sla_breach: bool,
    pub days_delayed: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hours_delayed: Option<i64>,
    pub severity: Option<BreachSeverity>,
}

pub fn evaluate_filing(audit: &Audit, now: DateTime<Utc>) -> FilingTimeliness {
    let filing_type = FilingType::for_audit(audit);
    let sla = filing_type.sla();
    let deadline = sla.deadline(audit.due_date);
    let filed_at = audit.completion_date;

    let mut result = FilingTimeliness {
        audit_id: audit.id,
        title: audit.title.clone(),
        filing_type,
        sla: sla.describe(),
        due_date: audit.due_date,
        deadline,
        completion_date: filed_at,
        filed: filed_at.is_some(),
        sla_breach: false,
        days_delayed: 0,
        hours_delayed: None,
        severity: None,
    };

    let Some(deadline) = deadline else {
        return result;
    };
    // open filings are measured against now
    let measured_at = filed_at.unwrap_or(now);
    if measured_at <= deadline {
        return result;
    }

    let late = measured_at - deadline;
    result.sla_breach = true;
    result.days_delayed = late.num_days();
    if sla.is_hourly() {
        let hours = late.num_hours();
        result.hours_delayed = Some(hours);
        result.severity = Some(BreachSeverity::for_hours(hours));
    } else {
        result.severity = Some(BreachSeverity::for_days(result.days_delayed));
    }
    result
}

/// SLA outcome across every filed audit in the framework.
#[derive(Debug, Clone, Serialize)]
pub struct SlaAggregate {
    pub total_filings: usize,
    /// Filed audits with a defined SLA.
    pub evaluated: usize,
    pub on_time: usize,
    pub late: usize,
    /// Percentage of evaluated filings made on time.
    pub sla_compliance_rate: f64,
    /// Mean delay of late filings.
    pub avg_delay_days: f64,
    pub violations: Vec<String>,
}

const MAX_VIOLATIONS: usize = 10;

pub fn aggregate(audits: &[Audit], now: DateTime<Utc>) -> SlaAggregate {
    let filed: Vec<FilingTimeliness> = audits
        .iter()
        .filter(|a| a.completion_date.is_some())
        .map(|a| evaluate_filing(a, now))
        .filter(|t| t.deadline.is_some())
        .collect();

    let late: Vec<&FilingTimeliness> = filed.iter().filter(|t| t.sla_breach).collect();
    let on_time = filed.len() - late.len();
    let sla_compliance_rate = if filed.is_empty() {
        100.0
    } else {
        round1(on_time as f64 * 100.0 / filed.len() as f64)
    };
    let avg_delay_days = if late.is_empty() {
        0.0
    } else {
        round1(late.iter().map(|t| t.days_delayed as f64).sum::<f64>() / late.len() as f64)
    };
    let violations = late
        .iter()
        .take(MAX_VIOLATIONS)
        .map(|t| match t.hours_delayed {
            Some(h) => format!("{}: {} hours late (SLA {})", t.title, h, t.sla),
            None => format!("{}: {} days late (SLA {})", t.title, t.days_delayed, t.sla),
        })
        .collect();

    SlaAggregate {
        total_filings: audits.len(),
        evaluated: filed.len(),
        on_time,
        late: late.len(),
        sla_compliance_rate,
        avg_delay_days,
        violations,
    }
}

pub(crate) fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

#[derive(Debug, Clone, Serialize)]
pub struct TimelinessReport {
    pub framework_id: i64,
    #[serde(flatten)]
    pub filing: FilingTimeliness,
    pub aggregate: SlaAggregate,
}

pub(crate) fn analyze(auditor: &SebiAuditor, tenant_id: i64, scope: &SebiScope) -> Result<TimelinessReport, AttestError> {
    let now = Utc::now();
    let audits = auditor.db().list_audits_for_framework(tenant_id, scope.framework.id)?;
    Ok(TimelinessReport {
        framework_id: scope.framework.id,
        filing: evaluate_filing(&scope.audit, now),
        aggregate: aggregate(&audits, now),
    })
}
