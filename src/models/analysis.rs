use serde::{Deserialize, Serialize};

/// Verdict attached to a (document, requirement) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComplianceStatus {
    Compliant,
    PartiallyCompliant,
    NonCompliant,
    /// Neutral fallback when the model output cannot be trusted.
    RequiresReview,
}

impl ComplianceStatus {
    pub const COMPLIANT_THRESHOLD: f64 = 0.7;
    pub const PARTIAL_THRESHOLD: f64 = 0.4;

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Compliant => "compliant",
            Self::PartiallyCompliant => "partially_compliant",
            Self::NonCompliant => "non_compliant",
            Self::RequiresReview => "requires_review",
        }
    }

    /// Collapse the synonyms models and upstream systems use into the
    /// canonical enum. Returns `None` for labels we do not recognise.
    pub fn from_alias(raw: &str) -> Option<Self> {
        let key: String = raw
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == '-' || c == ' ' { '_' } else { c })
            .collect();
        match key.as_str() {
            "compliant" | "complied" | "fully_compliant" | "fully_complied" | "met" | "pass"
            | "passed" | "yes" | "satisfied" => Some(Self::Compliant),
            "partially_compliant" | "partial" | "partially_complied" | "partially_met"
            | "partial_compliance" | "partially" => Some(Self::PartiallyCompliant),
            "non_compliant" | "noncompliant" | "not_compliant" | "not_complied" | "non_complied"
            | "not_met" | "fail" | "failed" | "no" | "unsatisfied" => Some(Self::NonCompliant),
            "requires_review" | "needs_review" | "review" | "review_required" | "unknown"
            | "insufficient_evidence" | "inconclusive" | "not_applicable" | "n/a" => {
                Some(Self::RequiresReview)
            }
            _ => None,
        }
    }

    /// Status implied by a score in [0, 1].
    pub fn from_score(score: f64) -> Self {
        if score >= Self::COMPLIANT_THRESHOLD {
            Self::Compliant
        } else if score >= Self::PARTIAL_THRESHOLD {
            Self::PartiallyCompliant
        } else {
            Self::NonCompliant
        }
    }

    /// Score assumed when the model gave a label but no score.
    pub fn default_score(&self) -> f64 {
        match self {
            Self::Compliant => 0.85,
            Self::PartiallyCompliant => 0.5,
            Self::NonCompliant => 0.2,
            Self::RequiresReview => 0.0,
        }
    }

    /// Lower is more conservative; used to break aggregation ties.
    pub fn conservatism_rank(&self) -> u8 {
        match self {
            Self::NonCompliant => 0,
            Self::PartiallyCompliant => 1,
            Self::RequiresReview => 2,
            Self::Compliant => 3,
        }
    }

    /// Checklist `complied` code: 2 fully, 1 partial, 0 otherwise.
    pub fn checklist_code(&self) -> u8 {
        match self {
            Self::Compliant => 2,
            Self::PartiallyCompliant => 1,
            Self::NonCompliant | Self::RequiresReview => 0,
        }
    }
}

impl std::fmt::Display for ComplianceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }

    pub fn from_alias(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "low" | "minor" | "minimal" => Some(Self::Low),
            "medium" | "moderate" | "med" => Some(Self::Medium),
            "high" | "critical" | "severe" | "major" => Some(Self::High),
            _ => None,
        }
    }

    /// Risk implied by a compliance status when the model omitted it.
    pub fn for_status(status: ComplianceStatus) -> Self {
        match status {
            ComplianceStatus::Compliant => Self::Low,
            ComplianceStatus::PartiallyCompliant | ComplianceStatus::RequiresReview => Self::Medium,
            ComplianceStatus::NonCompliant => Self::High,
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized per-requirement analysis produced by the evaluation engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceAnalysis {
    pub compliance_id: i64,
    pub title: String,
    pub status: ComplianceStatus,
    /// Always within [0, 1].
    pub score: f64,
    pub risk_level: RiskLevel,
    pub evidence_snippets: Vec<String>,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub missing: Vec<String>,
    pub recommendations: Vec<String>,
    /// Model-reported confidence in [0, 1], when it gave one.
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_note: Option<String>,
}

impl ComplianceAnalysis {
    /// Fallback verdict used when the model could not produce a usable answer.
    pub fn requires_review(compliance_id: i64, title: &str, note: &str) -> Self {
        Self {
            compliance_id,
            title: title.to_string(),
            status: ComplianceStatus::RequiresReview,
            score: 0.0,
            risk_level: RiskLevel::Medium,
            evidence_snippets: Vec::new(),
            strengths: Vec::new(),
            weaknesses: Vec::new(),
            missing: Vec::new(),
            recommendations: vec!["Manual review required".to_string()],
            confidence: Some(0.0),
            processing_note: Some(note.to_string()),
        }
    }

    /// Confidence used for aggregation: the reported confidence, else the score.
    pub fn effective_confidence(&self) -> f64 {
        self.confidence.unwrap_or(self.score).clamp(0.0, 1.0)
    }

    pub fn is_fallback(&self) -> bool {
        self.processing_note.is_some() && self.status == ComplianceStatus::RequiresReview
    }
}
