use serde::{Deserialize, Serialize};

/// Market and registry signals computed outside this crate. Missing values
/// score zero and are reported as needing external data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalSignals {
    /// Normalized [0, 1] insider-trading anomaly factor.
    pub insider_trade_anomalies: Option<f64>,
    /// Normalized [0, 1] factor from statutory auditor remarks.
    pub auditor_remarks: Option<f64>,
    /// Material events not disclosed ahead of a price spike.
    pub event_silence: Option<Vec<String>>,
    /// Promoter trades clustered around disclosures.
    pub promoter_trades: Option<Vec<String>>,
}

impl ExternalSignals {
    pub fn factor(value: Option<f64>) -> Option<f64> {
        value.filter(|v| v.is_finite()).map(|v| v.clamp(0.0, 1.0))
    }
}
