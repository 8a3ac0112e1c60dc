pub mod aggregate;
pub mod analyzer;
pub mod engine;
pub mod normalize;

pub use aggregate::{aggregate, Aggregate};
pub use analyzer::{AnalysisTarget, BatchAnalyzer};
pub use engine::EvaluationEngine;
pub use normalize::{normalize_analysis, parse_batch_response, ListLimits};
