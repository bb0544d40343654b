use serde::{Deserialize, Serialize};

use crate::domain::{Granularity, MetricsReport, PeriodComparison};

/// A report together with what happened to the payload on the way in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportOutcome {
    pub granularity: Granularity,
    /// Records found in the payload.
    pub records: usize,
    /// Records that produced an event.
    pub extracted: usize,
    /// `$ref` targets missing from the payload.
    pub dangling_refs: Vec<String>,
    pub report: MetricsReport,
}

/// The requested range against the same range one year earlier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonOutcome {
    pub records: usize,
    pub extracted: usize,
    pub dangling_refs: Vec<String>,
    pub current: MetricsReport,
    pub baseline: MetricsReport,
    pub periods: Vec<PeriodComparison>,
    pub count_variation_pct: Option<f64>,
    pub amount_variation_pct: Option<f64>,
}
