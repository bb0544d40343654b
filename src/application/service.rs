use chrono::NaiveDate;
use serde_json::Value;
use tracing::info;

use crate::domain::{
    Event, Granularity, MonthKey, Period, assign, compare, enrich_with, extract_events, months,
    partition, resolve, variation_pct, weeks,
};

use super::{AppError, ComparisonOutcome, ReportConfig, ReportOutcome};

/// Runs the report pipeline: resolve the payload, extract events, partition
/// the calendar, bucket the events and derive the metrics.
/// This is the primary interface for any client (CLI, HTTP handler, etc.).
pub struct ReportService {
    config: ReportConfig,
}

/// Events pulled out of one payload.
struct Extraction {
    events: Vec<Event>,
    records: usize,
    dangling_refs: Vec<String>,
}

impl ReportService {
    /// Create a new report service with the given configuration.
    pub fn new(config: ReportConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ReportConfig {
        &self.config
    }

    /// Resolve a payload and extract its events. Never fails; unusable
    /// records are simply not counted.
    pub fn extract(&self, payload: &Value) -> Vec<Event> {
        self.extraction(payload).events
    }

    fn extraction(&self, payload: &Value) -> Extraction {
        let graph = resolve(payload);
        let fields = &self.config.fields;
        let records = fields.select_records(&graph);
        let record_count = records.len();
        let events = extract_events(records, |record| fields.extract(record));

        info!(
            records = record_count,
            events = events.len(),
            dangling_refs = graph.dangling().len(),
            "payload resolved"
        );

        Extraction {
            events,
            records: record_count,
            dangling_refs: graph.dangling().to_vec(),
        }
    }

    // ========================
    // Reports
    // ========================

    /// Monthly report from `from` to `to`, both inclusive.
    pub fn monthly(
        &self,
        payload: &Value,
        from: MonthKey,
        to: MonthKey,
    ) -> Result<ReportOutcome, AppError> {
        let periods = months(from, to);
        if periods.is_empty() {
            return Err(AppError::InvalidDateRange(format!(
                "{} is after {}",
                from, to
            )));
        }
        Ok(self.build(Granularity::Month, &periods, self.extraction(payload)))
    }

    /// Weekly report over the full weeks of one month. `month_index` is 0-based.
    pub fn weekly(
        &self,
        payload: &Value,
        year: i32,
        month_index: u32,
    ) -> Result<ReportOutcome, AppError> {
        let periods = weeks(year, month_index);
        if periods.is_empty() {
            return Err(AppError::InvalidDateRange(format!(
                "no month {} in year {}",
                u64::from(month_index) + 1,
                year
            )));
        }
        Ok(self.build(Granularity::Week, &periods, self.extraction(payload)))
    }

    /// Report over an arbitrary inclusive date range.
    pub fn range(
        &self,
        payload: &Value,
        granularity: Granularity,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<ReportOutcome, AppError> {
        let periods = partition(granularity, from, to);
        if periods.is_empty() {
            return Err(AppError::InvalidDateRange(format!(
                "{} is after {}",
                from, to
            )));
        }
        Ok(self.build(granularity, &periods, self.extraction(payload)))
    }

    /// Monthly report for `from..=to` compared with the same months one
    /// year earlier.
    pub fn year_over_year(
        &self,
        payload: &Value,
        from: MonthKey,
        to: MonthKey,
    ) -> Result<ComparisonOutcome, AppError> {
        let periods = months(from, to);
        if periods.is_empty() {
            return Err(AppError::InvalidDateRange(format!(
                "{} is after {}",
                from, to
            )));
        }
        let baseline_periods = match (from.shift_years(-1), to.shift_years(-1)) {
            (Some(from), Some(to)) => months(from, to),
            _ => Vec::new(),
        };

        let extraction = self.extraction(payload);
        let accepted = self.config.accepted();
        let ranking = self.config.ranking();

        let current = assign(&periods, &extraction.events);
        let baseline = assign(&baseline_periods, &extraction.events);
        let comparisons = compare(&current, &baseline);

        let current = enrich_with(current, &accepted, ranking);
        let baseline = enrich_with(baseline, &accepted, ranking);

        Ok(ComparisonOutcome {
            records: extraction.records,
            extracted: extraction.events.len(),
            dangling_refs: extraction.dangling_refs,
            count_variation_pct: variation_pct(baseline.totals.count, current.totals.count),
            amount_variation_pct: variation_pct(
                baseline.totals.sum_amount,
                current.totals.sum_amount,
            ),
            current,
            baseline,
            periods: comparisons,
        })
    }

    fn build(
        &self,
        granularity: Granularity,
        periods: &[Period],
        extraction: Extraction,
    ) -> ReportOutcome {
        let buckets = assign(periods, &extraction.events);
        let report = enrich_with(buckets, &self.config.accepted(), self.config.ranking());

        info!(
            %granularity,
            periods = periods.len(),
            counted = report.totals.count,
            "report built"
        );

        ReportOutcome {
            granularity,
            records: extraction.records,
            extracted: extraction.events.len(),
            dangling_refs: extraction.dangling_refs,
            report,
        }
    }
}
