use std::io::Write;

use anyhow::Result;
use serde::Serialize;

use crate::domain::{CategoryShare, MetricsReport, PeriodComparison};

fn optional_pct(value: Option<f64>) -> String {
    value.map(|v| format!("{:.2}", v)).unwrap_or_default()
}

/// Export report buckets to CSV, one row per period in chronological order.
/// Amounts are written in cents.
pub fn write_report_csv<W: Write>(writer: W, report: &MetricsReport) -> Result<usize> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    csv_writer.write_record([
        "key",
        "label",
        "start",
        "end",
        "count",
        "accepted",
        "sum_amount",
        "conversion_rate",
        "variation_pct",
    ])?;

    let mut count = 0;
    for metrics in &report.buckets {
        let bucket = &metrics.bucket;
        csv_writer.write_record([
            bucket.period.key.clone(),
            bucket.period.label.clone(),
            bucket.period.first_day().to_string(),
            bucket.period.last_day().to_string(),
            bucket.count.to_string(),
            metrics.accepted_count.to_string(),
            bucket.sum_amount.to_string(),
            format!("{:.4}", metrics.conversion_rate),
            optional_pct(metrics.variation_pct),
        ])?;
        count += 1;
    }

    csv_writer.flush()?;
    Ok(count)
}

/// Export a category ranking to CSV.
pub fn write_categories_csv<W: Write>(writer: W, categories: &[CategoryShare]) -> Result<usize> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    csv_writer.write_record(["rank", "category", "count", "sum_amount", "percentage"])?;

    for (i, category) in categories.iter().enumerate() {
        csv_writer.write_record([
            (i + 1).to_string(),
            category.category.clone(),
            category.count.to_string(),
            category.sum_amount.to_string(),
            format!("{:.2}", category.percentage),
        ])?;
    }

    csv_writer.flush()?;
    Ok(categories.len())
}

/// Export a period-by-period comparison to CSV.
pub fn write_comparison_csv<W: Write>(writer: W, periods: &[PeriodComparison]) -> Result<usize> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    csv_writer.write_record([
        "key",
        "baseline_key",
        "count",
        "baseline_count",
        "count_variation_pct",
        "sum_amount",
        "baseline_amount",
        "amount_variation_pct",
    ])?;

    for period in periods {
        csv_writer.write_record([
            period.key.clone(),
            period.baseline_key.clone().unwrap_or_default(),
            period.current_count.to_string(),
            period.baseline_count.to_string(),
            optional_pct(period.count_variation_pct),
            period.current_amount.to_string(),
            period.baseline_amount.to_string(),
            optional_pct(period.amount_variation_pct),
        ])?;
    }

    csv_writer.flush()?;
    Ok(periods.len())
}

/// Write any report value as pretty JSON.
pub fn write_json<W: Write, T: Serialize>(mut writer: W, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    writer.write_all(json.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}
