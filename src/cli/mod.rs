use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use serde_json::Value;

use crate::application::{ComparisonOutcome, ReportConfig, ReportOutcome, ReportService};
use crate::domain::{Granularity, MetricsReport, MonthKey, RankBy, format_cents};
use crate::io::export::{write_categories_csv, write_comparison_csv, write_json, write_report_csv};
use crate::io::import::{load_payload, load_payload_file};

/// quotelens - calendar-aligned quotation reports
#[derive(Parser)]
#[command(name = "quotelens")]
#[command(about = "Resolve identity-preserving JSON payloads and aggregate them into weekly or monthly reports")]
#[command(version)]
pub struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Monthly report over an inclusive month range
    Monthly {
        /// First month (YYYY-MM)
        #[arg(long)]
        from: String,

        /// Last month (YYYY-MM)
        #[arg(long)]
        to: String,

        #[command(flatten)]
        args: ReportArgs,
    },

    /// Weekly report over the full weeks of one month
    Weekly {
        /// Year
        #[arg(long)]
        year: i32,

        /// Month (1-12)
        #[arg(long)]
        month: u32,

        #[command(flatten)]
        args: ReportArgs,
    },

    /// Report over an arbitrary date range
    Range {
        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        from: String,

        /// End date (YYYY-MM-DD), inclusive
        #[arg(long)]
        to: String,

        /// Period: weekly, monthly
        #[arg(long, default_value = "monthly")]
        period: String,

        #[command(flatten)]
        args: ReportArgs,
    },

    /// Compare a month range with the same months one year earlier
    Compare {
        /// First month (YYYY-MM)
        #[arg(long)]
        from: String,

        /// Last month (YYYY-MM)
        #[arg(long)]
        to: String,

        #[command(flatten)]
        args: ReportArgs,
    },

    /// Print the resolved payload as plain JSON
    Resolve {
        /// Payload file (stdin if omitted)
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
}

#[derive(Args)]
pub struct ReportArgs {
    /// Payload file (stdin if omitted)
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// Output format: table, json, csv, categories (ranking as CSV)
    #[arg(long, default_value = "table")]
    pub format: String,

    /// Statuses counted as accepted, comma separated (overrides config)
    #[arg(long, value_delimiter = ',')]
    pub accepted: Vec<String>,

    /// Number of ranked categories, 0 for all (overrides config)
    #[arg(long)]
    pub top: Option<usize>,

    /// Rank categories by: amount, count (overrides config)
    #[arg(long)]
    pub rank_by: Option<String>,
}

impl ReportArgs {
    fn apply(&self, mut config: ReportConfig) -> Result<ReportConfig> {
        if !self.accepted.is_empty() {
            config.accepted_statuses = self.accepted.clone();
        }
        if let Some(top) = self.top {
            config.top_n = top;
        }
        if let Some(rank_by) = &self.rank_by {
            config.rank_by = rank_by.parse::<RankBy>()?;
        }
        Ok(config)
    }

    fn service(&self, config: &ReportConfig) -> Result<ReportService> {
        Ok(ReportService::new(self.apply(config.clone())?))
    }

    fn payload(&self) -> Result<Value> {
        read_payload(self.input.as_deref())
    }
}

impl Cli {
    fn load_config(&self) -> Result<ReportConfig> {
        match &self.config {
            Some(path) => ReportConfig::load(path)
                .with_context(|| format!("Failed to load config '{}'", path.display())),
            None => Ok(ReportConfig::default()),
        }
    }

    pub fn run(self) -> Result<()> {
        let config = self.load_config()?;

        match self.command {
            Commands::Monthly { from, to, args } => {
                let (from, to) = parse_month_range(&from, &to)?;
                let service = args.service(&config)?;
                let outcome = service.monthly(&args.payload()?, from, to)?;
                print_outcome(&outcome, "Monthly Report", &args.format)?;
            }

            Commands::Weekly { year, month, args } => {
                let Some(month_index) = month.checked_sub(1).filter(|m| *m < 12) else {
                    bail!("Invalid month {}. Use 1-12", month);
                };
                let service = args.service(&config)?;
                let outcome = service.weekly(&args.payload()?, year, month_index)?;
                print_outcome(&outcome, "Weekly Report", &args.format)?;
            }

            Commands::Range {
                from,
                to,
                period,
                args,
            } => {
                let from_date = parse_date(&from)?;
                let to_date = parse_date(&to)?;
                let granularity: Granularity = period.parse()?;
                let service = args.service(&config)?;
                let outcome = service.range(&args.payload()?, granularity, from_date, to_date)?;
                let title = match granularity {
                    Granularity::Week => "Weekly Report",
                    Granularity::Month => "Monthly Report",
                };
                print_outcome(&outcome, title, &args.format)?;
            }

            Commands::Compare { from, to, args } => {
                let (from, to) = parse_month_range(&from, &to)?;
                let service = args.service(&config)?;
                let outcome = service.year_over_year(&args.payload()?, from, to)?;
                print_comparison(&outcome, &args.format)?;
            }

            Commands::Resolve { input } => {
                let payload = read_payload(input.as_deref())?;
                let graph = crate::domain::resolve(&payload);
                write_json(io::stdout().lock(), &graph.root_view().to_value())?;
                for id in graph.dangling() {
                    eprintln!("warning: dangling reference {}", id);
                }
            }
        }

        Ok(())
    }
}

fn read_payload(input: Option<&Path>) -> Result<Value> {
    match input {
        Some(path) => load_payload_file(path)
            .with_context(|| format!("Failed to read payload '{}'", path.display())),
        None => load_payload(io::stdin().lock()).context("Failed to read payload from stdin"),
    }
}

fn parse_month_range(from: &str, to: &str) -> Result<(MonthKey, MonthKey)> {
    let from: MonthKey = from.parse()?;
    let to: MonthKey = to.parse()?;
    Ok((from, to))
}

fn parse_date(date_str: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .with_context(|| format!("Invalid date format '{}'. Use YYYY-MM-DD", date_str))
}

fn print_outcome(outcome: &ReportOutcome, title: &str, format: &str) -> Result<()> {
    match format {
        "json" => write_json(io::stdout().lock(), outcome)?,
        "csv" => {
            write_report_csv(io::stdout().lock(), &outcome.report)?;
        }
        "categories" => {
            write_categories_csv(io::stdout().lock(), &outcome.report.top_categories)?;
        }
        _ => {
            println!("{}", title);
            println!(
                "Records: {} ({} usable, {} dangling references)",
                outcome.records,
                outcome.extracted,
                outcome.dangling_refs.len()
            );
            println!();
            print_report_table(&outcome.report);
        }
    }
    Ok(())
}

fn print_report_table(report: &MetricsReport) {
    println!(
        "{:<28} {:>7} {:>9} {:>7} {:>14} {:>9}",
        "PERIOD", "COUNT", "ACCEPTED", "CONV%", "AMOUNT", "VAR%"
    );
    println!("{}", "-".repeat(79));

    for metrics in &report.buckets {
        let bucket = &metrics.bucket;
        println!(
            "{:<28} {:>7} {:>9} {:>6.1}% {:>14} {:>9}",
            truncate(&bucket.period.label, 28),
            bucket.count,
            metrics.accepted_count,
            metrics.conversion_rate * 100.0,
            format_cents(bucket.sum_amount),
            format_variation(metrics.variation_pct)
        );
    }

    println!("{}", "-".repeat(79));
    println!(
        "{:<28} {:>7} {:>9} {:>6.1}% {:>14}",
        "TOTAL",
        report.totals.count,
        report.totals.accepted_count,
        report.totals.conversion_rate * 100.0,
        format_cents(report.totals.sum_amount)
    );

    if !report.status_breakdown.is_empty() {
        println!();
        println!("By Status:");
        for status in &report.status_breakdown {
            println!(
                "  {:<20} {:>7} {:>14} ({:.1}%)",
                truncate(&status.status, 20),
                status.count,
                format_cents(status.sum_amount),
                status.percentage
            );
        }
    }

    if !report.top_categories.is_empty() {
        println!();
        println!("Top Categories (by {}):", report.ranking.by);
        for (i, category) in report.top_categories.iter().enumerate() {
            println!(
                "  {:>2}. {:<24} {:>7} {:>14} ({:.1}%)",
                i + 1,
                truncate(&category.category, 24),
                category.count,
                format_cents(category.sum_amount),
                category.percentage
            );
        }
    }
}

fn print_comparison(outcome: &ComparisonOutcome, format: &str) -> Result<()> {
    match format {
        "json" => write_json(io::stdout().lock(), outcome)?,
        "csv" => {
            write_comparison_csv(io::stdout().lock(), &outcome.periods)?;
        }
        "categories" => {
            write_categories_csv(io::stdout().lock(), &outcome.current.top_categories)?;
        }
        _ => {
            println!("Year-over-Year Comparison");
            println!(
                "Records: {} ({} usable, {} dangling references)",
                outcome.records,
                outcome.extracted,
                outcome.dangling_refs.len()
            );
            println!();
            println!(
                "{:<10} {:<10} {:>7} {:>7} {:>9} {:>14} {:>14} {:>9}",
                "PERIOD", "BASELINE", "COUNT", "BEFORE", "VAR%", "AMOUNT", "BEFORE", "VAR%"
            );
            println!("{}", "-".repeat(88));

            for period in &outcome.periods {
                println!(
                    "{:<10} {:<10} {:>7} {:>7} {:>9} {:>14} {:>14} {:>9}",
                    period.key,
                    period.baseline_key.as_deref().unwrap_or("-"),
                    period.current_count,
                    period.baseline_count,
                    format_variation(period.count_variation_pct),
                    format_cents(period.current_amount),
                    format_cents(period.baseline_amount),
                    format_variation(period.amount_variation_pct)
                );
            }

            println!("{}", "=".repeat(88));
            println!(
                "{:<21} {:>7} {:>7} {:>9} {:>14} {:>14} {:>9}",
                "TOTAL",
                outcome.current.totals.count,
                outcome.baseline.totals.count,
                format_variation(outcome.count_variation_pct),
                format_cents(outcome.current.totals.sum_amount),
                format_cents(outcome.baseline.totals.sum_amount),
                format_variation(outcome.amount_variation_pct)
            );
        }
    }
    Ok(())
}

fn format_variation(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:+.1}%", v),
        None => "-".to_string(),
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
