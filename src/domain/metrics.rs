use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{AcceptedStatuses, Bucket, CategoryTally, Cents, sum_cents};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid ranking '{0}', expected amount or count")]
pub struct InvalidRankBy(pub String);

/// Measure used to order categories.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RankBy {
    #[default]
    Amount,
    Count,
}

impl RankBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RankBy::Amount => "amount",
            RankBy::Count => "count",
        }
    }
}

impl FromStr for RankBy {
    type Err = InvalidRankBy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "amount" => Ok(RankBy::Amount),
            "count" => Ok(RankBy::Count),
            _ => Err(InvalidRankBy(s.to_string())),
        }
    }
}

impl fmt::Display for RankBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Top-N category ranking settings. `limit: None` keeps every category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ranking {
    pub by: RankBy,
    pub limit: Option<usize>,
}

impl Default for Ranking {
    fn default() -> Self {
        Self {
            by: RankBy::Amount,
            limit: Some(10),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketMetrics {
    pub bucket: Bucket,
    pub accepted_count: i64,
    /// Accepted share of the bucket's events, in `0.0..=1.0`.
    pub conversion_rate: f64,
    /// Percentage change of `count` against the previous bucket.
    pub variation_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub count: i64,
    pub sum_amount: Cents,
    pub accepted_count: i64,
    pub conversion_rate: f64,
    pub average_amount: Cents,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusShare {
    pub status: String,
    pub count: i64,
    pub sum_amount: Cents,
    /// Share of all events, 0-100.
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryShare {
    pub category: String,
    pub count: i64,
    pub sum_amount: Cents,
    /// Share of the grand total over every category (not only the ranked
    /// ones), 0-100, measured with the ranking's measure.
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub buckets: Vec<BucketMetrics>,
    pub totals: Totals,
    pub status_breakdown: Vec<StatusShare>,
    pub top_categories: Vec<CategoryShare>,
    pub ranking: Ranking,
}

/// Pairing of a bucket with its corresponding baseline bucket (e.g. the same
/// month one year earlier).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PeriodComparison {
    pub key: String,
    pub label: String,
    pub baseline_key: Option<String>,
    pub current_count: i64,
    pub baseline_count: i64,
    pub count_variation_pct: Option<f64>,
    pub current_amount: Cents,
    pub baseline_amount: Cents,
    pub amount_variation_pct: Option<f64>,
}

/// Percentage of `part` in `total`, 0 when the total is 0.
fn share(part: i64, total: i64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64 * 100.0
    }
}

pub fn accepted_count(bucket: &Bucket, accepted: &AcceptedStatuses) -> i64 {
    accepted.iter().map(|status| bucket.status_count(status)).sum()
}

/// Accepted events over all events; 0 for an empty bucket.
pub fn conversion_rate(bucket: &Bucket, accepted: &AcceptedStatuses) -> f64 {
    if bucket.count == 0 {
        return 0.0;
    }
    accepted_count(bucket, accepted) as f64 / bucket.count as f64
}

/// Percentage change from `previous` to `current`.
///
/// Zero to zero carries no trend and is `None`; zero to anything positive is
/// treated as a full-scale increase of 100%.
pub fn variation_pct(previous: i64, current: i64) -> Option<f64> {
    match (previous, current) {
        (0, 0) => None,
        (0, _) => Some(100.0),
        _ => Some((current - previous) as f64 / previous as f64 * 100.0),
    }
}

/// Enrich buckets with the default ranking (top 10 by amount).
pub fn enrich(buckets: Vec<Bucket>, accepted: &AcceptedStatuses) -> MetricsReport {
    enrich_with(buckets, accepted, Ranking::default())
}

pub fn enrich_with(
    buckets: Vec<Bucket>,
    accepted: &AcceptedStatuses,
    ranking: Ranking,
) -> MetricsReport {
    let totals = totals(&buckets, accepted);
    let status_breakdown = status_breakdown(&buckets);
    let top_categories = rank_categories(&buckets, ranking);

    let mut previous: Option<i64> = None;
    let buckets = buckets
        .into_iter()
        .map(|bucket| {
            let variation = previous.and_then(|prev| variation_pct(prev, bucket.count));
            previous = Some(bucket.count);
            BucketMetrics {
                accepted_count: accepted_count(&bucket, accepted),
                conversion_rate: conversion_rate(&bucket, accepted),
                variation_pct: variation,
                bucket,
            }
        })
        .collect();

    MetricsReport {
        buckets,
        totals,
        status_breakdown,
        top_categories,
        ranking,
    }
}

pub fn totals(buckets: &[Bucket], accepted: &AcceptedStatuses) -> Totals {
    let count: i64 = buckets.iter().map(|b| b.count).sum();
    let sum_amount = sum_cents(buckets.iter().map(|b| b.sum_amount));
    let accepted_count: i64 = buckets.iter().map(|b| accepted_count(b, accepted)).sum();

    Totals {
        count,
        sum_amount,
        accepted_count,
        conversion_rate: if count == 0 {
            0.0
        } else {
            accepted_count as f64 / count as f64
        },
        average_amount: if count == 0 { 0 } else { sum_amount / count },
    }
}

/// Per-status counts and amounts over all buckets, most frequent first.
pub fn status_breakdown(buckets: &[Bucket]) -> Vec<StatusShare> {
    let mut statuses: BTreeMap<&str, (i64, Cents)> = BTreeMap::new();
    for bucket in buckets {
        for (status, count) in &bucket.count_by_status {
            statuses.entry(status).or_default().0 += count;
        }
        for (status, amount) in &bucket.sum_amount_by_status {
            let entry = statuses.entry(status).or_default();
            entry.1 = entry.1.saturating_add(*amount);
        }
    }

    let total: i64 = statuses.values().map(|(count, _)| count).sum();
    let mut shares: Vec<StatusShare> = statuses
        .into_iter()
        .map(|(status, (count, sum_amount))| StatusShare {
            status: status.to_string(),
            count,
            sum_amount,
            percentage: share(count, total),
        })
        .collect();

    // BTreeMap order already breaks ties by name; the sort is stable
    shares.sort_by(|a, b| b.count.cmp(&a.count));
    shares
}

/// Categories ordered by the ranking measure, descending, ties in first-seen
/// order, truncated to the ranking limit.
pub fn rank_categories(buckets: &[Bucket], ranking: Ranking) -> Vec<CategoryShare> {
    let mut categories: BTreeMap<&str, CategoryTally> = BTreeMap::new();
    for bucket in buckets {
        for (category, tally) in &bucket.categories {
            let entry = categories
                .entry(category)
                .or_insert_with(|| CategoryTally {
                    first_seen: tally.first_seen,
                    ..CategoryTally::default()
                });
            entry.count += tally.count;
            entry.sum_amount = entry.sum_amount.saturating_add(tally.sum_amount);
            entry.first_seen = entry.first_seen.min(tally.first_seen);
        }
    }

    let measure = |tally: &CategoryTally| match ranking.by {
        RankBy::Amount => tally.sum_amount,
        RankBy::Count => tally.count,
    };
    let grand_total = sum_cents(categories.values().map(measure));

    let mut ranked: Vec<(&str, CategoryTally)> = categories.into_iter().collect();
    ranked.sort_by(|(_, a), (_, b)| {
        measure(b)
            .cmp(&measure(a))
            .then(a.first_seen.cmp(&b.first_seen))
    });
    if let Some(limit) = ranking.limit {
        ranked.truncate(limit);
    }

    ranked
        .into_iter()
        .map(|(category, tally)| CategoryShare {
            category: category.to_string(),
            count: tally.count,
            sum_amount: tally.sum_amount,
            percentage: share(measure(&tally), grand_total),
        })
        .collect()
}

/// Compare each bucket with the baseline bucket at the same position.
/// Buckets without a baseline counterpart compare against zero.
pub fn compare(current: &[Bucket], baseline: &[Bucket]) -> Vec<PeriodComparison> {
    current
        .iter()
        .enumerate()
        .map(|(i, bucket)| {
            let base = baseline.get(i);
            let baseline_count = base.map_or(0, |b| b.count);
            let baseline_amount = base.map_or(0, |b| b.sum_amount);
            PeriodComparison {
                key: bucket.period.key.clone(),
                label: bucket.period.label.clone(),
                baseline_key: base.map(|b| b.period.key.clone()),
                current_count: bucket.count,
                baseline_count,
                count_variation_pct: variation_pct(baseline_count, bucket.count),
                current_amount: bucket.sum_amount,
                baseline_amount,
                amount_variation_pct: variation_pct(baseline_amount, bucket.sum_amount),
            }
        })
        .collect()
}

impl MetricsReport {
    pub fn variations(&self) -> Vec<Option<f64>> {
        self.buckets.iter().map(|b| b.variation_pct).collect()
    }

    pub fn bucket(&self, key: &str) -> Option<&BucketMetrics> {
        self.buckets.iter().find(|b| b.bucket.period.key == key)
    }

    pub fn is_empty(&self) -> bool {
        self.totals.count == 0
    }
}
