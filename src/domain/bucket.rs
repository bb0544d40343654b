use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Cents, Event, Period};

/// Per-category tallies inside a bucket.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryTally {
    pub count: i64,
    pub sum_amount: Cents,
    /// Input position of the first event seen for this category, used to keep
    /// rankings stable on ties.
    pub first_seen: usize,
}

/// One period plus the tallies of the events that fall inside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bucket {
    pub period: Period,
    pub count: i64,
    pub count_by_status: BTreeMap<String, i64>,
    pub sum_amount: Cents,
    pub sum_amount_by_status: BTreeMap<String, Cents>,
    pub categories: BTreeMap<String, CategoryTally>,
}

impl Bucket {
    pub fn empty(period: Period) -> Self {
        Self {
            period,
            count: 0,
            count_by_status: BTreeMap::new(),
            sum_amount: 0,
            sum_amount_by_status: BTreeMap::new(),
            categories: BTreeMap::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Add one event. `ordinal` is the event's position in the input list.
    /// Amount sums saturate at `Cents::MAX`.
    pub fn add(&mut self, event: &Event, ordinal: usize) {
        self.count += 1;
        *self.count_by_status.entry(event.status.clone()).or_insert(0) += 1;
        self.sum_amount = self.sum_amount.saturating_add(event.amount);
        let by_status = self
            .sum_amount_by_status
            .entry(event.status.clone())
            .or_insert(0);
        *by_status = by_status.saturating_add(event.amount);

        let tally = self
            .categories
            .entry(event.category_label().to_string())
            .or_insert_with(|| CategoryTally {
                first_seen: ordinal,
                ..CategoryTally::default()
            });
        tally.count += 1;
        tally.sum_amount = tally.sum_amount.saturating_add(event.amount);
    }

    /// Element-wise addition of another bucket's tallies for the same period.
    pub fn merge(&mut self, other: &Bucket) {
        self.count += other.count;
        self.sum_amount = self.sum_amount.saturating_add(other.sum_amount);
        for (status, count) in &other.count_by_status {
            *self.count_by_status.entry(status.clone()).or_insert(0) += count;
        }
        for (status, amount) in &other.sum_amount_by_status {
            let ours = self.sum_amount_by_status.entry(status.clone()).or_insert(0);
            *ours = ours.saturating_add(*amount);
        }
        for (category, theirs) in &other.categories {
            let ours = self
                .categories
                .entry(category.clone())
                .or_insert_with(|| CategoryTally {
                    first_seen: theirs.first_seen,
                    ..CategoryTally::default()
                });
            ours.count += theirs.count;
            ours.sum_amount = ours.sum_amount.saturating_add(theirs.sum_amount);
            ours.first_seen = ours.first_seen.min(theirs.first_seen);
        }
    }

    pub fn status_count(&self, status: &str) -> i64 {
        self.count_by_status.get(status).copied().unwrap_or(0)
    }

    pub fn status_amount(&self, status: &str) -> Cents {
        self.sum_amount_by_status.get(status).copied().unwrap_or(0)
    }
}

/// Distribute events over periods, one bucket per period in the same order.
///
/// Events whose timestamp falls outside every period are left out; that is
/// expected at the edges of a reporting window.
pub fn assign(periods: &[Period], events: &[Event]) -> Vec<Bucket> {
    let mut buckets: Vec<Bucket> = periods.iter().cloned().map(Bucket::empty).collect();

    // Periods are normally already chronological; sorting an index keeps the
    // lookup correct for any caller-supplied order.
    let mut by_start: Vec<usize> = (0..periods.len()).collect();
    by_start.sort_by_key(|&i| periods[i].start);

    let mut dropped = 0usize;
    for (ordinal, event) in events.iter().enumerate() {
        match locate(periods, &by_start, event.timestamp) {
            Some(index) => buckets[index].add(event, ordinal),
            None => dropped += 1,
        }
    }

    if dropped > 0 {
        debug!(
            dropped,
            total = events.len(),
            "events outside the reporting window were skipped"
        );
    }

    buckets
}

/// Binary search for the period whose `[start, end)` contains `timestamp`.
fn locate(periods: &[Period], by_start: &[usize], timestamp: DateTime<Utc>) -> Option<usize> {
    let after = by_start.partition_point(|&i| periods[i].start <= timestamp);
    let candidate = *by_start.get(after.checked_sub(1)?)?;
    periods[candidate].contains(timestamp).then_some(candidate)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate};

    use super::*;
    use crate::domain::{MonthKey, months};

    fn ts(date: &str) -> DateTime<Utc> {
        NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
            .and_utc()
    }

    fn event(id: &str, date: &str, status: &str, amount: Cents) -> Event {
        Event::new(id, ts(date), status, amount)
    }

    fn q1_2024() -> Vec<Period> {
        let from: MonthKey = "2024-01".parse().unwrap();
        let to: MonthKey = "2024-03".parse().unwrap();
        months(from, to)
    }

    #[test]
    fn test_assign_tallies() {
        let events = vec![
            event("a", "2024-01-05", "approved", 10000).with_category("Acme"),
            event("b", "2024-01-20", "pending", 5000).with_category("Acme"),
            event("c", "2024-03-02", "approved", 20000),
        ];
        let buckets = assign(&q1_2024(), &events);

        assert_eq!(buckets.len(), 3);
        assert_eq!(buckets[0].count, 2);
        assert_eq!(buckets[0].sum_amount, 15000);
        assert_eq!(buckets[0].status_count("approved"), 1);
        assert_eq!(buckets[0].status_amount("pending"), 5000);
        assert_eq!(buckets[0].categories["Acme"].count, 2);
        assert_eq!(buckets[0].categories["Acme"].first_seen, 0);

        assert!(buckets[1].is_empty());
        assert_eq!(buckets[1].period.key, "2024-02");

        assert_eq!(buckets[2].count, 1);
        assert_eq!(buckets[2].categories["unspecified"].sum_amount, 20000);
        assert_eq!(buckets[2].categories["unspecified"].first_seen, 2);
    }

    #[test]
    fn test_out_of_range_events_are_dropped() {
        let events = vec![
            event("early", "2023-12-31", "approved", 100),
            event("in", "2024-02-10", "approved", 100),
            event("late", "2024-04-01", "approved", 100),
        ];
        let buckets = assign(&q1_2024(), &events);
        let total: i64 = buckets.iter().map(|b| b.count).sum();
        assert_eq!(total, 1);
        assert_eq!(buckets[1].count, 1);
    }

    #[test]
    fn test_boundary_belongs_to_next_period() {
        let periods = q1_2024();
        let at_boundary = Event::new("x", periods[1].start, "approved", 1);
        let just_before = Event::new("y", periods[1].start - Duration::seconds(1), "approved", 1);

        let buckets = assign(&periods, &[at_boundary, just_before]);
        assert_eq!(buckets[0].count, 1);
        assert_eq!(buckets[1].count, 1);
    }

    #[test]
    fn test_unsorted_periods_keep_their_order() {
        let mut periods = q1_2024();
        periods.reverse();
        let buckets = assign(&periods, &[event("a", "2024-01-15", "approved", 1)]);

        assert_eq!(buckets[0].period.key, "2024-03");
        assert_eq!(buckets[2].period.key, "2024-01");
        assert_eq!(buckets[2].count, 1);
    }

    #[test]
    fn test_no_periods() {
        let buckets = assign(&[], &[event("a", "2024-01-15", "approved", 1)]);
        assert!(buckets.is_empty());
    }

    #[test]
    fn test_merge_matches_single_pass() {
        let events = vec![
            event("a", "2024-01-05", "approved", 100).with_category("B"),
            event("b", "2024-01-06", "rejected", 200).with_category("A"),
            event("c", "2024-02-07", "approved", 300).with_category("B"),
            event("d", "2024-03-08", "pending", 400),
            event("e", "2024-01-09", "approved", 500).with_category("A"),
        ];
        let periods = q1_2024();
        let whole = assign(&periods, &events);

        // Split into two partitions; ordinals must stay global
        let mut left = assign(&periods, &events[..2]);
        let mut right: Vec<Bucket> = periods.iter().cloned().map(Bucket::empty).collect();
        for (offset, e) in events[2..].iter().enumerate() {
            let index = periods.iter().position(|p| p.contains(e.timestamp)).unwrap();
            right[index].add(e, offset + 2);
        }

        for (l, r) in left.iter_mut().zip(&right) {
            l.merge(r);
        }
        assert_eq!(left, whole);
    }
}
