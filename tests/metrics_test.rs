mod common;

use common::event;
use quotelens::domain::{
    AcceptedStatuses, Event, RankBy, Ranking, assign, compare, enrich, enrich_with, months,
    variation_pct,
};

fn approved() -> AcceptedStatuses {
    AcceptedStatuses::new(["approved"])
}

#[test]
fn test_variation_sequence_with_empty_months() {
    let periods = months("2024-01".parse().unwrap(), "2024-04".parse().unwrap());
    let events: Vec<Event> = (0..5)
        .map(|i| event(&format!("m{}", i), "2024-03-10", "pending", 100))
        .collect();

    let report = enrich(assign(&periods, &events), &approved());
    assert_eq!(report.variations(), vec![None, None, Some(100.0), Some(-100.0)]);
}

#[test]
fn test_variation_rule() {
    assert_eq!(variation_pct(0, 0), None);
    assert_eq!(variation_pct(0, 7), Some(100.0));
    assert_eq!(variation_pct(4, 2), Some(-50.0));
    assert_eq!(variation_pct(2, 3), Some(50.0));
}

#[test]
fn test_conversion_rate_per_bucket() {
    let periods = months("2024-03".parse().unwrap(), "2024-04".parse().unwrap());
    let events = vec![
        event("a", "2024-03-01", "approved", 100),
        event("b", "2024-03-02", "rejected", 100),
        event("c", "2024-03-03", "approved", 100),
        event("d", "2024-03-04", "pending", 100),
    ];

    let report = enrich(assign(&periods, &events), &approved());
    assert_eq!(report.buckets[0].accepted_count, 2);
    assert_eq!(report.buckets[0].conversion_rate, 0.5);
    // empty bucket
    assert_eq!(report.buckets[1].conversion_rate, 0.0);
    assert_eq!(report.totals.conversion_rate, 0.5);
    assert_eq!(report.totals.average_amount, 100);
}

#[test]
fn test_several_accepted_statuses() {
    let periods = months("2024-03".parse().unwrap(), "2024-03".parse().unwrap());
    let events = vec![
        event("a", "2024-03-01", "approved", 1),
        event("b", "2024-03-02", "invoiced", 1),
        event("c", "2024-03-03", "rejected", 1),
        event("d", "2024-03-04", "rejected", 1),
    ];

    let report = enrich(
        assign(&periods, &events),
        &AcceptedStatuses::new(["approved", "invoiced"]),
    );
    assert_eq!(report.buckets[0].conversion_rate, 0.5);
    assert_eq!(report.status_breakdown[0].status, "rejected");
    assert_eq!(report.status_breakdown[0].percentage, 50.0);
}

#[test]
fn test_top_categories_use_grand_total() {
    let periods = months("2024-03".parse().unwrap(), "2024-04".parse().unwrap());
    let events = vec![
        event("a", "2024-03-01", "approved", 300).with_category("Acme"),
        event("b", "2024-03-02", "approved", 100).with_category("Globex"),
        event("c", "2024-04-03", "approved", 100).with_category("Initech"),
        event("d", "2024-04-04", "approved", 500).with_category("Acme"),
    ];

    let report = enrich_with(
        assign(&periods, &events),
        &approved(),
        Ranking {
            by: RankBy::Amount,
            limit: Some(2),
        },
    );

    let names: Vec<_> = report.top_categories.iter().map(|c| c.category.as_str()).collect();
    // Globex and Initech tie; Globex was seen first
    assert_eq!(names, vec!["Acme", "Globex"]);
    assert_eq!(report.top_categories[0].percentage, 80.0);
    assert_eq!(report.top_categories[1].percentage, 10.0);
}

#[test]
fn test_rank_by_count() {
    let periods = months("2024-03".parse().unwrap(), "2024-03".parse().unwrap());
    let events = vec![
        event("a", "2024-03-01", "approved", 9000).with_category("Big"),
        event("b", "2024-03-02", "approved", 10).with_category("Busy"),
        event("c", "2024-03-03", "approved", 10).with_category("Busy"),
    ];

    let report = enrich_with(
        assign(&periods, &events),
        &approved(),
        Ranking {
            by: RankBy::Count,
            limit: None,
        },
    );
    assert_eq!(report.top_categories[0].category, "Busy");
    assert_eq!(report.top_categories.len(), 2);
}

#[test]
fn test_compare_pairs_by_position() {
    let current_periods = months("2024-03".parse().unwrap(), "2024-04".parse().unwrap());
    let baseline_periods = months("2023-03".parse().unwrap(), "2023-04".parse().unwrap());
    let events = vec![
        event("old", "2023-03-15", "approved", 1000),
        event("new-1", "2024-03-15", "approved", 1500),
        event("new-2", "2024-03-16", "approved", 500),
    ];

    let periods = compare(
        &assign(&current_periods, &events),
        &assign(&baseline_periods, &events),
    );

    assert_eq!(periods[0].baseline_key.as_deref(), Some("2023-03"));
    assert_eq!(periods[0].count_variation_pct, Some(100.0));
    assert_eq!(periods[0].amount_variation_pct, Some(100.0));
    assert_eq!(periods[1].count_variation_pct, None);
}
