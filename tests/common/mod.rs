// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use quotelens::domain::{Cents, Event};
use serde_json::{Value, json};
use tempfile::TempDir;

/// Helper to parse a date string into DateTime<Utc>
pub fn parse_date(date_str: &str) -> DateTime<Utc> {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d")
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc()
}

/// Helper to parse a day without a time component
pub fn day(date_str: &str) -> NaiveDate {
    NaiveDate::parse_from_str(date_str, "%Y-%m-%d").unwrap()
}

/// Build an event at midnight of the given day
pub fn event(id: &str, date_str: &str, status: &str, amount: Cents) -> Event {
    Event::new(id, parse_date(date_str), status, amount)
}

/// Write `content` into a fresh temp dir and return its path
pub fn write_temp(name: &str, content: &str) -> Result<(PathBuf, TempDir)> {
    let temp_dir = TempDir::new()?;
    let path = temp_dir.path().join(name);
    std::fs::write(&path, content)?;
    Ok((path, temp_dir))
}

/// Test fixture: quotations sharing customers through `$id`/`$ref`
pub struct QuotationPayload;

impl QuotationPayload {
    /// Three quotations in March and April 2024.
    ///
    /// March: approved 100.00 (Acme), rejected 50.00 (Globex).
    /// April: approved 200.00 (Acme, by reference).
    pub fn spring_2024() -> Value {
        json!({
            "$id": "1",
            "$values": [
                {
                    "$id": "2",
                    "id": "q-1",
                    "createdAt": "2024-03-05T10:00:00Z",
                    "status": "approved",
                    "total": 100.00,
                    "customer": {"$id": "3", "name": "Acme"}
                },
                {
                    "$id": "4",
                    "id": "q-2",
                    "createdAt": "2024-03-20T16:30:00Z",
                    "status": "rejected",
                    "total": 50.00,
                    "customer": {"$id": "5", "name": "Globex"}
                },
                {
                    "$id": "6",
                    "id": "q-3",
                    "createdAt": "2024-04-02T09:15:00Z",
                    "status": "Approved",
                    "total": "200.00",
                    "customer": {"$ref": "3"}
                }
            ]
        })
    }

    /// Same shape, with two quotations in March 2023 for comparisons.
    pub fn with_previous_year() -> Value {
        let mut payload = Self::spring_2024();
        let values = payload["$values"].as_array_mut().unwrap();
        values.push(json!({
            "id": "q-0",
            "createdAt": "2023-03-10",
            "status": "approved",
            "total": 80.00,
            "customer": {"$ref": "5"}
        }));
        values.push(json!({
            "id": "q-00",
            "createdAt": "2023-03-28",
            "status": "pending",
            "total": 20.00
        }));
        payload
    }
}
