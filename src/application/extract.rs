use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{Event, Node, NodeView, ResolvedGraph, cents_from_f64, extract_events, parse_cents};

/// Where each event field lives inside a resolved record. Paths are dotted
/// (`"version.customer.name"`); numeric segments index into lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldMapping {
    /// Path to the record list. The payload root when unset.
    pub records: Option<String>,
    pub id: String,
    pub timestamp: String,
    pub status: String,
    pub amount: String,
    pub category: Option<String>,
}

impl Default for FieldMapping {
    fn default() -> Self {
        Self {
            records: None,
            id: "id".to_string(),
            timestamp: "createdAt".to_string(),
            status: "status".to_string(),
            amount: "total".to_string(),
            category: None,
        }
    }
}

impl FieldMapping {
    /// Build an event from one record, or `None` when a required field is
    /// missing or malformed. A missing amount counts as zero.
    pub fn extract(&self, record: NodeView<'_>) -> Option<Event> {
        let id = scalar_string(record.path(&self.id)?)?;
        let timestamp = record.path(&self.timestamp)?.as_str().and_then(parse_timestamp)?;
        let status = scalar_string(record.path(&self.status)?)?
            .trim()
            .to_lowercase();
        if status.is_empty() {
            return None;
        }

        let amount = match record.path(&self.amount) {
            None => 0,
            Some(view) => match view.node() {
                Node::Null => 0,
                Node::Number(_) => cents_from_f64(view.as_f64()?)?,
                Node::String(s) => parse_cents(s).ok()?,
                _ => return None,
            },
        };

        let category = self
            .category
            .as_deref()
            .and_then(|path| record.path(path))
            .and_then(scalar_string)
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        Some(Event {
            id,
            timestamp,
            status,
            amount,
            category,
        })
    }

    /// The records this mapping reads events from.
    pub fn select_records<'g>(&self, graph: &'g ResolvedGraph) -> Vec<NodeView<'g>> {
        match &self.records {
            Some(path) => graph.records_at(path),
            None => graph.records(),
        }
    }

    /// Extract every usable event of a resolved payload.
    pub fn events(&self, graph: &ResolvedGraph) -> Vec<Event> {
        extract_events(self.select_records(graph), |record| self.extract(record))
    }
}

fn scalar_string(view: NodeView<'_>) -> Option<String> {
    match view.node() {
        Node::String(s) => Some(s.clone()),
        Node::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Accepts RFC 3339, a naive `YYYY-MM-DDTHH:MM:SS[.f]` (taken as UTC) or a
/// bare `YYYY-MM-DD`.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(dt.and_utc());
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .map(|date| date.and_time(NaiveTime::MIN).and_utc())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;
    use crate::domain::resolve;

    fn mapping() -> FieldMapping {
        FieldMapping {
            category: Some("customer.name".to_string()),
            ..FieldMapping::default()
        }
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 3, 5, 10, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2024-03-05T10:30:00Z"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-05T12:30:00+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-05T10:30:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-03-05T10:30:00.000"), Some(expected));
        assert_eq!(
            parse_timestamp("2024-03-05"),
            Some(Utc.with_ymd_and_hms(2024, 3, 5, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_timestamp("05/03/2024"), None);
    }

    #[test]
    fn test_extract_through_shared_customer() {
        let graph = resolve(&json!({"$values": [
            {"id": 1, "createdAt": "2024-03-05", "status": " Approved ", "total": 100.5,
             "customer": {"$id": "c1", "name": "Acme"}},
            {"id": 2, "createdAt": "2024-03-06", "status": "pending", "total": "50",
             "customer": {"$ref": "c1"}}
        ]}));
        let events = mapping().events(&graph);

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].id, "1");
        assert_eq!(events[0].status, "approved");
        assert_eq!(events[0].amount, 10050);
        assert_eq!(events[1].amount, 5000);
        assert_eq!(events[1].category.as_deref(), Some("Acme"));
    }

    #[test]
    fn test_malformed_records_are_excluded() {
        let graph = resolve(&json!([
            {"id": "ok", "createdAt": "2024-03-05", "status": "approved"},
            {"id": "no-date", "status": "approved", "total": 1},
            {"id": "bad-date", "createdAt": "yesterday", "status": "approved"},
            {"id": "negative", "createdAt": "2024-03-05", "status": "approved", "total": -3},
            {"id": "blank-status", "createdAt": "2024-03-05", "status": "  "},
            {"createdAt": "2024-03-05", "status": "approved"}
        ]));
        let events = mapping().events(&graph);

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "ok");
        assert_eq!(events[0].amount, 0);
        // no customer field, so no category
        assert_eq!(events[0].category, None);
    }

    #[test]
    fn test_records_path() {
        let graph = resolve(&json!({"data": {"$values": [
            {"id": "a", "createdAt": "2024-03-05", "status": "approved"}
        ]}}));
        let mapping = FieldMapping {
            records: Some("data".to_string()),
            ..FieldMapping::default()
        };
        assert_eq!(mapping.events(&graph).len(), 1);
        assert_eq!(FieldMapping::default().events(&graph).len(), 0);
    }
}
