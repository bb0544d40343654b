use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Cents, NodeView};

/// Category label used when an event carries no category.
pub const UNSPECIFIED_CATEGORY: &str = "unspecified";

/// A single timestamped business event (one quotation, one budget version...).
///
/// Events are produced once per resolved record by a caller-supplied
/// extraction function and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub status: String,
    /// Never negative.
    pub amount: Cents,
    pub category: Option<String>,
}

impl Event {
    pub fn new(
        id: impl Into<String>,
        timestamp: DateTime<Utc>,
        status: impl Into<String>,
        amount: Cents,
    ) -> Self {
        debug_assert!(amount >= 0, "event amounts are never negative");
        Self {
            id: id.into(),
            timestamp,
            status: status.into(),
            amount,
            category: None,
        }
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Category used for tallies, falling back to [`UNSPECIFIED_CATEGORY`].
    pub fn category_label(&self) -> &str {
        self.category.as_deref().unwrap_or(UNSPECIFIED_CATEGORY)
    }
}

/// The set of statuses that count as a conversion (e.g. `{"approved"}`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AcceptedStatuses(BTreeSet<String>);

impl AcceptedStatuses {
    pub fn new<I, S>(statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(statuses.into_iter().map(Into::into).collect())
    }

    pub fn contains(&self, status: &str) -> bool {
        self.0.contains(status)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for AcceptedStatuses {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter)
    }
}

/// Run a caller-supplied extractor over the records of a resolved payload
/// (usually [`ResolvedGraph::records`]).
///
/// Records for which the extractor returns `None`, or an event with a negative
/// amount, are left out of the aggregation instead of aborting it.
pub fn extract_events<'g, F>(records: Vec<NodeView<'g>>, mut extract: F) -> Vec<Event>
where
    F: FnMut(NodeView<'g>) -> Option<Event>,
{
    let total = records.len();
    let events: Vec<Event> = records
        .into_iter()
        .filter_map(&mut extract)
        .filter(|event| event.amount >= 0)
        .collect();

    if events.len() < total {
        debug!(
            excluded = total - events.len(),
            total, "records without a usable event were excluded"
        );
    }
    events
}
