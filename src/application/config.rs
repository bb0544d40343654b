//! Report configuration.
//!
//! Loaded from a TOML file such as:
//!
//! ```toml
//! accepted_statuses = ["approved"]
//! top_n = 10
//! rank_by = "amount"
//!
//! [fields]
//! records = "items"
//! timestamp = "createdAt"
//! amount = "total"
//! category = "customer.name"
//! ```
//!
//! Every key is optional. Command-line flags override file values.

use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{AppError, FieldMapping};
use crate::domain::{AcceptedStatuses, RankBy, Ranking};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Statuses that count as a conversion.
    pub accepted_statuses: Vec<String>,
    /// Number of categories in the ranking; 0 keeps them all.
    pub top_n: usize,
    pub rank_by: RankBy,
    pub fields: FieldMapping,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            accepted_statuses: vec!["approved".to_string()],
            top_n: 10,
            rank_by: RankBy::Amount,
            fields: FieldMapping::default(),
        }
    }
}

impl ReportConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, AppError> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Accepted statuses, normalized the same way extracted statuses are.
    pub fn accepted(&self) -> AcceptedStatuses {
        self.accepted_statuses
            .iter()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect()
    }

    pub fn ranking(&self) -> Ranking {
        Ranking {
            by: self.rank_by,
            limit: (self.top_n > 0).then_some(self.top_n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_empty() {
        let config = ReportConfig::from_toml_str("").unwrap();
        assert_eq!(config, ReportConfig::default());
        assert!(config.accepted().contains("approved"));
        assert_eq!(config.ranking(), Ranking::default());
    }

    #[test]
    fn test_partial_file() {
        let config = ReportConfig::from_toml_str(
            r#"
            accepted_statuses = ["Approved", "invoiced", " "]
            top_n = 0
            rank_by = "count"

            [fields]
            amount = "version.total"
            category = "customer.name"
            "#,
        )
        .unwrap();

        let accepted = config.accepted();
        assert_eq!(accepted.iter().collect::<Vec<_>>(), vec!["approved", "invoiced"]);
        assert_eq!(config.ranking().limit, None);
        assert_eq!(config.ranking().by, RankBy::Count);
        assert_eq!(config.fields.amount, "version.total");
        assert_eq!(config.fields.timestamp, "createdAt");
        assert_eq!(config.fields.category.as_deref(), Some("customer.name"));
    }

    #[test]
    fn test_invalid_file() {
        let result = ReportConfig::from_toml_str("rank_by = \"profit\"");
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
