use serde::{Deserialize, Serialize};

use crate::entity::DynamicEntity;

/// Cursor returned by a segmented query when more results exist.
///
/// Must be handed back verbatim to fetch the next page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContinuationToken {
    pub next_partition_key: String,
    pub next_row_key: Option<String>,
}

impl ContinuationToken {
    pub fn new(next_partition_key: impl Into<String>, next_row_key: Option<String>) -> Self {
        Self {
            next_partition_key: next_partition_key.into(),
            next_row_key,
        }
    }
}

/// One page of a segmented query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerySegment {
    pub entities: Vec<DynamicEntity>,
    pub continuation: Option<ContinuationToken>,
}

/// Filter applied to a segmented query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryFilter {
    /// Every entity in the table.
    All,
    /// Entities whose PartitionKey equals the given value.
    PartitionKey(String),
}

impl QueryFilter {
    /// Renders the filter as an OData `$filter` expression, if any.
    ///
    /// Single quotes inside the value are doubled as OData string literals require.
    pub fn to_odata(&self) -> Option<String> {
        match self {
            QueryFilter::All => None,
            QueryFilter::PartitionKey(pk) => {
                Some(format!("PartitionKey eq '{}'", pk.replace('\'', "''")))
            }
        }
    }

    /// Whether the entity with this partition key passes the filter.
    pub fn matches(&self, partition_key: &str) -> bool {
        match self {
            QueryFilter::All => true,
            QueryFilter::PartitionKey(pk) => pk == partition_key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_filter_has_no_odata_expression() {
        assert_eq!(QueryFilter::All.to_odata(), None);
    }

    #[test]
    fn test_partition_filter_renders_equality() {
        let filter = QueryFilter::PartitionKey("u1".to_string());
        assert_eq!(filter.to_odata().unwrap(), "PartitionKey eq 'u1'");
    }

    #[test]
    fn test_partition_filter_escapes_quotes() {
        let filter = QueryFilter::PartitionKey("o'brien".to_string());
        assert_eq!(filter.to_odata().unwrap(), "PartitionKey eq 'o''brien'");
    }

    #[test]
    fn test_filter_matches() {
        let filter = QueryFilter::PartitionKey("u1".to_string());
        assert!(filter.matches("u1"));
        assert!(!filter.matches("u2"));
        assert!(QueryFilter::All.matches("anything"));
    }
}
