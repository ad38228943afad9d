use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error body returned by the shop API on non-2xx responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("invalid price range {lower}..={upper}; bounds must satisfy 0 <= lower <= upper <= {max}")]
    InvalidPriceRange { lower: i64, upper: i64, max: u32 },
    #[error("unknown facet group '{0}'")]
    UnknownFacetGroup(String),
    #[error("unknown sort order '{0}'")]
    UnknownSortOrder(String),
}
