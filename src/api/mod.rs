//! Remote bookmarks API.
//!
//! - `types` - Filter criteria and bookmark records
//! - `client` - HTTP client and the [`BookmarkSource`] seam used by the query cache

mod client;
mod types;

pub use client::{ApiClient, ApiError, ApiOptions, BookmarkSource};
pub use types::{BookmarkSummary, FilterCriteria, QueryResult};
