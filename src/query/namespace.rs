use std::fmt;

/// Group of cached results that share an operation, regardless of parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// List queries, keyed by filter criteria.
    GetBookmarks,
    /// Single-bookmark lookups, keyed by id.
    GetBookmark,
}

impl Namespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::GetBookmarks => "getBookmarks",
            Namespace::GetBookmark => "getBookmark",
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Capability to mark every cached entry of a namespace stale.
///
/// Implementations must not block: refetches triggered by an invalidation are
/// reported later through the affected subscriptions.
pub trait Invalidator: Send + Sync {
    fn invalidate(&self, namespace: Namespace);
}
