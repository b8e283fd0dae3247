use std::sync::Arc;

use super::cache::{CacheOptions, QueryCache};
use super::namespace::{Invalidator, Namespace};
use crate::api::{BookmarkSource, BookmarkSummary, FilterCriteria, QueryResult};

/// The app-wide query client: one cache per namespace over a shared source.
///
/// Clone it (or wrap it in an `Arc`) to hand the same caches to every screen.
#[derive(Clone)]
pub struct QueryClient {
    bookmarks: QueryCache<FilterCriteria, QueryResult>,
    bookmark: QueryCache<String, BookmarkSummary>,
}

impl QueryClient {
    pub fn new(source: Arc<dyn BookmarkSource>, options: CacheOptions) -> Self {
        let list_source = Arc::clone(&source);
        let bookmarks = QueryCache::new(
            Namespace::GetBookmarks,
            move |criteria: FilterCriteria| list_source.get_bookmarks(criteria),
            options.clone(),
        );
        let bookmark = QueryCache::new(
            Namespace::GetBookmark,
            move |id: String| source.get_bookmark(id),
            options,
        );
        Self {
            bookmarks,
            bookmark,
        }
    }

    /// List queries, keyed by filter criteria.
    pub fn bookmarks(&self) -> &QueryCache<FilterCriteria, QueryResult> {
        &self.bookmarks
    }

    /// Single-bookmark lookups, keyed by id.
    pub fn bookmark(&self) -> &QueryCache<String, BookmarkSummary> {
        &self.bookmark
    }
}

impl Invalidator for QueryClient {
    fn invalidate(&self, namespace: Namespace) {
        tracing::debug!(namespace = %namespace, "Invalidating");
        match namespace {
            Namespace::GetBookmarks => self.bookmarks.invalidate_all(),
            Namespace::GetBookmark => self.bookmark.invalidate_all(),
        }
    }
}
