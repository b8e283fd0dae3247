//! The bookmark list component.
//!
//! [`BookmarkList`] owns one subscription to the `getBookmarks` cache keyed by
//! the current [`FilterCriteria`]. It keeps the latest [`SubscriptionState`],
//! derives the refresh flag from it, and exposes what should be drawn as a
//! [`Presentation`]. Refreshing goes through an injected [`Invalidator`]
//! rather than through the cache directly.
//!
//! Dropping the component drops its subscription, so no further states are
//! delivered once it is gone.

use std::sync::Arc;

use crate::api::{BookmarkSummary, FilterCriteria, QueryResult};
use crate::query::{Invalidator, Namespace, QueryCache, Subscription, SubscriptionState};

/// What the list screen should draw for the current state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Presentation<'a> {
    /// No data has arrived yet.
    Loading,
    /// Data arrived and holds no bookmarks.
    Empty,
    /// Bookmarks in server order.
    Populated(&'a [BookmarkSummary]),
}

pub struct BookmarkList {
    subscription: Subscription<FilterCriteria, QueryResult>,
    state: SubscriptionState<QueryResult>,
    refreshing: bool,
    invalidator: Arc<dyn Invalidator>,
}

impl BookmarkList {
    /// Subscribe to `criteria` and take the cache's first state.
    pub fn mount(
        cache: &QueryCache<FilterCriteria, QueryResult>,
        invalidator: Arc<dyn Invalidator>,
        criteria: FilterCriteria,
    ) -> Self {
        tracing::debug!(criteria = %criteria.describe(), "Mounting bookmark list");
        let subscription = cache.subscribe(criteria);
        let mut list = Self {
            subscription,
            state: SubscriptionState::Pending,
            refreshing: true,
            invalidator,
        };
        list.poll_states();
        list
    }

    pub fn criteria(&self) -> &FilterCriteria {
        self.subscription.key()
    }

    /// Replace the filter criteria.
    ///
    /// Re-subscribes only when `criteria` differs by value from the current
    /// criteria; returns whether it did.
    pub fn set_criteria(&mut self, criteria: FilterCriteria) -> bool {
        if !self.subscription.set_key(criteria) {
            return false;
        }
        tracing::debug!(criteria = %self.criteria().describe(), "Bookmark list criteria changed");
        self.poll_states();
        true
    }

    /// Record a new subscription state and recompute the refresh flag.
    pub fn apply(&mut self, state: SubscriptionState<QueryResult>) {
        self.refreshing = state.is_refreshing();
        self.state = state;
    }

    /// Apply every state already queued, without waiting. Returns whether any
    /// state was applied.
    pub fn poll_states(&mut self) -> bool {
        let mut applied = false;
        while let Some(state) = self.subscription.try_next() {
            self.apply(state);
            applied = true;
        }
        applied
    }

    /// Wait for the next state from the cache. Cancel-safe, so it can sit in
    /// a `select!` branch; the caller passes the result to [`Self::apply`].
    pub async fn next_state(&mut self) -> Option<SubscriptionState<QueryResult>> {
        self.subscription.next().await
    }

    pub fn state(&self) -> &SubscriptionState<QueryResult> {
        &self.state
    }

    /// Whether the list widget should show its refresh indicator.
    pub fn refreshing(&self) -> bool {
        self.refreshing
    }

    pub fn is_pending(&self) -> bool {
        self.state.is_pending()
    }

    pub fn is_placeholder_data(&self) -> bool {
        self.state.is_placeholder_data()
    }

    pub fn bookmarks(&self) -> &[BookmarkSummary] {
        self.state
            .data()
            .map(|data| data.bookmarks.as_slice())
            .unwrap_or(&[])
    }

    pub fn presentation(&self) -> Presentation<'_> {
        match self.state.data() {
            None => Presentation::Loading,
            Some(data) if data.bookmarks.is_empty() => Presentation::Empty,
            Some(data) => Presentation::Populated(&data.bookmarks),
        }
    }

    /// Mark the list and single-bookmark caches stale so every screen reading
    /// either one refetches. Returns immediately.
    pub fn on_refresh(&self) {
        tracing::info!(criteria = %self.criteria().describe(), "Refresh requested");
        self.invalidator.invalidate(Namespace::GetBookmarks);
        self.invalidator.invalidate(Namespace::GetBookmark);
    }
}
