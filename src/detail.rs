//! Single-bookmark screen state, backed by the `getBookmark` cache.
//!
//! A list refresh invalidates that namespace too, so an open detail screen
//! refetches alongside the list.

use crate::api::BookmarkSummary;
use crate::query::{QueryCache, Subscription, SubscriptionState};

pub struct BookmarkDetail {
    subscription: Subscription<String, BookmarkSummary>,
    state: SubscriptionState<BookmarkSummary>,
    /// Row from the list, shown until the single-item query has data.
    preview: BookmarkSummary,
}

impl BookmarkDetail {
    pub fn open(cache: &QueryCache<String, BookmarkSummary>, preview: BookmarkSummary) -> Self {
        tracing::debug!(id = %preview.id, "Opening bookmark detail");
        let subscription = cache.subscribe(preview.id.clone());
        let mut detail = Self {
            subscription,
            state: SubscriptionState::Pending,
            preview,
        };
        detail.poll_states();
        detail
    }

    pub fn id(&self) -> &str {
        self.subscription.key()
    }

    pub fn apply(&mut self, state: SubscriptionState<BookmarkSummary>) {
        self.state = state;
    }

    pub fn poll_states(&mut self) -> bool {
        let mut applied = false;
        while let Some(state) = self.subscription.try_next() {
            self.apply(state);
            applied = true;
        }
        applied
    }

    /// Cancel-safe wait for the next state.
    pub async fn next_state(&mut self) -> Option<SubscriptionState<BookmarkSummary>> {
        self.subscription.next().await
    }

    pub fn refreshing(&self) -> bool {
        self.state.is_refreshing()
    }

    /// Freshest record available: the query's data, else the list row.
    pub fn bookmark(&self) -> &BookmarkSummary {
        self.state
            .data()
            .map(|data| data.as_ref())
            .unwrap_or(&self.preview)
    }
}
