use std::fmt;
use std::sync::Arc;

/// State of one cache subscription, as seen by its consumer.
///
/// The variant alone decides whether a consumer shows a refresh indicator;
/// see [`SubscriptionState::is_refreshing`].
pub enum SubscriptionState<V> {
    /// No data to show yet; the first fetch for the key is in flight.
    Pending,
    /// Data from an earlier key, or a stale copy of this key's entry, is
    /// being shown while a fetch for the current key is in flight.
    PlaceholderServing(Arc<V>),
    /// Data matches the current key.
    Settled(Arc<V>),
}

impl<V> SubscriptionState<V> {
    pub fn data(&self) -> Option<&Arc<V>> {
        match self {
            SubscriptionState::Pending => None,
            SubscriptionState::PlaceholderServing(data) | SubscriptionState::Settled(data) => {
                Some(data)
            }
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, SubscriptionState::Pending)
    }

    pub fn is_placeholder_data(&self) -> bool {
        matches!(self, SubscriptionState::PlaceholderServing(_))
    }

    pub fn is_settled(&self) -> bool {
        matches!(self, SubscriptionState::Settled(_))
    }

    /// True while the consumer is waiting on a fetch.
    pub fn is_refreshing(&self) -> bool {
        self.is_pending() || self.is_placeholder_data()
    }

    pub fn label(&self) -> &'static str {
        match self {
            SubscriptionState::Pending => "pending",
            SubscriptionState::PlaceholderServing(_) => "placeholder",
            SubscriptionState::Settled(_) => "settled",
        }
    }
}

// Manual impls: derives would demand `V: Clone` / `V: Debug` even though only
// the `Arc` is cloned.
impl<V> Clone for SubscriptionState<V> {
    fn clone(&self) -> Self {
        match self {
            SubscriptionState::Pending => SubscriptionState::Pending,
            SubscriptionState::PlaceholderServing(data) => {
                SubscriptionState::PlaceholderServing(Arc::clone(data))
            }
            SubscriptionState::Settled(data) => SubscriptionState::Settled(Arc::clone(data)),
        }
    }
}

impl<V> fmt::Debug for SubscriptionState<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}
