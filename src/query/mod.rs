//! Request cache shared across screens.
//!
//! # Module Structure
//!
//! - `state` - [`SubscriptionState`], the tagged state a subscriber observes
//! - `namespace` - [`Namespace`] and the [`Invalidator`] capability
//! - `cache` - [`QueryCache`] and [`Subscription`]
//! - `client` - [`QueryClient`], the caches for the bookmarks API

mod cache;
mod client;
mod namespace;
mod state;

pub use cache::{CacheKey, CacheOptions, CacheValue, QueryCache, Subscription, DEFAULT_CAPACITY};
pub use client::QueryClient;
pub use namespace::{Invalidator, Namespace};
pub use state::SubscriptionState;
