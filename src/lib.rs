//! Terminal bookmark list backed by a shared, invalidatable query cache.
//!
//! - `api` - HTTP client for the bookmarks server
//! - `query` - Per-namespace caches with subscriptions and invalidation
//! - `list` - The bookmark list component
//! - `detail` - The single-bookmark component
//! - `app` - Screen, selection, and view state
//! - `ui` - Terminal rendering and the event loop
//! - `config` - `config.toml` loading

pub mod api;
pub mod app;
pub mod config;
pub mod detail;
pub mod list;
pub mod query;
pub mod ui;
pub mod util;
