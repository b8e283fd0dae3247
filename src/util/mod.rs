//! Utility functions for rendering and opening bookmarks.
//!
//! - **Text**: Unicode-aware width, truncation, and control-character stripping
//! - **URLs**: Scheme check before launching the system browser

mod text;
mod url_validator;

pub use text::{display_width, sanitize, truncate_to_width};
pub use url_validator::validate_url_for_open;
