//! Terminal User Interface module.
//!
//! # Module Structure
//!
//! - `loop_runner` - Main event loop and terminal management
//! - `input` - Keyboard input handling
//! - `render` - View rendering dispatch
//! - `bookmarks` - Bookmark list widget (loading / empty / populated)
//! - `card` - One bookmark card
//! - `detail` - Single-bookmark view
//! - `status` - Status bar widget

mod bookmarks;
mod card;
mod detail;
mod input;
mod loop_runner;
mod render;
mod status;

pub use bookmarks::render_presentation;
pub use loop_runner::{run, Action};
