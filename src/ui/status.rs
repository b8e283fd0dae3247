use crate::app::{App, View};
use ratatui::{
    layout::Rect,
    style::{Color, Style},
    widgets::Paragraph,
    Frame,
};
use std::borrow::Cow;

const LIST_HINTS: &str = "[j/k]move [Enter]open [Tab]screen [r]efresh [o]pen url [?]help [q]uit";
const DETAIL_HINTS: &str = "[b/Esc]back [r]efresh [o]pen url [?]help [q]uit";
const HELP: &str =
    "j/k ↑/↓ move · g/G first/last · Enter details · Esc/b back · Tab next screen · r refresh · o open in browser · q quit";

/// Render the status bar
pub fn render(f: &mut Frame, app: &App, area: Rect) {
    if area.width < 1 || area.height < 1 {
        return;
    }

    let text: Cow<'_, str> = if app.show_help {
        Cow::Borrowed(HELP)
    } else if let Some((msg, _)) = &app.status_message {
        Cow::Borrowed(msg.as_ref())
    } else if app.refreshing() {
        Cow::Borrowed("Refreshing...")
    } else {
        match app.view {
            View::List => Cow::Owned(format!("{} bookmarks | {}", app.bookmarks().len(), LIST_HINTS)),
            View::Detail => Cow::Borrowed(DETAIL_HINTS),
        }
    };

    let style = Style::default().bg(Color::DarkGray).fg(Color::White);
    f.render_widget(Paragraph::new(text).style(style), area);
}
