use crate::api::BookmarkSummary;
use crate::app::App;
use crate::list::Presentation;
use chrono::Utc;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame,
};

use super::card;

/// Horizontal margin around the list column.
const LIST_MARGIN: u16 = 2;
/// Cards never grow wider than this.
const MAX_LIST_WIDTH: u16 = 100;

/// Render the bookmark list for the current screen.
pub fn render(f: &mut Frame, app: &App, area: Rect) {
    let mut title = format!(" {} ({}) ", app.screen.label(), app.list.criteria().describe());
    if app.list.refreshing() {
        title.push_str("⟳ ");
    }
    render_presentation(f, area, app.list.presentation(), app.selected, &title);
}

/// Draw one of the three presentation states into `area`.
pub fn render_presentation(
    f: &mut Frame,
    area: Rect,
    presentation: Presentation<'_>,
    selected: usize,
    title: &str,
) {
    if area.width < 1 || area.height < 1 {
        return;
    }
    match presentation {
        Presentation::Loading => {
            // TODO: render a spinner while the first fetch is pending.
        }
        Presentation::Empty => render_empty(f, area),
        Presentation::Populated(bookmarks) => {
            render_cards(f, centered_column(area), bookmarks, selected, title)
        }
    }
}

fn render_empty(f: &mut Frame, area: Rect) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Fill(1),
            Constraint::Length(1),
            Constraint::Fill(1),
        ])
        .split(area);
    let text = Paragraph::new("No Bookmarks")
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::DarkGray));
    f.render_widget(text, rows[1]);
}

fn render_cards(
    f: &mut Frame,
    area: Rect,
    bookmarks: &[BookmarkSummary],
    selected: usize,
    title: &str,
) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan))
        .title(Line::from(title.to_string()));
    let inner_width = block.inner(area).width.saturating_sub(2);

    let now = Utc::now();
    let items: Vec<ListItem> = bookmarks
        .iter()
        .map(|bookmark| ListItem::new(card::card_lines(bookmark, inner_width, now)))
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("▌ ");

    let selected = selected.min(bookmarks.len().saturating_sub(1));
    let mut state = ListState::default().with_selected(Some(selected));
    f.render_stateful_widget(list, area, &mut state);
}

/// Centered column of at most `MAX_LIST_WIDTH` columns with side margins.
fn centered_column(area: Rect) -> Rect {
    let width = area
        .width
        .saturating_sub(LIST_MARGIN * 2)
        .min(MAX_LIST_WIDTH)
        .max(1);
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    Rect::new(x, area.y, width.min(area.width), area.height)
}
