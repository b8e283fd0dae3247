use crate::api::BookmarkSummary;
use crate::util::{sanitize, truncate_to_width};
use chrono::{DateTime, Utc};
use ratatui::{
    style::{Color, Modifier, Style},
    text::{Line, Span},
};

/// Blank lines drawn below each card.
pub const CARD_GAP: usize = 1;

/// Format timestamp relative to `now`
pub fn format_relative_time(timestamp: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    let Some(ts) = timestamp else {
        return String::new();
    };

    let diff = (now - ts).num_seconds();

    // Clock skew between us and the server
    if diff < 60 {
        return "now".to_string();
    }
    if diff < 3600 {
        return format!("{}m", diff / 60);
    }
    if diff < 86400 {
        return format!("{}h", diff / 3600);
    }
    if diff < 604800 {
        return format!("{}d", diff / 86400);
    }
    if ts.format("%Y").to_string() == now.format("%Y").to_string() {
        ts.format("%b %d").to_string()
    } else {
        ts.format("%b %d %Y").to_string()
    }
}

/// Lines for one bookmark card, `width` columns wide, followed by the gap.
pub fn card_lines(bookmark: &BookmarkSummary, width: u16, now: DateTime<Utc>) -> Vec<Line<'static>> {
    let width = width as usize;
    let mut lines = Vec::with_capacity(3 + CARD_GAP);

    // Title line: star, title, archived marker
    let mut spans = Vec::new();
    let mut used = 0;
    if bookmark.favourited {
        spans.push(Span::styled("★ ", Style::default().fg(Color::Yellow)));
        used += 2;
    }
    let suffix = if bookmark.archived { " [archived]" } else { "" };
    let title = sanitize(bookmark.display_title());
    let title = truncate_to_width(&title, width.saturating_sub(used + suffix.len()));
    spans.push(Span::styled(
        title.into_owned(),
        Style::default().add_modifier(Modifier::BOLD),
    ));
    if !suffix.is_empty() {
        spans.push(Span::styled(suffix, Style::default().fg(Color::DarkGray)));
    }
    lines.push(Line::from(spans));

    if let Some(url) = bookmark.url.as_deref() {
        let url = sanitize(url);
        lines.push(Line::from(Span::styled(
            truncate_to_width(&url, width).into_owned(),
            Style::default().fg(Color::Blue),
        )));
    }

    let age = format_relative_time(bookmark.created_at, now);
    let tags = bookmark
        .tags
        .iter()
        .map(|t| format!("#{}", sanitize(t)))
        .collect::<Vec<_>>()
        .join(" ");
    if !tags.is_empty() || !age.is_empty() {
        let mut meta = Vec::new();
        if !tags.is_empty() {
            let room = width.saturating_sub(age.len() + 2);
            meta.push(Span::styled(
                truncate_to_width(&tags, room).into_owned(),
                Style::default().fg(Color::Cyan),
            ));
            meta.push(Span::raw("  "));
        }
        meta.push(Span::styled(age, Style::default().fg(Color::DarkGray)));
        lines.push(Line::from(meta));
    }

    lines.extend(std::iter::repeat_with(Line::default).take(CARD_GAP));
    lines
}
