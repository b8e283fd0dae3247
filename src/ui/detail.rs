use crate::app::App;
use crate::ui::card::format_relative_time;
use crate::util::sanitize;
use chrono::Utc;
use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Wrap},
    Frame,
};

/// Render the single-bookmark view
pub fn render(f: &mut Frame, app: &App, area: Rect) {
    // Layout may produce zero-sized rects during extreme terminal resizes
    if area.width < 3 || area.height < 3 {
        return;
    }

    let Some(detail) = app.detail.as_ref() else {
        return;
    };
    let bookmark = detail.bookmark();

    let label = Style::default().fg(Color::DarkGray);
    let mut lines = vec![
        Line::from(Span::styled(
            sanitize(bookmark.display_title()).into_owned(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];

    if let Some(url) = bookmark.url.as_deref() {
        lines.push(Line::from(vec![
            Span::styled("URL      ", label),
            Span::styled(sanitize(url).into_owned(), Style::default().fg(Color::Blue)),
        ]));
    }
    if !bookmark.tags.is_empty() {
        let tags = bookmark
            .tags
            .iter()
            .map(|t| format!("#{}", sanitize(t)))
            .collect::<Vec<_>>()
            .join(" ");
        lines.push(Line::from(vec![
            Span::styled("Tags     ", label),
            Span::styled(tags, Style::default().fg(Color::Cyan)),
        ]));
    }

    let mut flags = Vec::new();
    if bookmark.favourited {
        flags.push("★ favourited");
    }
    if bookmark.archived {
        flags.push("archived");
    }
    if !flags.is_empty() {
        lines.push(Line::from(vec![
            Span::styled("Status   ", label),
            Span::raw(flags.join(", ")),
        ]));
    }

    if let Some(created) = bookmark.created_at {
        lines.push(Line::from(vec![
            Span::styled("Added    ", label),
            Span::raw(format!(
                "{} ({})",
                created.format("%Y-%m-%d %H:%M"),
                format_relative_time(Some(created), Utc::now())
            )),
        ]));
    }

    if let Some(note) = bookmark.note.as_deref().filter(|n| !n.trim().is_empty()) {
        lines.push(Line::from(""));
        // Keep the note's own line breaks
        for line in note.lines() {
            lines.push(Line::from(sanitize(line).into_owned()));
        }
    }

    let mut title = String::from(" Bookmark ");
    if detail.refreshing() {
        title.push_str("⟳ ");
    }

    let paragraph = Paragraph::new(lines)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::Cyan))
                .title(title),
        )
        .wrap(Wrap { trim: false });
    f.render_widget(paragraph, area);
}
