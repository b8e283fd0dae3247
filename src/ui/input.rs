//! Keyboard input handling for the list and detail views.

use crate::app::{App, View};
use crate::util::validate_url_for_open;
use anyhow::Result;
use crossterm::event::{KeyCode, KeyModifiers};

use super::Action;

/// Main input dispatch function.
pub(super) fn handle_input(app: &mut App, code: KeyCode, modifiers: KeyModifiers) -> Result<Action> {
    if code == KeyCode::Char('c') && modifiers.contains(KeyModifiers::CONTROL) {
        return Ok(Action::Quit);
    }

    // Keys shared by both views
    match code {
        KeyCode::Char('q') => return Ok(Action::Quit),
        KeyCode::Char('?') => {
            app.show_help = !app.show_help;
            return Ok(Action::Continue);
        }
        KeyCode::Char('r') => {
            app.refresh();
            return Ok(Action::Continue);
        }
        KeyCode::Char('o') => {
            open_current(app);
            return Ok(Action::Continue);
        }
        _ => {}
    }

    match app.view {
        View::List => handle_list_input(app, code),
        View::Detail => handle_detail_input(app, code),
    }
    Ok(Action::Continue)
}

fn handle_list_input(app: &mut App, code: KeyCode) {
    match code {
        KeyCode::Char('j') | KeyCode::Down => app.select_next(),
        KeyCode::Char('k') | KeyCode::Up => app.select_prev(),
        KeyCode::Char('g') | KeyCode::Home => app.select_first(),
        KeyCode::Char('G') | KeyCode::End => app.select_last(),
        KeyCode::Enter => app.open_selected(),
        KeyCode::Tab => app.cycle_screen(),
        KeyCode::Esc => app.show_help = false,
        _ => {}
    }
}

fn handle_detail_input(app: &mut App, code: KeyCode) {
    if matches!(code, KeyCode::Esc | KeyCode::Char('b')) {
        app.close_detail();
    }
}

/// Open the bookmark under the cursor (or on the detail screen) in the browser.
fn open_current(app: &mut App) {
    let Some(url) = app.current_bookmark().and_then(|b| b.url.clone()) else {
        app.set_status("Bookmark has no URL");
        return;
    };
    // Validate URL before open::that() to prevent command injection
    match validate_url_for_open(&url) {
        Err(e) => app.set_status(e),
        Ok(parsed) => match open::that(parsed.as_str()) {
            Ok(()) => app.set_status(format!("Opening {}", parsed.host_str().unwrap_or("link"))),
            Err(e) => {
                tracing::warn!(error = %e, "Failed to open browser");
                app.set_status(format!("Failed to open browser: {}", e));
            }
        },
    }
}
