use crate::api::{BookmarkSummary, FilterCriteria, QueryResult};
use crate::detail::BookmarkDetail;
use crate::list::BookmarkList;
use crate::query::{Invalidator, QueryClient, SubscriptionState};
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Seconds a status message stays visible.
const STATUS_TTL_SECS: u64 = 3;

/// The parent screen supplying the list's filter criteria.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    Home,
    Favourites,
    Archive,
    /// Criteria given on the command line.
    Custom(FilterCriteria),
}

impl Screen {
    pub fn criteria(&self) -> FilterCriteria {
        match self {
            Screen::Home => FilterCriteria {
                archived: Some(false),
                ..FilterCriteria::default()
            },
            Screen::Favourites => FilterCriteria {
                favourited: Some(true),
                ..FilterCriteria::default()
            },
            Screen::Archive => FilterCriteria {
                archived: Some(true),
                ..FilterCriteria::default()
            },
            Screen::Custom(criteria) => criteria.clone(),
        }
    }

    /// Tab order. A custom screen cycles back into the fixed screens.
    pub fn next(&self) -> Screen {
        match self {
            Screen::Home => Screen::Favourites,
            Screen::Favourites => Screen::Archive,
            Screen::Archive | Screen::Custom(_) => Screen::Home,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Screen::Home => "Home",
            Screen::Favourites => "Favourites",
            Screen::Archive => "Archive",
            Screen::Custom(_) => "Bookmarks",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    List,
    Detail,
}

pub struct App {
    pub client: Arc<QueryClient>,
    pub list: BookmarkList,
    pub detail: Option<BookmarkDetail>,
    pub screen: Screen,
    pub view: View,
    pub selected: usize,
    /// Id of the selected bookmark; the selection index follows it when the
    /// list data changes.
    selected_id: Option<String>,
    pub needs_redraw: bool,
    pub status_message: Option<(Cow<'static, str>, Instant)>,
    pub show_help: bool,
    refresh_interval: Option<Duration>,
    last_refresh: Instant,
}

impl App {
    pub fn new(client: Arc<QueryClient>, screen: Screen, refresh_interval: Option<Duration>) -> Self {
        let invalidator = Arc::clone(&client) as Arc<dyn Invalidator>;
        let list = BookmarkList::mount(client.bookmarks(), invalidator, screen.criteria());
        let mut app = Self {
            client,
            list,
            detail: None,
            screen,
            view: View::List,
            selected: 0,
            selected_id: None,
            needs_redraw: true,
            status_message: None,
            show_help: false,
            refresh_interval,
            last_refresh: Instant::now(),
        };
        app.reselect();
        app
    }

    pub fn bookmarks(&self) -> &[BookmarkSummary] {
        self.list.bookmarks()
    }

    pub fn selected_bookmark(&self) -> Option<&BookmarkSummary> {
        self.bookmarks().get(self.selected)
    }

    /// Apply a list state delivered by the event loop.
    pub fn apply_list_state(&mut self, state: SubscriptionState<QueryResult>) {
        tracing::trace!(state = state.label(), "List state");
        self.list.apply(state);
        self.reselect();
        self.needs_redraw = true;
    }

    pub fn apply_detail_state(&mut self, state: SubscriptionState<BookmarkSummary>) {
        if let Some(detail) = self.detail.as_mut() {
            detail.apply(state);
            self.needs_redraw = true;
        }
    }

    /// Apply any states already queued on the list and detail subscriptions.
    pub fn poll_states(&mut self) -> bool {
        let mut changed = self.list.poll_states();
        if changed {
            self.reselect();
        }
        if let Some(detail) = self.detail.as_mut() {
            changed |= detail.poll_states();
        }
        if changed {
            self.needs_redraw = true;
        }
        changed
    }

    /// Keep the selection on the same bookmark id, or clamp it when that
    /// bookmark is gone.
    fn reselect(&mut self) {
        let len = self.list.bookmarks().len();
        if let Some(index) = self.selected_id.as_deref().and_then(|id| {
            self.list.bookmarks().iter().position(|b| b.id == id)
        }) {
            self.selected = index;
        } else {
            self.selected = self.selected.min(len.saturating_sub(1));
        }
        self.selected_id = self.list.bookmarks().get(self.selected).map(|b| b.id.clone());
    }

    fn select(&mut self, index: usize) {
        let len = self.bookmarks().len();
        if len == 0 {
            return;
        }
        self.selected = index.min(len - 1);
        self.selected_id = self.bookmarks().get(self.selected).map(|b| b.id.clone());
    }

    pub fn select_next(&mut self) {
        self.select(self.selected.saturating_add(1));
    }

    pub fn select_prev(&mut self) {
        self.select(self.selected.saturating_sub(1));
    }

    pub fn select_first(&mut self) {
        self.select(0);
    }

    pub fn select_last(&mut self) {
        self.select(usize::MAX);
    }

    /// Switch to the next screen and hand its criteria to the list.
    pub fn cycle_screen(&mut self) {
        self.set_screen(self.screen.next());
    }

    pub fn set_screen(&mut self, screen: Screen) {
        tracing::debug!(from = self.screen.label(), to = screen.label(), "Switching screen");
        let criteria = screen.criteria();
        self.screen = screen;
        if self.list.set_criteria(criteria) {
            self.reselect();
        }
        self.needs_redraw = true;
    }

    /// Open the detail screen for the selected bookmark.
    pub fn open_selected(&mut self) {
        let Some(bookmark) = self.selected_bookmark().cloned() else {
            return;
        };
        self.detail = Some(BookmarkDetail::open(self.client.bookmark(), bookmark));
        self.view = View::Detail;
    }

    /// Close the detail screen, dropping its subscription.
    pub fn close_detail(&mut self) {
        self.detail = None;
        self.view = View::List;
    }

    /// The bookmark the current view is showing or pointing at.
    pub fn current_bookmark(&self) -> Option<&BookmarkSummary> {
        match self.view {
            View::Detail => self.detail.as_ref().map(|d| d.bookmark()),
            View::List => self.selected_bookmark(),
        }
    }

    pub fn refresh(&mut self) {
        self.list.on_refresh();
        self.last_refresh = Instant::now();
        self.poll_states();
    }

    /// Trigger a refresh when the auto-refresh interval has elapsed.
    /// Returns whether a refresh was issued.
    pub fn maybe_auto_refresh(&mut self) -> bool {
        match self.refresh_interval {
            Some(interval) if self.last_refresh.elapsed() >= interval => {
                tracing::info!(interval_secs = interval.as_secs(), "Auto-refresh");
                self.refresh();
                true
            }
            _ => false,
        }
    }

    /// Whether whatever is on screen is currently refetching.
    pub fn refreshing(&self) -> bool {
        match (&self.view, &self.detail) {
            (View::Detail, Some(detail)) => detail.refreshing(),
            _ => self.list.refreshing(),
        }
    }

    /// Set status message (will auto-expire after 3 seconds)
    pub fn set_status(&mut self, msg: impl Into<Cow<'static, str>>) {
        self.status_message = Some((msg.into(), Instant::now()));
    }

    /// Clear status message if expired. Returns true if a message was cleared.
    pub fn clear_expired_status(&mut self) -> bool {
        if let Some((_, time)) = &self.status_message {
            if time.elapsed().as_secs() >= STATUS_TTL_SECS {
                self.status_message = None;
                return true;
            }
        }
        false
    }
}
