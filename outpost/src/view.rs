//! Tab switching for the dashboard views.

use tracing::debug;

/// The three dashboard views.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tab {
    Overview,
    LiveFeed,
    History,
}

impl Tab {
    pub const ALL: [Tab; 3] = [Tab::Overview, Tab::LiveFeed, Tab::History];

    pub fn from_id(id: &str) -> Option<Tab> {
        match id {
            "overview" => Some(Tab::Overview),
            "live_feed" => Some(Tab::LiveFeed),
            "history" => Some(Tab::History),
            _ => None,
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            Tab::Overview => "overview",
            Tab::LiveFeed => "live_feed",
            Tab::History => "history",
        }
    }

    /// Header title: underscores become spaces, upper-cased.
    pub fn title(&self) -> String {
        self.id().replace('_', " ").to_uppercase()
    }
}

/// Which view is showing and what the header says.
#[derive(Debug)]
pub struct ViewState {
    active: Option<Tab>,
    title: String,
}

impl ViewState {
    pub fn new() -> ViewState {
        ViewState {
            active: Some(Tab::Overview),
            title: Tab::Overview.title(),
        }
    }

    /// Switches by view id. An unknown id deactivates every view and
    /// leaves the title alone.
    pub fn switch(&mut self, id: &str) {
        match Tab::from_id(id) {
            Some(tab) => {
                self.active = Some(tab);
                self.title = tab.title();
            }
            None => {
                self.active = None;
                debug!(id, "unknown view id");
            }
        }
    }

    pub fn select(&mut self, tab: Tab) {
        self.switch(tab.id());
    }

    pub fn active(&self) -> Option<Tab> {
        self.active
    }

    pub fn title(&self) -> &str {
        &self.title
    }
}

impl Default for ViewState {
    fn default() -> ViewState {
        ViewState::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn titles_come_from_ids() {
        assert_eq!(Tab::Overview.title(), "OVERVIEW");
        assert_eq!(Tab::LiveFeed.title(), "LIVE FEED");
        assert_eq!(Tab::History.title(), "HISTORY");
    }

    #[test]
    fn switching_updates_active_and_title() {
        let mut view = ViewState::new();
        view.switch("history");
        assert_eq!(view.active(), Some(Tab::History));
        assert_eq!(view.title(), "HISTORY");
    }

    #[test]
    fn unknown_id_deactivates_and_keeps_title() {
        let mut view = ViewState::new();
        view.switch("live_feed");
        view.switch("vault");
        assert_eq!(view.active(), None);
        assert_eq!(view.title(), "LIVE FEED");
    }
}
