pub mod backfill;
pub mod feed;
pub mod history;
pub mod lockdown;
pub mod panel;
pub mod view;

pub use feed::{Feed, FeedConfig, FeedEvent};
pub use panel::Dashboard;
