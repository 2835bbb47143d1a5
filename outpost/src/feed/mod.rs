//! Live telemetry channel to the hub.

mod client;
mod conn;
pub mod identity;
pub mod message;
pub mod socket;

pub use client::{Feed, FeedConfig, FeedError, DEFAULT_FEED_PORT};
pub use identity::Role;
pub use message::{ClientMessage, Field, Room, Sample, ServerMessage, Value};

/// What a feed session reports back to its consumer.
#[derive(Debug, Clone)]
pub enum FeedEvent {
    /// TCP session established.
    Connected,
    /// Session lost. The core keeps retrying on its own.
    Disconnected,
    /// A room subscription request went out.
    Subscribed(Room),
    /// The identity lookup for this session finished.
    RoleResolved(Role),
    /// One telemetry reading.
    Telemetry(Sample),
    /// Facility-wide alert broadcast.
    Alert(String),
}
