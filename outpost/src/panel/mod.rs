//! Dashboard state: everything the renderer draws.
//!
//! `Dashboard` owns the status cards, trend window, event log, recent
//! table, view state and lockdown control, and applies feed events to
//! them through one exhaustive dispatch. Renderers read from it; nothing
//! here touches a terminal.

pub mod chart;
pub mod log;
pub mod status;

pub use chart::{TrendWindow, TREND_CAPACITY};
pub use log::{EventLog, LogEntry, LOG_CAPACITY};
pub use status::{Badge, Severity};

use crate::feed::{Field, FeedEvent, Role, Room, Sample};
use crate::history::{RecentTable, Row, Store};
use crate::lockdown::{Lockdown, LockdownState};
use crate::view::ViewState;

use chrono::{DateTime, Local};
use std::time::{Duration, Instant};
use tracing::debug;

/// How long the fence card stays highlighted after a breach.
pub const FENCE_FLASH: Duration = Duration::from_millis(1200);

/// Connection badge state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    Connecting,
    Connected,
    Down,
}

impl LinkStatus {
    pub fn badge(&self) -> Badge {
        match self {
            LinkStatus::Connecting => Badge::new("CONNECTING", Severity::Warning),
            LinkStatus::Connected => Badge::new("LIVE CONNECTED", Severity::Success),
            LinkStatus::Down => Badge::new("DISCONNECTED", Severity::Danger),
        }
    }
}

pub struct Dashboard {
    pub link: LinkStatus,
    pub role: Option<Role>,
    /// Rendered wall-clock line, refreshed by the 1 s tick.
    pub clock: String,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub guards: Option<u32>,
    pub door_open: bool,
    pub fence_breach: bool,
    fence_flash_until: Option<Instant>,
    system_card: &'static str,
    pub trend: TrendWindow,
    pub events: EventLog,
    pub recent: RecentTable,
    pub lockdown: Lockdown,
    pub view: ViewState,
    store: Option<Store>,
}

impl Dashboard {
    /// A store is optional; without one, telemetry still reaches the
    /// recent table and panels, it just is not persisted.
    pub fn new(store: Option<Store>) -> Dashboard {
        Dashboard {
            link: LinkStatus::Connecting,
            role: None,
            clock: String::new(),
            temperature: None,
            humidity: None,
            guards: None,
            door_open: false,
            fence_breach: false,
            fence_flash_until: None,
            system_card: "STABLE",
            trend: TrendWindow::new(),
            events: EventLog::new(),
            recent: RecentTable::new(),
            lockdown: Lockdown::new(),
            view: ViewState::new(),
            store,
        }
    }

    /// Applies one feed event. `at` stamps log entries, table rows and
    /// chart labels.
    pub fn apply(&mut self, event: FeedEvent, at: DateTime<Local>) {
        match event {
            FeedEvent::Connected => self.link = LinkStatus::Connected,
            FeedEvent::Disconnected => self.link = LinkStatus::Down,
            FeedEvent::Subscribed(room) => debug!(room = room.as_str(), "room subscribed"),
            FeedEvent::RoleResolved(role) => self.role = Some(role),
            FeedEvent::Telemetry(sample) => self.dispatch(sample, at),
            FeedEvent::Alert(message) => self.events.push(at, message, Severity::Danger),
        }
    }

    /// Routes one reading. Every reading lands in the store and the
    /// recent table; only the fields a panel knows about go further.
    fn dispatch(&mut self, sample: Sample, at: DateTime<Local>) {
        let time = at.format("%H:%M:%S").to_string();
        self.persist(&time, &sample);
        self.recent.push(Row {
            time,
            field: sample.field.clone(),
            value: sample.value.clone(),
        });
        match (sample.room, &sample.field) {
            (Room::Patrol, Field::Temperature) => match sample.value.as_f64() {
                Some(v) => self.set_temperature(v, at),
                None => debug!(value = %sample.value, "non-numeric temperature dropped"),
            },
            (Room::Patrol, Field::Humidity) => match sample.value.as_f64() {
                Some(v) => self.set_humidity(v, at),
                None => debug!(value = %sample.value, "non-numeric humidity dropped"),
            },
            (Room::Control, Field::PeopleCount) => match sample.value.as_f64() {
                Some(v) => self.guards = Some(v.max(0.0) as u32),
                None => debug!(value = %sample.value, "non-numeric people count dropped"),
            },
            (Room::Control, Field::DoorOpen) => self.set_door(sample.value.is_active()),
            (Room::Control, Field::FenceAlert) => {
                self.set_fence(sample.value.is_active(), at);
            }
            (_, Field::Other(name)) => {
                debug!(field = name.as_str(), "unhandled telemetry field");
            }
            (room, field) => {
                debug!(
                    room = room.as_str(),
                    field = field.name(),
                    "field ignored on this room"
                );
            }
        }
    }

    pub fn set_temperature(&mut self, celsius: f64, at: DateTime<Local>) {
        self.temperature = Some(celsius);
        if celsius > status::TEMP_CRITICAL {
            self.events
                .push(at, "Temperature critical".to_string(), Severity::Danger);
        }
        let label = at.format("%H:%M:%S").to_string();
        self.trend.record(&label, Some(celsius), None);
    }

    pub fn set_humidity(&mut self, percent: f64, at: DateTime<Local>) {
        self.humidity = Some(percent);
        let label = at.format("%H:%M:%S").to_string();
        self.trend.record(&label, None, Some(percent));
    }

    pub fn set_door(&mut self, open: bool) {
        self.door_open = open;
    }

    /// A breach highlights the fence card for a short window and logs
    /// one event; clearing does neither.
    pub fn set_fence(&mut self, breach: bool, at: DateTime<Local>) {
        self.fence_breach = breach;
        if breach {
            self.fence_flash_until = Some(Instant::now() + FENCE_FLASH);
            self.events.push(
                at,
                "PERIMETER BREACH DETECTED!".to_string(),
                Severity::Danger,
            );
        }
    }

    /// Flips lockdown and cascades the synthetic door/fence/system
    /// updates through the regular panel path. Returns false while the
    /// control is cooling down.
    pub fn toggle_lockdown(&mut self, at: DateTime<Local>, now: Instant) -> bool {
        let state = match self.lockdown.toggle(now) {
            Some(state) => state,
            None => return false,
        };
        let engaged = state == LockdownState::Engaged;
        self.set_door(engaged);
        self.set_fence(engaged, at);
        self.system_card = if engaged { "LOCKDOWN" } else { "STABLE" };
        let (message, severity) = if engaged {
            ("MASTER LOCKDOWN INITIATED", Severity::Danger)
        } else {
            ("Lockdown released - system normalised", Severity::Success)
        };
        self.events.push(at, message.to_string(), severity);
        true
    }

    pub fn tick_clock(&mut self, at: DateTime<Local>) {
        self.clock = at.format("%Y-%m-%d %H:%M:%S").to_string();
    }

    pub fn temperature_card(&self) -> (String, Badge) {
        match self.temperature {
            Some(v) => (status::temperature_value(v), status::temperature_badge(v)),
            None => ("--".to_string(), Badge::new("Normal", Severity::Success)),
        }
    }

    pub fn humidity_card(&self) -> String {
        match self.humidity {
            Some(v) => status::humidity_value(v),
            None => "--".to_string(),
        }
    }

    pub fn guards_card(&self) -> (String, Badge) {
        match self.guards {
            Some(n) => (status::guard_value(n), status::guard_badge(n)),
            None => ("--".to_string(), Badge::new("All Active", Severity::Success)),
        }
    }

    pub fn door_card(&self) -> (&'static str, Badge) {
        (
            status::door_value(self.door_open),
            status::door_badge(self.door_open),
        )
    }

    pub fn fence_card(&self) -> (&'static str, Badge) {
        (
            status::fence_value(self.fence_breach),
            status::fence_badge(self.fence_breach),
        )
    }

    /// Overall health, derived from both security inputs.
    pub fn health(&self) -> Badge {
        status::health_badge(self.door_open, self.fence_breach)
    }

    /// The overview system card: "LOCKDOWN" while engaged.
    pub fn system_card(&self) -> &'static str {
        self.system_card
    }

    pub fn fence_flashing(&self, now: Instant) -> bool {
        self.fence_flash_until.map_or(false, |until| now < until)
    }

    fn persist(&mut self, time: &str, sample: &Sample) {
        if let Some(store) = &mut self.store {
            if let Err(err) = store.append(time, &sample.field, &sample.value) {
                debug!("history store disabled: {}", err);
                self.store = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::Value;
    use chrono::TimeZone;

    fn at(sec: u32) -> DateTime<Local> {
        Local.with_ymd_and_hms(2026, 1, 1, 10, 0, sec).unwrap()
    }

    fn telemetry(room: Room, field: Field, value: Value) -> FeedEvent {
        FeedEvent::Telemetry(Sample { room, field, value })
    }

    #[test]
    fn critical_temperature_logs_once() {
        let mut dash = Dashboard::new(None);
        dash.apply(
            telemetry(Room::Patrol, Field::Temperature, Value::Number(45.0)),
            at(0),
        );
        assert_eq!(dash.temperature_card().0, "45.0°C");
        assert_eq!(dash.temperature_card().1.text, "CRITICAL");
        assert_eq!(dash.events.len(), 1);
        dash.apply(
            telemetry(Room::Patrol, Field::Temperature, Value::Number(30.0)),
            at(1),
        );
        assert_eq!(dash.events.len(), 1);
        assert_eq!(dash.temperature_card().1.text, "Normal");
    }

    #[test]
    fn fence_breach_logs_once_and_flashes() {
        let mut dash = Dashboard::new(None);
        dash.apply(
            telemetry(Room::Control, Field::FenceAlert, Value::Number(1.0)),
            at(0),
        );
        assert!(dash.fence_breach);
        assert!(dash.fence_flashing(Instant::now()));
        assert_eq!(dash.events.len(), 1);
        assert_eq!(
            dash.events.entries().next().unwrap().message,
            "PERIMETER BREACH DETECTED!"
        );
        assert_eq!(dash.health().text, "CRITICAL");
    }

    #[test]
    fn health_stays_critical_while_either_input_is_raised() {
        let mut dash = Dashboard::new(None);
        dash.apply(
            telemetry(Room::Control, Field::DoorOpen, Value::Number(1.0)),
            at(0),
        );
        dash.apply(
            telemetry(Room::Control, Field::FenceAlert, Value::Number(0.0)),
            at(1),
        );
        assert_eq!(dash.health().text, "CRITICAL");
        dash.apply(
            telemetry(Room::Control, Field::DoorOpen, Value::Number(0.0)),
            at(2),
        );
        assert_eq!(dash.health().text, "System Stable");
    }

    #[test]
    fn loose_equality_drives_the_door_panel() {
        let mut dash = Dashboard::new(None);
        dash.apply(
            telemetry(
                Room::Control,
                Field::DoorOpen,
                Value::Text("1".to_string()),
            ),
            at(0),
        );
        assert_eq!(dash.door_card().0, "OPENED");
        dash.apply(
            telemetry(Room::Control, Field::DoorOpen, Value::Number(2.0)),
            at(1),
        );
        assert_eq!(dash.door_card().0, "LOCKED");
    }

    #[test]
    fn every_reading_reaches_the_recent_table() {
        let mut dash = Dashboard::new(None);
        dash.apply(
            telemetry(
                Room::Patrol,
                Field::Other("radiation".to_string()),
                Value::Number(3.1),
            ),
            at(0),
        );
        assert_eq!(dash.recent.len(), 1);
        assert_eq!(dash.recent.rows().next().unwrap().field.name(), "radiation");
        // Unknown fields change no panel.
        assert!(dash.temperature.is_none());
    }

    #[test]
    fn trend_points_join_on_the_second_label() {
        let mut dash = Dashboard::new(None);
        dash.apply(
            telemetry(Room::Patrol, Field::Temperature, Value::Number(21.0)),
            at(0),
        );
        dash.apply(
            telemetry(Room::Patrol, Field::Humidity, Value::Number(55.0)),
            at(0),
        );
        // Same second: humidity would have joined a fresh label, but the
        // label is taken, so the point count stays at one.
        assert_eq!(dash.trend.len(), 1);
        assert_eq!(dash.trend.humidity().back().copied(), Some(0.0));
        dash.apply(
            telemetry(Room::Patrol, Field::Humidity, Value::Number(56.0)),
            at(1),
        );
        assert_eq!(dash.trend.len(), 2);
        assert_eq!(dash.trend.temperature().back().copied(), Some(21.0));
    }

    #[test]
    fn alerts_land_verbatim_in_the_log() {
        let mut dash = Dashboard::new(None);
        dash.apply(FeedEvent::Alert("Sector 7 offline".to_string()), at(0));
        let entry = dash.events.entries().next().unwrap();
        assert_eq!(entry.message, "Sector 7 offline");
        assert_eq!(entry.severity, Severity::Danger);
    }

    #[test]
    fn lockdown_cascades_and_blocks_during_cooldown() {
        let mut dash = Dashboard::new(None);
        let now = Instant::now();
        assert!(dash.toggle_lockdown(at(0), now));
        assert_eq!(dash.door_card().0, "OPENED");
        assert_eq!(dash.fence_card().0, "BREACH");
        assert_eq!(dash.system_card(), "LOCKDOWN");
        assert_eq!(
            dash.events.entries().next().unwrap().message,
            "MASTER LOCKDOWN INITIATED"
        );
        // Second flip inside the cooldown is ignored.
        assert!(!dash.toggle_lockdown(at(1), now + Duration::from_secs(1)));
        assert_eq!(dash.system_card(), "LOCKDOWN");
        // After the cooldown the release cascades back.
        assert!(dash.toggle_lockdown(at(5), now + Duration::from_secs(4)));
        assert_eq!(dash.door_card().0, "LOCKED");
        assert_eq!(dash.fence_card().0, "CLEAR");
        assert_eq!(dash.system_card(), "STABLE");
        assert_eq!(
            dash.events.entries().next().unwrap().message,
            "Lockdown released - system normalised"
        );
    }

    #[test]
    fn connection_badge_tracks_the_link() {
        let mut dash = Dashboard::new(None);
        assert_eq!(dash.link.badge().text, "CONNECTING");
        dash.apply(FeedEvent::Connected, at(0));
        assert_eq!(dash.link.badge().text, "LIVE CONNECTED");
        dash.apply(FeedEvent::Disconnected, at(1));
        assert_eq!(dash.link.badge().text, "DISCONNECTED");
        assert_eq!(dash.link.badge().severity, Severity::Danger);
    }
}
