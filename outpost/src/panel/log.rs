//! Capped most-recent-first event log.

use super::status::Severity;
use chrono::{DateTime, Local};
use std::collections::VecDeque;

/// Visible depth of the event log.
pub const LOG_CAPACITY: usize = 15;

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub time: DateTime<Local>,
    pub message: String,
    pub severity: Severity,
}

impl LogEntry {
    /// The rendered form, `[HH:MM:SS] message`.
    pub fn line(&self) -> String {
        format!("[{}] {}", self.time.format("%H:%M:%S"), self.message)
    }
}

/// Newest-first log of facility events, trimmed to `LOG_CAPACITY`.
#[derive(Debug, Default)]
pub struct EventLog {
    entries: VecDeque<LogEntry>,
}

impl EventLog {
    pub fn new() -> EventLog {
        EventLog::default()
    }

    pub fn push(&mut self, at: DateTime<Local>, message: String, severity: Severity) {
        self.entries.push_front(LogEntry {
            time: at,
            message,
            severity,
        });
        if self.entries.len() > LOG_CAPACITY {
            self.entries.pop_back();
        }
    }

    /// Newest first.
    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newest_first_and_capped() {
        let mut log = EventLog::new();
        let at = Local::now();
        for i in 0..20 {
            log.push(at, format!("event {}", i), Severity::Info);
        }
        assert_eq!(log.len(), LOG_CAPACITY);
        let first = log.entries().next().unwrap();
        assert_eq!(first.message, "event 19");
        let last = log.entries().last().unwrap();
        assert_eq!(last.message, "event 5");
    }

    #[test]
    fn line_has_bracketed_time() {
        let mut log = EventLog::new();
        log.push(Local::now(), "check".to_string(), Severity::Success);
        let line = log.entries().next().unwrap().line();
        assert!(line.starts_with('['));
        assert!(line.ends_with("] check"));
    }
}
