//! Badge derivations for the status cards.
//!
//! Pure value-to-badge mappings, kept free of dashboard state so they can
//! be pinned by tests independently of the dispatch path.

/// How a badge or log entry should be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Info,
    Warning,
    Danger,
}

/// Short status annotation shown next to a card value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Badge {
    pub text: &'static str,
    pub severity: Severity,
}

impl Badge {
    pub const fn new(text: &'static str, severity: Severity) -> Badge {
        Badge { text, severity }
    }
}

/// Above this the temperature card goes critical (and logs).
pub const TEMP_CRITICAL: f64 = 40.0;
/// Above this (up to critical) the temperature card warns.
pub const TEMP_HIGH: f64 = 32.0;
/// Full guard complement on duty.
pub const GUARD_COMPLEMENT: u32 = 12;
/// Below this many guards, coverage is flagged.
pub const GUARD_MINIMUM: u32 = 8;

/// Trend badge for a temperature reading. Boundaries are exclusive:
/// exactly 40 reads High and exactly 32 reads Normal.
pub fn temperature_badge(celsius: f64) -> Badge {
    if celsius > TEMP_CRITICAL {
        Badge::new("CRITICAL", Severity::Danger)
    } else if celsius > TEMP_HIGH {
        Badge::new("High", Severity::Warning)
    } else {
        Badge::new("Normal", Severity::Success)
    }
}

pub fn temperature_value(celsius: f64) -> String {
    format!("{:.1}°C", celsius)
}

pub fn humidity_value(percent: f64) -> String {
    format!("{:.1}%", percent)
}

pub fn guard_badge(on_duty: u32) -> Badge {
    if on_duty < GUARD_MINIMUM {
        Badge::new("Low Coverage", Severity::Danger)
    } else {
        Badge::new("All Active", Severity::Success)
    }
}

pub fn guard_value(on_duty: u32) -> String {
    format!("{} / {}", on_duty, GUARD_COMPLEMENT)
}

pub fn door_value(open: bool) -> &'static str {
    if open {
        "OPENED"
    } else {
        "LOCKED"
    }
}

pub fn door_badge(open: bool) -> Badge {
    if open {
        Badge::new("Unsecured", Severity::Danger)
    } else {
        Badge::new("Secure", Severity::Success)
    }
}

pub fn fence_value(breach: bool) -> &'static str {
    if breach {
        "BREACH"
    } else {
        "CLEAR"
    }
}

pub fn fence_badge(breach: bool) -> Badge {
    if breach {
        Badge::new("Intrusion Detected", Severity::Danger)
    } else {
        Badge::new("No Activity", Severity::Success)
    }
}

/// Overall health derives from both security inputs, so clearing one
/// while the other is still raised keeps the card critical.
pub fn health_badge(door_open: bool, fence_breach: bool) -> Badge {
    if door_open || fence_breach {
        Badge::new("CRITICAL", Severity::Danger)
    } else {
        Badge::new("System Stable", Severity::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temperature_boundaries() {
        assert_eq!(temperature_badge(40.1).text, "CRITICAL");
        assert_eq!(temperature_badge(40.0).text, "High");
        assert_eq!(temperature_badge(32.1).text, "High");
        assert_eq!(temperature_badge(32.0).text, "Normal");
        assert_eq!(temperature_badge(-5.0).text, "Normal");
    }

    #[test]
    fn temperature_formats_one_decimal() {
        assert_eq!(temperature_value(23.456), "23.5°C");
        assert_eq!(humidity_value(61.0), "61.0%");
    }

    #[test]
    fn guard_coverage_boundary() {
        assert_eq!(guard_badge(7).text, "Low Coverage");
        assert_eq!(guard_badge(7).severity, Severity::Danger);
        assert_eq!(guard_badge(8).text, "All Active");
        assert_eq!(guard_value(9), "9 / 12");
    }

    #[test]
    fn door_and_fence_states() {
        assert_eq!(door_value(true), "OPENED");
        assert_eq!(door_badge(true).severity, Severity::Danger);
        assert_eq!(door_value(false), "LOCKED");
        assert_eq!(fence_value(true), "BREACH");
        assert_eq!(fence_badge(false).text, "No Activity");
    }

    #[test]
    fn health_combines_both_inputs() {
        assert_eq!(health_badge(false, false).text, "System Stable");
        assert_eq!(health_badge(true, false).text, "CRITICAL");
        assert_eq!(health_badge(false, true).text, "CRITICAL");
        assert_eq!(health_badge(true, true).text, "CRITICAL");
    }
}
