//! Master lockdown control.

use std::time::{Duration, Instant};

/// How long the control stays blocked after a flip.
pub const LOCKDOWN_COOLDOWN: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockdownState {
    Released,
    Engaged,
}

/// Client-side lockdown toggle. Purely local state; the cascade of
/// panel updates it triggers lives on `Dashboard`.
#[derive(Debug)]
pub struct Lockdown {
    state: LockdownState,
    blocked_until: Option<Instant>,
}

impl Lockdown {
    pub fn new() -> Lockdown {
        Lockdown {
            state: LockdownState::Released,
            blocked_until: None,
        }
    }

    pub fn state(&self) -> LockdownState {
        self.state
    }

    pub fn is_engaged(&self) -> bool {
        self.state == LockdownState::Engaged
    }

    pub fn is_ready(&self, now: Instant) -> bool {
        self.blocked_until.map_or(true, |until| now >= until)
    }

    /// Remaining cooldown, for the control hint.
    pub fn blocked_for(&self, now: Instant) -> Option<Duration> {
        match self.blocked_until {
            Some(until) if now < until => Some(until - now),
            _ => None,
        }
    }

    /// Flips the state unless still cooling down; returns the new state.
    pub fn toggle(&mut self, now: Instant) -> Option<LockdownState> {
        if !self.is_ready(now) {
            return None;
        }
        self.state = match self.state {
            LockdownState::Released => LockdownState::Engaged,
            LockdownState::Engaged => LockdownState::Released,
        };
        self.blocked_until = Some(now + LOCKDOWN_COOLDOWN);
        Some(self.state)
    }
}

impl Default for Lockdown {
    fn default() -> Lockdown {
        Lockdown::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_flips_and_cools_down() {
        let mut lockdown = Lockdown::new();
        let now = Instant::now();
        assert_eq!(lockdown.toggle(now), Some(LockdownState::Engaged));
        assert!(lockdown.is_engaged());
        assert_eq!(lockdown.toggle(now + Duration::from_secs(1)), None);
        assert!(lockdown.blocked_for(now + Duration::from_secs(1)).is_some());
        // Ready again exactly at the cooldown boundary.
        assert!(lockdown.is_ready(now + LOCKDOWN_COOLDOWN));
        assert_eq!(
            lockdown.toggle(now + LOCKDOWN_COOLDOWN),
            Some(LockdownState::Released)
        );
        assert!(!lockdown.is_engaged());
    }
}
