//! Identity endpoint
//!
//! One-shot role lookup against the site API. The answer decides whether
//! the session may join the control room; everything else works the same
//! with no role at all.

use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

/// Identity tier reported by the site API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Role {
    Level1,
    Level2,
    Other(String),
}

impl Role {
    pub fn from_name(name: &str) -> Role {
        match name {
            "level1" => Role::Level1,
            "level2" => Role::Level2,
            other => Role::Other(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Role::Level1 => "level1",
            Role::Level2 => "level2",
            Role::Other(name) => name,
        }
    }

    /// Only level2 sessions may join the control room.
    pub fn is_elevated(&self) -> bool {
        matches!(self, Role::Level2)
    }
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("identity request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("identity reply carried no role")]
    NoRole,
}

#[derive(Debug, Deserialize)]
struct WhoAmI {
    #[serde(default)]
    role: Option<String>,
}

/// Request timeout for the lookup. Stale replies are discarded by the
/// connection epoch check either way.
const FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Fetches the session role from `url`. Blocking; the connection core
/// runs this on a one-shot thread.
pub fn fetch_role(url: &str) -> Result<Role, IdentityError> {
    let client = reqwest::blocking::Client::builder()
        .timeout(FETCH_TIMEOUT)
        .build()?;
    let who: WhoAmI = client.get(url).send()?.error_for_status()?.json()?;
    match who.role {
        Some(name) => Ok(Role::from_name(&name)),
        None => Err(IdentityError::NoRole),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_names_round_trip() {
        assert_eq!(Role::from_name("level2"), Role::Level2);
        assert_eq!(Role::from_name("level1"), Role::Level1);
        assert_eq!(
            Role::from_name("auditor"),
            Role::Other("auditor".to_string())
        );
        assert_eq!(Role::from_name("auditor").name(), "auditor");
    }

    #[test]
    fn only_level2_is_elevated() {
        assert!(Role::Level2.is_elevated());
        assert!(!Role::Level1.is_elevated());
        assert!(!Role::Other("level3".to_string()).is_elevated());
    }

    #[test]
    fn whoami_without_role_parses() {
        let who: WhoAmI = serde_json::from_str("{}").unwrap();
        assert!(who.role.is_none());
    }
}
