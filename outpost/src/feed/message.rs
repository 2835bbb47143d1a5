//! Wire messages
//!
//! The hub speaks newline-delimited JSON: one message object per line,
//! tagged by an `event` key. The client only ever sends subscriptions;
//! the hub pushes telemetry for the subscribed rooms plus broadcast
//! alerts. Telemetry values arrive as whatever the sensor gateway felt
//! like sending (numbers, numeric strings, booleans), so the scalar type
//! here is deliberately loose.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Subscription channels offered by the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Room {
    /// Baseline room, joined on every connect.
    Patrol,
    /// Elevated room, joined only for level2 sessions.
    Control,
}

impl Room {
    pub fn as_str(&self) -> &'static str {
        match self {
            Room::Patrol => "patrol",
            Room::Control => "control",
        }
    }
}

/// Telemetry field names. Fields this client does not chart still flow
/// through to the history store, so unknown names are carried verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Field {
    Temperature,
    Humidity,
    PeopleCount,
    DoorOpen,
    FenceAlert,
    Other(String),
}

impl Field {
    pub fn from_name(name: &str) -> Field {
        match name {
            "temperature" => Field::Temperature,
            "humidity" => Field::Humidity,
            "people_count" => Field::PeopleCount,
            "door_open" => Field::DoorOpen,
            "fence_alert" => Field::FenceAlert,
            other => Field::Other(other.to_string()),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Field::Temperature => "temperature",
            Field::Humidity => "humidity",
            Field::PeopleCount => "people_count",
            Field::DoorOpen => "door_open",
            Field::FenceAlert => "fence_alert",
            Field::Other(name) => name,
        }
    }
}

impl From<String> for Field {
    fn from(name: String) -> Field {
        Field::from_name(&name)
    }
}

impl From<Field> for String {
    fn from(field: Field) -> String {
        field.name().to_string()
    }
}

/// Loose telemetry scalar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Number(f64),
    Bool(bool),
    Text(String),
}

impl Value {
    /// Numeric view: numbers directly, booleans as 0/1, strings parsed.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(v) => Some(*v),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Text(s) => s.trim().parse().ok(),
        }
    }

    /// Loose "equals one" test used by the on/off panels: 1, "1" and true
    /// all read as active, everything else (0, "0", 2, garbage) does not.
    pub fn is_active(&self) -> bool {
        match self {
            Value::Bool(b) => *b,
            other => other.as_f64() == Some(1.0),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Value::Number(v) => write!(f, "{}", v),
            Value::Bool(b) => write!(f, "{}", b),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

/// One validated telemetry reading, tagged with the room it arrived on.
#[derive(Debug, Clone)]
pub struct Sample {
    pub room: Room,
    pub field: Field,
    pub value: Value,
}

/// Messages the client sends to the hub.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum ClientMessage {
    Subscribe { room: Room },
}

/// Messages the hub pushes. `field`/`value`/`message` are optional at the
/// wire level; validation happens at dispatch so a malformed message is
/// dropped without killing the stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum ServerMessage {
    PatrolData {
        #[serde(default)]
        field: Option<Field>,
        #[serde(default)]
        value: Option<Value>,
    },
    ControlData {
        #[serde(default)]
        field: Option<Field>,
        #[serde(default)]
        value: Option<Value>,
    },
    Alert {
        #[serde(default)]
        message: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_patrol_data() {
        let msg: ServerMessage =
            serde_json::from_str(r#"{"event":"patrol-data","field":"temperature","value":31.5}"#)
                .unwrap();
        match msg {
            ServerMessage::PatrolData { field, value } => {
                assert_eq!(field, Some(Field::Temperature));
                assert_eq!(value.unwrap().as_f64(), Some(31.5));
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn parses_control_data_with_string_value() {
        let msg: ServerMessage =
            serde_json::from_str(r#"{"event":"control-data","field":"door_open","value":"1"}"#)
                .unwrap();
        match msg {
            ServerMessage::ControlData { field, value } => {
                assert_eq!(field, Some(Field::DoorOpen));
                assert!(value.unwrap().is_active());
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn parses_alert() {
        let msg: ServerMessage =
            serde_json::from_str(r#"{"event":"alert","message":"breach drill"}"#).unwrap();
        match msg {
            ServerMessage::Alert { message } => assert_eq!(message.as_deref(), Some("breach drill")),
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn missing_field_parses_to_none() {
        let msg: ServerMessage =
            serde_json::from_str(r#"{"event":"patrol-data","value":3}"#).unwrap();
        match msg {
            ServerMessage::PatrolData { field, value } => {
                assert_eq!(field, None);
                assert!(value.is_some());
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn unknown_event_is_an_error() {
        assert!(serde_json::from_str::<ServerMessage>(r#"{"event":"metrics","x":1}"#).is_err());
    }

    #[test]
    fn unknown_field_name_is_carried() {
        let field = Field::from_name("radiation");
        assert_eq!(field, Field::Other("radiation".to_string()));
        assert_eq!(field.name(), "radiation");
    }

    #[test]
    fn subscribe_serializes_to_wire_form() {
        let line = serde_json::to_string(&ClientMessage::Subscribe { room: Room::Patrol }).unwrap();
        assert_eq!(line, r#"{"event":"subscribe","room":"patrol"}"#);
    }

    #[test]
    fn loose_equality_one() {
        assert!(Value::Number(1.0).is_active());
        assert!(Value::Text("1".to_string()).is_active());
        assert!(Value::Bool(true).is_active());
        assert!(!Value::Number(0.0).is_active());
        assert!(!Value::Number(2.0).is_active());
        assert!(!Value::Text("0".to_string()).is_active());
        assert!(!Value::Text("off".to_string()).is_active());
        assert!(!Value::Bool(false).is_active());
    }

    #[test]
    fn numeric_views() {
        assert_eq!(Value::Text("31.5".to_string()).as_f64(), Some(31.5));
        assert_eq!(Value::Bool(true).as_f64(), Some(1.0));
        assert_eq!(Value::Text("n/a".to_string()).as_f64(), None);
    }
}
