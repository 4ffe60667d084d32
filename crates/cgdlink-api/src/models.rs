// Device API types
//
// The opener answers every request with the same flat JSON status object.
// Fields are optional because firmware revisions disagree about which keys
// are present; anything not modelled explicitly lands in `extra`.

use serde::{Deserialize, Serialize};

// ── Status document ──────────────────────────────────────────────────

/// Status object returned by `GET /api?key=..&status=json` and by every
/// state-changing command.
///
/// ```json
/// { "lamp": "off", "door": "Opened 10:32am", "vacation": "off",
///   "cycles": 1234, "rssi": -61, "error": 0, "camera": "cam01", "status": "OK" }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatusDocument {
    /// `"on"` / `"off"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lamp: Option<String>,
    /// Free-text door state, e.g. `"Closed"`, `"Opening"`, `"Opened 10:32am"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub door: Option<String>,
    /// `"on"` / `"off"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vacation: Option<String>,

    // Passthrough telemetry. Never part of change detection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cycles: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rssi: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<serde_json::Value>,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl StatusDocument {
    /// Borrow one of the stateful fields.
    pub fn field(&self, field: StatusField) -> Option<&str> {
        match field {
            StatusField::Lamp => self.lamp.as_deref(),
            StatusField::Door => self.door.as_deref(),
            StatusField::Vacation => self.vacation.as_deref(),
        }
    }

    /// Mutable access to one of the stateful fields.
    pub fn field_mut(&mut self, field: StatusField) -> &mut Option<String> {
        match field {
            StatusField::Lamp => &mut self.lamp,
            StatusField::Door => &mut self.door,
            StatusField::Vacation => &mut self.vacation,
        }
    }

    /// Semantic equality: compares only `lamp`, `door` and `vacation`.
    ///
    /// Telemetry such as `cycles` or `rssi` changes constantly and must not
    /// count as a change of state.
    pub fn same_state(&self, other: &Self) -> bool {
        StatusField::ALL
            .iter()
            .all(|f| self.field(*f) == other.field(*f))
    }
}

/// The stateful fields of a [`StatusDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusField {
    Lamp,
    Door,
    Vacation,
}

impl StatusField {
    pub const ALL: [Self; 3] = [Self::Lamp, Self::Door, Self::Vacation];

    /// JSON key of the field, which is also its command parameter name.
    pub fn key(self) -> &'static str {
        match self {
            Self::Lamp => "lamp",
            Self::Door => "door",
            Self::Vacation => "vacation",
        }
    }
}

impl std::fmt::Display for StatusField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

// ── Commands ─────────────────────────────────────────────────────────

/// Door movement request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoorAction {
    Open,
    Close,
}

/// Every request the opener understands, as `{cmd}={value}` pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCommand {
    /// `status=json` (read-only).
    Status,
    /// `door=open|close`.
    Door(DoorAction),
    /// `lamp=on|off`.
    Lamp(bool),
    /// `vacation=on|off`.
    Vacation(bool),
}

impl DeviceCommand {
    /// The query pair sent to the device.
    pub fn query_pair(self) -> (&'static str, &'static str) {
        match self {
            Self::Status => ("status", "json"),
            Self::Door(DoorAction::Open) => ("door", "open"),
            Self::Door(DoorAction::Close) => ("door", "close"),
            Self::Lamp(on) => ("lamp", on_off(on)),
            Self::Vacation(on) => ("vacation", on_off(on)),
        }
    }
}

impl std::fmt::Display for DeviceCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let (cmd, value) = self.query_pair();
        write!(f, "{cmd}={value}")
    }
}

fn on_off(on: bool) -> &'static str {
    if on { "on" } else { "off" }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_full_document_and_keeps_unknown_keys() {
        let doc: StatusDocument = serde_json::from_value(json!({
            "lamp": "off",
            "door": "Opened 10:32am",
            "vacation": "off",
            "cycles": 1234,
            "rssi": -61,
            "firmware": "2.1"
        }))
        .unwrap();

        assert_eq!(doc.field(StatusField::Door), Some("Opened 10:32am"));
        assert_eq!(doc.cycles, Some(json!(1234)));
        assert_eq!(doc.extra.get("firmware"), Some(&json!("2.1")));
    }

    #[test]
    fn same_state_ignores_telemetry() {
        let a = StatusDocument {
            door: Some("Closed".into()),
            cycles: Some(json!(1)),
            ..Default::default()
        };
        let mut b = a.clone();
        b.cycles = Some(json!(2));
        b.rssi = Some(json!(-40));
        assert!(a.same_state(&b));

        b.lamp = Some("on".into());
        assert!(!a.same_state(&b));
    }

    #[test]
    fn command_query_pairs() {
        assert_eq!(DeviceCommand::Status.query_pair(), ("status", "json"));
        assert_eq!(
            DeviceCommand::Door(DoorAction::Close).query_pair(),
            ("door", "close")
        );
        assert_eq!(DeviceCommand::Lamp(true).to_string(), "lamp=on");
        assert_eq!(DeviceCommand::Vacation(false).to_string(), "vacation=off");
    }
}
