// ── Door state domain type ──

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

/// Door state parsed from the device's free-text `door` field.
///
/// `Error` is not something the door does. It marks a value that was
/// missing or could not be recognized, and callers must read it as "unknown".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
pub enum DoorState {
    Closed,
    Opened,
    Stopped,
    Closing,
    Opening,
    Error,
}

/// Checked in order; the first matching prefix wins.
const PREFIXES: [(&str, DoorState); 5] = [
    ("Closed", DoorState::Closed),
    ("Opened", DoorState::Opened),
    ("Closing", DoorState::Closing),
    ("Opening", DoorState::Opening),
    ("Stop", DoorState::Stopped),
];

impl DoorState {
    /// Map a raw device string (e.g. `"Opened 10:32am"`) to a state.
    ///
    /// Total: absent or unrecognized input yields [`DoorState::Error`].
    pub fn parse(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return Self::Error;
        };
        PREFIXES
            .iter()
            .find(|(prefix, _)| raw.starts_with(prefix))
            .map_or(Self::Error, |(_, state)| *state)
    }

    /// `CurrentDoorState` characteristic value:
    /// 0 open, 1 closed, 2 opening, 3 closing, 4 stopped, -1 unknown.
    pub fn current_value(self) -> i8 {
        match self {
            Self::Opened => 0,
            Self::Closed => 1,
            Self::Opening => 2,
            Self::Closing => 3,
            Self::Stopped => 4,
            Self::Error => -1,
        }
    }

    /// `TargetDoorState` characteristic value: 0 open, 1 closed, -1 unknown.
    /// A stopped door reports open.
    pub fn target_value(self) -> i8 {
        match self {
            Self::Opened | Self::Opening | Self::Stopped => 0,
            Self::Closed | Self::Closing => 1,
            Self::Error => -1,
        }
    }

    pub fn is_known(self) -> bool {
        self != Self::Error
    }

    /// States accepted as "the open command took effect".
    pub fn satisfies_open(self) -> bool {
        matches!(self, Self::Opened | Self::Opening | Self::Stopped)
    }

    /// States accepted as "the close command took effect".
    pub fn satisfies_close(self) -> bool {
        matches!(self, Self::Closed | Self::Closing)
    }
}
