// ── On/off switch domain type ──

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, IntoStaticStr};

/// The `lamp` and `vacation` fields, which the device reports as `"on"`/`"off"`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString, IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Toggle {
    On,
    Off,
}

impl Toggle {
    /// `None` when the field is absent or holds something else.
    pub fn parse(raw: Option<&str>) -> Option<Self> {
        raw?.parse().ok()
    }

    pub fn from_bool(on: bool) -> Self {
        if on { Self::On } else { Self::Off }
    }

    pub fn as_str(self) -> &'static str {
        self.into()
    }

    /// Characteristic value of an optional toggle: 1 on, 0 off, -1 unknown.
    pub fn characteristic(value: Option<Self>) -> i8 {
        match value {
            Some(Self::On) => 1,
            Some(Self::Off) => 0,
            None => -1,
        }
    }
}
