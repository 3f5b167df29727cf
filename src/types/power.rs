//! Power state for light control.

use serde::{Deserialize, Serialize};
use strum_macros::Display;

/// Power state of a light as the API spells it.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum PowerState {
    /// The light is emitting
    On,
    /// The light is off
    Off,
}

impl PowerState {
    pub fn is_on(&self) -> bool {
        matches!(self, PowerState::On)
    }
}

impl From<bool> for PowerState {
    fn from(on: bool) -> Self {
        if on { PowerState::On } else { PowerState::Off }
    }
}
