//! Request and response bodies of the Govee developer API.

use serde::{Deserialize, Serialize};
use serde_with::{DisplayFromStr, PickFirst, serde_as};

use crate::config::{Attribute, HubConfig};
use crate::types::{Brightness, PowerState};

/// One entry of the device listing returned by `GET /`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeviceListing {
    /// MAC-like identifier, e.g. `AB:CD:EF:01:23:45:67:89`
    pub device: String,
    pub model: String,
    pub device_name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListResponse {
    pub data: ListData,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ListData {
    #[serde(default)]
    pub devices: Vec<DeviceListing>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StateResponse {
    pub data: StateData,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StateData {
    #[serde(default)]
    pub properties: Vec<Property>,
}

/// A single-key property object such as `{"powerState": "on"}`.
///
/// Keys the crate does not track (`color`, `colorTem`, ...) are ignored.
#[serde_as]
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct Property {
    pub power_state: Option<PowerState>,
    pub brightness: Option<u8>,
    /// Some firmwares report `true`, others `"true"`.
    #[serde_as(as = "Option<PickFirst<(_, DisplayFromStr)>>")]
    pub online: Option<bool>,
}

/// Device state as reported by `GET /state`.
///
/// Every field is optional: only properties present in the response are set.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeviceProperties {
    pub power: Option<PowerState>,
    pub brightness: Option<Brightness>,
    pub online: Option<bool>,
}

impl DeviceProperties {
    /// Drops the attributes the host disabled updates for.
    pub(crate) fn filtered(mut self, config: &HubConfig) -> Self {
        if !config.updates_enabled(Attribute::PowerState) {
            self.power = None;
        }
        if !config.updates_enabled(Attribute::Brightness) {
            self.brightness = None;
        }
        if !config.updates_enabled(Attribute::Online) {
            self.online = None;
        }
        self
    }

    /// Folds the single-key property objects into one state.
    pub(crate) fn from_properties(properties: Vec<Property>) -> Self {
        properties
            .into_iter()
            .fold(DeviceProperties::default(), |mut acc, prop| {
                if let Some(power) = prop.power_state {
                    acc.power = Some(power);
                }
                if let Some(brightness) = prop.brightness.and_then(Brightness::create) {
                    acc.brightness = Some(brightness);
                }
                if let Some(online) = prop.online {
                    acc.online = Some(online);
                }
                acc
            })
    }
}

/// Body of `PUT /control/`.
#[derive(Debug, Serialize)]
pub(crate) struct ControlRequest<'a> {
    pub device: &'a str,
    pub model: &'a str,
    pub cmd: Command,
}

/// A control command, serialized as `{"name": ..., "value": ...}`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "name", content = "value", rename_all = "camelCase")]
pub(crate) enum Command {
    Turn(PowerState),
    Brightness(Brightness),
}
