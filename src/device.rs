//! Cached state of a single cloud light.

use serde::Serialize;

use crate::errors::Error;
use crate::payload::{DeviceListing, DeviceProperties};
use crate::types::{Brightness, PowerState};

/// A light known to a [`Hub`](crate::Hub).
///
/// Values handed out by the hub are snapshots: holding one never keeps the
/// hub's registry from changing, and mutating one never reaches the hub.
///
/// The error field is an overlay. A failed call records its text without
/// touching the last known power and brightness, and the next successful call
/// on the device clears it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Device {
    id: String,
    name: String,
    model: String,
    is_on: bool,
    brightness: Brightness,
    online: bool,
    err: String,
}

impl Device {
    /// A device as first seen by discovery: off, full brightness, no error.
    pub(crate) fn discovered(listing: &DeviceListing) -> Self {
        Device {
            id: listing.device.clone(),
            name: listing.device_name.clone(),
            model: listing.model.clone(),
            is_on: false,
            brightness: Brightness::new(),
            online: true,
            err: String::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn is_on(&self) -> bool {
        self.is_on
    }

    pub fn power(&self) -> PowerState {
        PowerState::from(self.is_on)
    }

    pub fn brightness(&self) -> Brightness {
        self.brightness
    }

    pub fn online(&self) -> bool {
        self.online
    }

    /// The last failure recorded for this device, if it has not been cleared.
    pub fn error(&self) -> Option<&str> {
        if self.err.is_empty() {
            None
        } else {
            Some(&self.err)
        }
    }

    pub fn has_error(&self) -> bool {
        !self.err.is_empty()
    }

    /// Applies a successful state read.
    ///
    /// Only properties present in `props` overwrite cached values. With
    /// `offline_is_off`, an offline report also forces the device off.
    pub(crate) fn apply_properties(&mut self, props: &DeviceProperties, offline_is_off: bool) {
        if let Some(power) = props.power {
            self.is_on = power.is_on();
        }
        if let Some(brightness) = props.brightness {
            self.brightness = brightness;
        }
        if let Some(online) = props.online {
            self.online = online;
        }
        if offline_is_off && !self.online {
            self.is_on = false;
        }
        self.clear_error();
    }

    pub(crate) fn apply_power(&mut self, on: bool) {
        self.is_on = on;
        self.clear_error();
    }

    pub(crate) fn apply_brightness(&mut self, brightness: Brightness) {
        self.brightness = brightness;
        self.clear_error();
    }

    pub(crate) fn record_error(&mut self, err: &Error) {
        self.err = err.to_string();
    }

    fn clear_error(&mut self) {
        self.err.clear();
    }
}
