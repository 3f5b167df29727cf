//! Brightness control for Govee lights.

use serde::{Deserialize, Serialize};

/// Brightness on the device-native scale, 0 to 100 percent.
///
/// Hosts usually work with a 0-255 level; [`Brightness::from_level`] converts
/// that into the value the cloud API expects.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct Brightness {
    pub(crate) value: u8,
}

impl Default for Brightness {
    fn default() -> Self {
        Self::new()
    }
}

impl Brightness {
    const MIN_SENT: u8 = 1;
    const MAX: u8 = 100;
    const LEVEL_MAX: u16 = 255;

    /// Full brightness, the state assumed for freshly discovered devices.
    pub fn new() -> Self {
        Brightness { value: Self::MAX }
    }

    pub fn value(&self) -> u8 {
        self.value
    }

    /// Returns None if value is outside valid range (0-100).
    ///
    /// # Examples
    ///
    /// ```
    /// use blovee_rs::Brightness;
    ///
    /// assert_eq!(Brightness::create(42).unwrap().value(), 42);
    /// assert!(Brightness::create(101).is_none());
    /// ```
    pub fn create(value: u8) -> Option<Self> {
        if value <= Self::MAX {
            Some(Brightness { value })
        } else {
            None
        }
    }

    /// Rescales a 0-255 host level to the API's 0-100 range.
    ///
    /// Floor-divides and never yields 0, which the API may read as "off".
    ///
    /// # Examples
    ///
    /// ```
    /// use blovee_rs::Brightness;
    ///
    /// assert_eq!(Brightness::from_level(255).value(), 100);
    /// assert_eq!(Brightness::from_level(128).value(), 50);
    /// assert_eq!(Brightness::from_level(0).value(), 1);
    /// ```
    pub fn from_level(level: u8) -> Self {
        let scaled = u16::from(level) * u16::from(Self::MAX) / Self::LEVEL_MAX;
        Brightness {
            value: (scaled as u8).max(Self::MIN_SENT),
        }
    }

    /// Converts back to a 0-255 host level.
    pub fn to_level(&self) -> u8 {
        (u16::from(self.value) * Self::LEVEL_MAX / u16::from(Self::MAX)) as u8
    }
}
