//! Hub configuration and option overrides.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use serde_with::formats::CommaSeparator;
use serde_with::{DurationSeconds, StringWithSeparator, serde_as, skip_serializing_none};
use strum_macros::{Display, EnumIter, EnumString};

use crate::client::ApiClient;
use crate::errors::Error;

type Result<T> = std::result::Result<T, Error>;

const DEFAULT_POLL_SECS: u64 = 10;

/// A device state property that refreshes may be told to ignore.
///
/// Spelled the way the API names the property, e.g. `powerState`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, EnumIter,
)]
#[serde(rename_all = "camelCase")]
#[strum(serialize_all = "camelCase", ascii_case_insensitive)]
pub enum Attribute {
    PowerState,
    Brightness,
    Online,
}

/// Everything a [`Hub`](crate::Hub) needs from its host.
///
/// Deserializes from a host config entry; only `api_key` is required.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use blovee_rs::{Attribute, HubConfig};
///
/// let config: HubConfig = serde_json::from_str(
///     r#"{"api_key": "secret", "delay": 30, "disable_attribute_updates": "brightness"}"#,
/// ).unwrap();
/// assert_eq!(config.poll_interval, Duration::from_secs(30));
/// assert!(config.use_assumed_state);
/// assert_eq!(config.disable_attribute_updates, vec![Attribute::Brightness]);
/// ```
#[serde_as]
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct HubConfig {
    /// Never serialized; use [`HubConfig::redacted`] for output.
    #[serde(skip_serializing)]
    pub api_key: String,
    #[serde(alias = "delay", default = "default_poll_interval")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub poll_interval: Duration,
    #[serde(default = "default_true")]
    pub use_assumed_state: bool,
    /// Report a device as off while the API says it is offline.
    #[serde(default)]
    pub offline_is_off: bool,
    #[serde(default)]
    #[serde_as(as = "StringWithSeparator<CommaSeparator, Attribute>")]
    pub disable_attribute_updates: Vec<Attribute>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(DEFAULT_POLL_SECS)
}

fn default_true() -> bool {
    true
}

fn default_base_url() -> String {
    ApiClient::DEFAULT_BASE_URL.to_string()
}

impl fmt::Debug for HubConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HubConfig")
            .field("api_key", &"<redacted>")
            .field("poll_interval", &self.poll_interval)
            .field("use_assumed_state", &self.use_assumed_state)
            .field("offline_is_off", &self.offline_is_off)
            .field("disable_attribute_updates", &self.disable_attribute_updates)
            .field("base_url", &self.base_url)
            .finish()
    }
}

impl HubConfig {
    pub fn new(api_key: &str) -> Self {
        HubConfig {
            api_key: api_key.to_string(),
            poll_interval: default_poll_interval(),
            use_assumed_state: true,
            offline_is_off: false,
            disable_attribute_updates: Vec::new(),
            base_url: default_base_url(),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.to_string();
        self
    }

    /// Rejects configs that cannot work before any request is made.
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(Error::invalid_config("api key is empty"));
        }
        if self.poll_interval.is_zero() {
            return Err(Error::invalid_config("poll interval must be positive"));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(Error::InvalidConfig(format!(
                "base url {} is not http(s)",
                self.base_url
            )));
        }
        Ok(())
    }

    /// Applies host option overrides on top of this entry.
    ///
    /// Values set in `options` win over values in `self`.
    ///
    /// # Example
    ///
    /// ```
    /// use blovee_rs::{HubConfig, HubOptions};
    ///
    /// let config = HubConfig::new("old-key");
    /// let options = HubOptions {
    ///     api_key: Some("new-key".into()),
    ///     offline_is_off: Some(true),
    ///     ..HubOptions::default()
    /// };
    /// let merged = config.with_options(&options);
    /// assert_eq!(merged.api_key, "new-key");
    /// assert!(merged.offline_is_off);
    /// assert!(merged.use_assumed_state);
    /// ```
    pub fn with_options(&self, options: &HubOptions) -> Self {
        let mut merged = self.clone();
        if let Some(api_key) = &options.api_key {
            merged.api_key.clone_from(api_key);
        }
        if let Some(poll_interval) = options.poll_interval {
            merged.poll_interval = poll_interval;
        }
        if let Some(use_assumed_state) = options.use_assumed_state {
            merged.use_assumed_state = use_assumed_state;
        }
        if let Some(offline_is_off) = options.offline_is_off {
            merged.offline_is_off = offline_is_off;
        }
        if let Some(disabled) = &options.disable_attribute_updates {
            merged.disable_attribute_updates.clone_from(disabled);
        }
        merged
    }

    pub fn updates_enabled(&self, attribute: Attribute) -> bool {
        !self.disable_attribute_updates.contains(&attribute)
    }

    /// Config as JSON with the API key hidden.
    pub fn redacted(&self) -> Value {
        json!({
            "api_key": "<redacted>",
            "poll_interval_secs": self.poll_interval.as_secs(),
            "use_assumed_state": self.use_assumed_state,
            "offline_is_off": self.offline_is_off,
            "disable_attribute_updates": self
                .disable_attribute_updates
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>(),
            "base_url": self.base_url,
        })
    }
}

/// Overrides a host may layer over the original [`HubConfig`].
#[serde_as]
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HubOptions {
    pub api_key: Option<String>,
    #[serde(alias = "delay")]
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    pub poll_interval: Option<Duration>,
    pub use_assumed_state: Option<bool>,
    pub offline_is_off: Option<bool>,
    #[serde_as(as = "Option<StringWithSeparator<CommaSeparator, Attribute>>")]
    pub disable_attribute_updates: Option<Vec<Attribute>>,
}
