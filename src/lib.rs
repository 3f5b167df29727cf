//! # blovee_rs
//!
//! An async Rust client and polling hub for Govee lights controlled through
//! the Govee developer cloud API.
//!
//! The crate is the core of a home-automation integration: the host hands it
//! an API key and a poll interval, and gets back device snapshots, per-device
//! errors and a notification whenever a new light shows up on the account.
//!
//! ## Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//! use blovee_rs::{Hub, HubConfig, Poller};
//!
//! async fn run() -> Result<(), blovee_rs::Error> {
//!     let hub = Arc::new(Hub::setup(HubConfig::new("my-api-key")).await?);
//!
//!     // Subscribe first, then catch up on what setup already found.
//!     hub.subscribe(|device| println!("new light: {}", device.name()));
//!     for device in hub.devices() {
//!         println!("known light: {}", device.name());
//!     }
//!
//!     let first = &hub.devices()[0];
//!     hub.turn_on(first.id(), Some(128)).await?;
//!
//!     let poller = Poller::new(Arc::clone(&hub)).spawn();
//!     let mut updates = poller.updates();
//!     while updates.changed().await.is_ok() {
//!         for device in updates.borrow().iter() {
//!             println!("{} on={} brightness={}", device.name(), device.is_on(), device.brightness().value());
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Components
//!
//! - [`ApiClient`]: one HTTP round trip per operation, non-200 answers become
//!   [`Error::Status`] carrying the response body
//! - [`Hub`]: owns the device registry, discovery, refresh and commands
//! - [`Poller`]: runs [`Hub::refresh_all`] on an interval and logs per-device failures
//! - [`Notifier`]: ordered, synchronous "new device" callbacks
//!
//! ## Brightness
//!
//! Commands take a 0-255 host level. It is rescaled to the API's 0-100 range
//! with `max(1, level * 100 / 255)`, so 0 is never sent. See [`Brightness`].
//!
//! ## Errors
//!
//! Transport failures never abort a poll. They land on the affected
//! [`Device`] (see [`Device::error`]) or, for discovery, next to the device
//! list. A rejected API key is reported once, by [`Hub::setup`] or
//! [`validate_api_key`], as [`Error::CannotConnect`].

mod client;
mod config;
mod device;
mod errors;
mod events;
mod history;
mod hub;
mod payload;
mod poller;
mod types;

// Re-export public API
pub use client::ApiClient;
pub use config::{Attribute, HubConfig, HubOptions};
pub use device::Device;
pub use errors::Error;
pub use events::{Callback, Notifier, Subscription};
pub use history::{HistoryEntry, HistorySummary, MessageHistory, Operation, OperationSummary};
pub use hub::{Hub, validate_api_key};
pub use payload::{DeviceListing, DeviceProperties};
pub use poller::{PollHandle, Poller};
pub use types::{Brightness, PowerState};
