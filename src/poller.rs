//! Periodic refresh of a hub's devices.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, warn};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::device::Device;
use crate::errors::Error;
use crate::hub::Hub;

type Result<T> = std::result::Result<T, Error>;

/// Drives [`Hub::refresh_all`] on an interval and publishes the snapshots.
///
/// Per-device failures are logged as warnings and never stop the loop; the
/// next tick is the only retry.
pub struct Poller {
    hub: Arc<Hub>,
    interval: Duration,
    discover: bool,
    tx: watch::Sender<Vec<Device>>,
}

impl Poller {
    /// A poller using the hub's configured interval.
    pub fn new(hub: Arc<Hub>) -> Self {
        let interval = hub.config().poll_interval;
        let (tx, _) = watch::channel(hub.devices());
        Poller {
            hub,
            interval,
            discover: false,
            tx,
        }
    }

    /// Overrides the hub's poll interval. A zero interval is rejected.
    pub fn with_interval(mut self, interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(Error::invalid_config("poll interval must be positive"));
        }
        self.interval = interval;
        Ok(self)
    }

    /// Also run discovery before every refresh so new devices get announced.
    pub fn with_discovery(mut self, discover: bool) -> Self {
        self.discover = discover;
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Receives the device list after every completed poll.
    pub fn subscribe(&self) -> watch::Receiver<Vec<Device>> {
        self.tx.subscribe()
    }

    /// Runs one poll cycle.
    pub async fn poll_once(&self) -> Result<Vec<Device>> {
        if self.discover {
            let (_, err) = self.hub.discover().await;
            if let Some(err) = err {
                warn!("discovery failed: {}", err);
            }
        }

        let devices = self.hub.refresh_all().await?;
        for device in &devices {
            if let Some(err) = device.error() {
                warn!("update failed for {}: {}", device.name(), err);
            }
        }

        self.tx.send_replace(devices.clone());
        Ok(devices)
    }

    /// Polls on a background task until the handle is stopped or dropped.
    ///
    /// The first poll runs immediately.
    pub fn spawn(self) -> PollHandle {
        let updates = self.subscribe();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                match self.poll_once().await {
                    Ok(devices) => debug!("Polled {} device(s)", devices.len()),
                    Err(Error::RefreshInProgress) => debug!("Previous poll still running, skipping"),
                    Err(err) => warn!("Poll failed: {}", err),
                }
            }
        });

        PollHandle { handle, updates }
    }
}

/// A running poll loop.
pub struct PollHandle {
    handle: JoinHandle<()>,
    updates: watch::Receiver<Vec<Device>>,
}

impl PollHandle {
    /// Another receiver for the published device lists.
    pub fn updates(&self) -> watch::Receiver<Vec<Device>> {
        self.updates.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stops the loop. A poll in flight is cancelled at its next await.
    pub fn stop(&self) {
        self.handle.abort();
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.stop();
    }
}
