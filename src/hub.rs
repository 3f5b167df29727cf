//! The coordinator facade: device registry, discovery, refresh and commands.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use log::{debug, error, info};
use serde_json::{Value, json};

use crate::client::ApiClient;
use crate::config::HubConfig;
use crate::device::Device;
use crate::errors::Error;
use crate::events::{Notifier, Subscription};
use crate::history::{MessageHistory, Operation};
use crate::types::PowerState;

type Result<T> = std::result::Result<T, Error>;

/// Owns the device registry and the API client for one account.
///
/// Callers only ever receive [`Device`] snapshots. Mutation happens inside the
/// hub, one API round trip at a time, and the registry lock is never held
/// across an await.
///
/// # Example
///
/// ```ignore
/// use blovee_rs::{Hub, HubConfig};
///
/// let hub = Hub::setup(HubConfig::new("my-api-key")).await?;
/// hub.subscribe(|device| println!("new light: {}", device.name()));
///
/// for device in hub.refresh_all().await? {
///     println!("{} on={}", device.name(), device.is_on());
/// }
/// ```
#[derive(Debug)]
pub struct Hub {
    client: ApiClient,
    config: HubConfig,
    registry: Mutex<HashMap<String, Device>>,
    new_device: Notifier<Device>,
    history: Mutex<MessageHistory>,
    refresh_lock: tokio::sync::Mutex<()>,
}

impl Hub {
    /// Builds a hub without contacting the API.
    pub fn new(config: HubConfig) -> Result<Self> {
        config.validate()?;
        let client = ApiClient::with_base_url(&config.api_key, &config.base_url)?;
        Ok(Hub {
            client,
            config,
            registry: Mutex::new(HashMap::new()),
            new_device: Notifier::new(),
            history: Mutex::new(MessageHistory::new()),
            refresh_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Builds a hub and runs the initial discovery.
    ///
    /// Fails with [`Error::CannotConnect`] when the API rejects the key or
    /// cannot be reached, which blocks setup of the whole integration.
    pub async fn setup(config: HubConfig) -> Result<Self> {
        let hub = Self::new(config)?;
        let (devices, err) = hub.discover().await;
        if let Some(err) = err {
            error!("Blovee setup failed: {}", err);
            return Err(Error::CannotConnect(err.to_string()));
        }
        info!("Blovee hub ready with {} device(s)", devices.len());
        Ok(hub)
    }

    /// Keeps at most `max_entries` calls in the history.
    ///
    /// Per-operation counts are unaffected by the limit.
    pub fn with_history_limit(mut self, max_entries: usize) -> Self {
        self.history = Mutex::new(MessageHistory::with_max_entries(max_entries));
        self
    }

    pub fn config(&self) -> &HubConfig {
        &self.config
    }

    pub fn use_assumed_state(&self) -> bool {
        self.config.use_assumed_state
    }

    /// Registers a callback for newly discovered devices.
    ///
    /// Devices discovered before the call are not replayed; enumerate
    /// [`Hub::devices`] after subscribing to catch up.
    pub fn subscribe<F: Fn(&Device) + Send + Sync + 'static>(&self, callback: F) -> Subscription {
        self.new_device.subscribe(callback)
    }

    pub fn unsubscribe(&self, token: Subscription) -> bool {
        self.new_device.unsubscribe(token)
    }

    /// Snapshot of every known device.
    pub fn devices(&self) -> Vec<Device> {
        self.registry().values().cloned().collect()
    }

    pub fn device(&self, id: &str) -> Option<Device> {
        self.registry().get(id).cloned()
    }

    /// Lists devices and registers the ones not seen before.
    ///
    /// Each new device is inserted off, at full brightness, and announced to
    /// subscribers. Known devices are left untouched. The error is only set
    /// when the listing itself failed, in which case the registry is unchanged.
    pub async fn discover(&self) -> (Vec<Device>, Option<Error>) {
        let listing = self.client.list_devices().await;
        self.record(Operation::ListDevices, None, listing.as_ref().err());

        let listing = match listing {
            Ok(listing) => listing,
            Err(err) => {
                error!("Device listing failed: {}", err);
                return (self.devices(), Some(err));
            }
        };

        let mut added = Vec::new();
        {
            let mut registry = self.registry();
            for entry in &listing {
                if registry.contains_key(&entry.device) {
                    continue;
                }
                let device = Device::discovered(entry);
                registry.insert(device.id().to_string(), device.clone());
                added.push(device);
            }
        }

        for device in &added {
            info!("Discovered {} ({}, {})", device.name(), device.model(), device.id());
            self.new_device.notify(device);
        }

        (self.devices(), None)
    }

    /// Reads the state of every known device, one at a time.
    ///
    /// A device whose read fails keeps its last known power and brightness and
    /// gets the failure text in its error field. Fails only with
    /// [`Error::RefreshInProgress`] when another refresh is still running.
    pub async fn refresh_all(&self) -> Result<Vec<Device>> {
        let _guard = self
            .refresh_lock
            .try_lock()
            .map_err(|_| Error::RefreshInProgress)?;
        debug!("Refreshing {} device(s)", self.registry().len());

        for device in self.devices() {
            let state = self.client.get_device_state(&device).await;
            self.record(Operation::GetState, Some(device.id()), state.as_ref().err());

            let updated = self.update(device.id(), |known| match &state {
                Ok(props) => {
                    let props = props.clone().filtered(&self.config);
                    known.apply_properties(&props, self.config.offline_is_off);
                }
                Err(err) => known.record_error(err),
            });
            if let Err(err) = updated {
                debug!("Skipping refresh result: {}", err);
            }
        }

        Ok(self.devices())
    }

    /// Switches a device on or off.
    ///
    /// On failure the error is logged and recorded on the device; the returned
    /// snapshot then still carries the previous power state.
    pub async fn set_power(&self, id: &str, on: bool) -> Result<Device> {
        let device = self.device(id).ok_or_else(|| Error::device_not_found(id))?;
        let result = self.client.set_power(&device, on).await;
        self.record(Operation::SetPower, Some(id), result.as_ref().err());

        match result {
            Ok(()) => {
                debug!("{} turned {}", device.name(), PowerState::from(on));
                self.update(id, |known| known.apply_power(on))
            }
            Err(err) => {
                error!("Error turning {} {}: {}", PowerState::from(on), device.name(), err);
                self.update(id, |known| known.record_error(&err))
            }
        }
    }

    /// Sets brightness from a 0-255 host level.
    ///
    /// The device stores the rescaled value that was sent, never the input.
    pub async fn set_brightness(&self, id: &str, level: u8) -> Result<Device> {
        let device = self.device(id).ok_or_else(|| Error::device_not_found(id))?;
        let result = self.client.set_brightness(&device, level).await;
        self.record(Operation::SetBrightness, Some(id), result.as_ref().err());

        match result {
            Ok(brightness) => {
                debug!("{} brightness set to {}", device.name(), brightness.value());
                self.update(id, |known| known.apply_brightness(brightness))
            }
            Err(err) => {
                error!("Error setting brightness of {}: {}", device.name(), err);
                self.update(id, |known| known.record_error(&err))
            }
        }
    }

    /// Powers a device on, then applies `level` if one is given.
    ///
    /// Brightness is skipped when powering on failed.
    pub async fn turn_on(&self, id: &str, level: Option<u8>) -> Result<Device> {
        let device = self.set_power(id, true).await?;
        match level {
            Some(level) if !device.has_error() => self.set_brightness(id, level).await,
            _ => Ok(device),
        }
    }

    pub async fn turn_off(&self, id: &str) -> Result<Device> {
        self.set_power(id, false).await
    }

    pub fn history(&self) -> MessageHistory {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear_history(&self) {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Devices, redacted config and call history as JSON.
    pub fn diagnostics(&self) -> Value {
        let mut devices = self.devices();
        devices.sort_by(|a, b| a.id().cmp(b.id()));

        let history = self
            .history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .summary();

        json!({
            "config": self.config.redacted(),
            "devices": devices,
            "subscribers": self.new_device.len(),
            "history": serde_json::to_value(history).unwrap_or(Value::Null),
        })
    }

    fn registry(&self) -> MutexGuard<'_, HashMap<String, Device>> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mutates the canonical record and returns a snapshot of it.
    fn update<F: FnOnce(&mut Device)>(&self, id: &str, f: F) -> Result<Device> {
        let mut registry = self.registry();
        let device = registry
            .get_mut(id)
            .ok_or_else(|| Error::device_not_found(id))?;
        f(device);
        Ok(device.clone())
    }

    fn record(&self, operation: Operation, device: Option<&str>, err: Option<&Error>) {
        let err = err.map(ToString::to_string);
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .record(operation, device, err.as_deref());
    }
}

/// Checks that `config` can list devices, without keeping a hub around.
///
/// Every failure, including a config rejected before any request, comes back
/// as [`Error::CannotConnect`].
pub async fn validate_api_key(config: &HubConfig) -> Result<()> {
    let hub = Hub::new(config.clone()).map_err(|err| Error::CannotConnect(err.to_string()))?;
    let (_, err) = hub.discover().await;
    match err {
        Some(err) => Err(Error::CannotConnect(err.to_string())),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use mockito::{Matcher, Mock, Server, ServerGuard};
    use serde_json::json;

    const LAMP: &str = "AA:BB:CC:DD:EE:FF:00:01";
    const STRIP: &str = "AA:BB:CC:DD:EE:FF:00:02";
    const BULB: &str = "AA:BB:CC:DD:EE:FF:00:03";

    fn hub_for(server: &ServerGuard) -> Hub {
        Hub::new(HubConfig::new("test-key").with_base_url(&server.url())).unwrap()
    }

    fn listing(ids: &[&str]) -> String {
        let devices: Vec<Value> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| json!({"device": id, "model": "H6159", "deviceName": format!("Light {i}")}))
            .collect();
        json!({"code": 200, "message": "Success", "data": {"devices": devices}}).to_string()
    }

    async fn mock_listing(server: &mut ServerGuard, ids: &[&str]) -> Mock {
        server
            .mock("GET", "/")
            .with_status(200)
            .with_body(listing(ids))
            .create_async()
            .await
    }

    async fn mock_state(server: &mut ServerGuard, id: &str, status: usize, body: Value) -> Mock {
        server
            .mock("GET", "/state")
            .match_query(Matcher::UrlEncoded("device".into(), id.into()))
            .with_status(status)
            .with_body(body.to_string())
            .create_async()
            .await
    }

    async fn mock_control(server: &mut ServerGuard, status: usize) -> Mock {
        server
            .mock("PUT", "/control/")
            .with_status(status)
            .with_body(if status == 200 { "{}" } else { "device busy" })
            .create_async()
            .await
    }

    fn collect_new(hub: &Hub) -> Arc<Mutex<Vec<String>>> {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        hub.subscribe(move |device: &Device| sink.lock().unwrap().push(device.id().to_string()));
        seen
    }

    #[test]
    fn test_new_rejects_invalid_config() {
        assert!(matches!(
            Hub::new(HubConfig::new("")),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[tokio::test]
    async fn test_discover_registers_new_devices_with_defaults() {
        let mut server = Server::new_async().await;
        mock_listing(&mut server, &[LAMP, STRIP]).await;
        let hub = hub_for(&server);

        let (devices, err) = hub.discover().await;

        assert!(err.is_none());
        assert_eq!(devices.len(), 2);
        let lamp = hub.device(LAMP).unwrap();
        assert!(!lamp.is_on());
        assert_eq!(lamp.brightness().value(), 100);
        assert_eq!(lamp.error(), None);
        assert_eq!(lamp.name(), "Light 0");
    }

    #[tokio::test]
    async fn test_rediscovery_is_a_no_op() {
        let mut server = Server::new_async().await;
        mock_listing(&mut server, &[LAMP]).await;
        mock_state(&mut server, LAMP, 200, json!({"data": {"properties": [{"powerState": "on"}]}}))
            .await;
        let hub = hub_for(&server);
        let seen = collect_new(&hub);

        hub.discover().await;
        hub.refresh_all().await.unwrap();
        let (devices, _) = hub.discover().await;

        assert_eq!(devices.len(), 1);
        assert_eq!(*seen.lock().unwrap(), vec![LAMP]);
        // state is not reset by re-observing the device
        assert!(hub.device(LAMP).unwrap().is_on());
    }

    #[tokio::test]
    async fn test_second_discovery_notifies_only_new_device() {
        let mut server = Server::new_async().await;
        let first = mock_listing(&mut server, &[LAMP, STRIP]).await;
        let hub = hub_for(&server);

        hub.discover().await;
        first.remove_async().await;
        let seen = collect_new(&hub);

        mock_listing(&mut server, &[LAMP, STRIP, BULB]).await;
        let (devices, err) = hub.discover().await;

        assert!(err.is_none());
        assert_eq!(devices.len(), 3);
        assert_eq!(*seen.lock().unwrap(), vec![BULB]);
    }

    #[tokio::test]
    async fn test_failed_discovery_leaves_registry_untouched() {
        let mut server = Server::new_async().await;
        let ok = mock_listing(&mut server, &[LAMP]).await;
        let hub = hub_for(&server);
        hub.discover().await;
        ok.remove_async().await;

        server
            .mock("GET", "/")
            .with_status(401)
            .with_body(r#"{"message":"Unauthorized"}"#)
            .create_async()
            .await;
        let seen = collect_new(&hub);
        let (devices, err) = hub.discover().await;

        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].id(), LAMP);
        assert_eq!(err.unwrap().to_string(), r#"{"message":"Unauthorized"}"#);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_updates_present_fields_only() {
        let mut server = Server::new_async().await;
        mock_listing(&mut server, &[LAMP]).await;
        mock_state(
            &mut server,
            LAMP,
            200,
            json!({"data": {"properties": [{"online": true}, {"powerState": "on"}]}}),
        )
        .await;
        let hub = hub_for(&server);
        hub.discover().await;

        let devices = hub.refresh_all().await.unwrap();

        assert_eq!(devices.len(), 1);
        assert!(devices[0].is_on());
        assert_eq!(devices[0].brightness().value(), 100);
    }

    #[tokio::test]
    async fn test_failed_refresh_only_sets_error() {
        let mut server = Server::new_async().await;
        mock_listing(&mut server, &[LAMP, STRIP]).await;
        let ok = mock_state(
            &mut server,
            LAMP,
            200,
            json!({"data": {"properties": [{"powerState": "on"}, {"brightness": 40}]}}),
        )
        .await;
        mock_state(&mut server, STRIP, 200, json!({"data": {"properties": []}})).await;
        let hub = hub_for(&server);
        hub.discover().await;
        hub.refresh_all().await.unwrap();
        ok.remove_async().await;

        mock_state(&mut server, LAMP, 500, json!({"message": "internal error"})).await;
        let devices = hub.refresh_all().await.unwrap();

        assert_eq!(devices.len(), 2);
        let lamp = hub.device(LAMP).unwrap();
        assert!(lamp.is_on());
        assert_eq!(lamp.brightness().value(), 40);
        assert_eq!(lamp.error(), Some(r#"{"message":"internal error"}"#));
        assert_eq!(hub.device(STRIP).unwrap().error(), None);
    }

    #[tokio::test]
    async fn test_successful_refresh_clears_error() {
        let mut server = Server::new_async().await;
        mock_listing(&mut server, &[LAMP]).await;
        let failing = mock_state(&mut server, LAMP, 503, json!("unavailable")).await;
        let hub = hub_for(&server);
        hub.discover().await;

        hub.refresh_all().await.unwrap();
        assert!(hub.device(LAMP).unwrap().has_error());
        failing.remove_async().await;

        mock_state(&mut server, LAMP, 200, json!({"data": {"properties": [{"powerState": "off"}]}}))
            .await;
        hub.refresh_all().await.unwrap();
        assert!(!hub.device(LAMP).unwrap().has_error());
    }

    #[tokio::test]
    async fn test_refresh_respects_disabled_attributes_and_offline_is_off() {
        let mut server = Server::new_async().await;
        mock_listing(&mut server, &[LAMP]).await;
        mock_state(
            &mut server,
            LAMP,
            200,
            json!({"data": {"properties": [
                {"online": "false"}, {"powerState": "on"}, {"brightness": 5}
            ]}}),
        )
        .await;
        let mut config = HubConfig::new("k").with_base_url(&server.url());
        config.offline_is_off = true;
        config.disable_attribute_updates = vec![crate::Attribute::Brightness];
        let hub = Hub::new(config).unwrap();
        hub.discover().await;

        let devices = hub.refresh_all().await.unwrap();

        assert!(!devices[0].online());
        assert!(!devices[0].is_on());
        assert_eq!(devices[0].brightness().value(), 100);
    }

    #[tokio::test]
    async fn test_overlapping_refresh_is_rejected() {
        let server = Server::new_async().await;
        let hub = hub_for(&server);

        let held = hub.refresh_lock.try_lock().unwrap();
        assert!(matches!(
            hub.refresh_all().await,
            Err(Error::RefreshInProgress)
        ));
        drop(held);
        assert!(hub.refresh_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_power_then_refresh_round_trip() {
        let mut server = Server::new_async().await;
        mock_listing(&mut server, &[LAMP]).await;
        let control = server
            .mock("PUT", "/control/")
            .match_body(Matcher::PartialJson(json!({"cmd": {"name": "turn", "value": "on"}})))
            .with_status(200)
            .with_body("{}")
            .create_async()
            .await;
        mock_state(&mut server, LAMP, 200, json!({"data": {"properties": [{"powerState": "on"}]}}))
            .await;
        let hub = hub_for(&server);
        hub.discover().await;

        let device = hub.set_power(LAMP, true).await.unwrap();
        assert!(device.is_on());

        let devices = hub.refresh_all().await.unwrap();
        control.assert_async().await;
        assert!(devices[0].is_on());
    }

    #[tokio::test]
    async fn test_failed_set_power_keeps_state_and_records_error() {
        let mut server = Server::new_async().await;
        mock_listing(&mut server, &[LAMP]).await;
        mock_control(&mut server, 400).await;
        let hub = hub_for(&server);
        hub.discover().await;

        let device = hub.set_power(LAMP, true).await.unwrap();

        assert!(!device.is_on());
        assert_eq!(device.error(), Some("device busy"));
    }

    #[tokio::test]
    async fn test_failed_set_brightness_keeps_state_and_records_error() {
        let mut server = Server::new_async().await;
        mock_listing(&mut server, &[LAMP]).await;
        let control = server
            .mock("PUT", "/control/")
            .with_status(503)
            .with_body("busy")
            .expect(1)
            .create_async()
            .await;
        let hub = hub_for(&server);
        hub.discover().await;

        let device = hub.set_brightness(LAMP, 10).await.unwrap();

        assert_eq!(device.brightness().value(), 100);
        assert_eq!(device.error(), Some("busy"));
        assert_eq!(hub.device(LAMP).unwrap(), device);
        control.assert_async().await;
    }

    #[tokio::test]
    async fn test_turn_on_skips_brightness_when_power_fails() {
        let mut server = Server::new_async().await;
        mock_listing(&mut server, &[LAMP]).await;
        let control = server
            .mock("PUT", "/control/")
            .with_status(503)
            .with_body("busy")
            .expect(1)
            .create_async()
            .await;
        let hub = hub_for(&server);
        hub.discover().await;

        let device = hub.turn_on(LAMP, Some(10)).await.unwrap();

        assert!(!device.is_on());
        assert_eq!(device.brightness().value(), 100);
        assert_eq!(device.error(), Some("busy"));
        control.assert_async().await;
    }

    #[tokio::test]
    async fn test_set_brightness_stores_rescaled_value() {
        let mut server = Server::new_async().await;
        mock_listing(&mut server, &[LAMP]).await;
        let sent = |value: u8| Matcher::PartialJson(json!({"cmd": {"name": "brightness", "value": value}}));
        let full = server
            .mock("PUT", "/control/")
            .match_body(sent(100))
            .with_status(200)
            .create_async()
            .await;
        let low = server
            .mock("PUT", "/control/")
            .match_body(sent(1))
            .with_status(200)
            .expect(2)
            .create_async()
            .await;
        let hub = hub_for(&server);
        hub.discover().await;

        assert_eq!(hub.set_brightness(LAMP, 255).await.unwrap().brightness().value(), 100);
        assert_eq!(hub.set_brightness(LAMP, 1).await.unwrap().brightness().value(), 1);
        assert_eq!(hub.set_brightness(LAMP, 0).await.unwrap().brightness().value(), 1);

        full.assert_async().await;
        low.assert_async().await;
    }

    #[tokio::test]
    async fn test_turn_on_with_level() {
        let mut server = Server::new_async().await;
        mock_listing(&mut server, &[LAMP]).await;
        mock_control(&mut server, 200).await;
        let hub = hub_for(&server);
        hub.discover().await;

        let device = hub.turn_on(LAMP, Some(128)).await.unwrap();
        assert!(device.is_on());
        assert_eq!(device.brightness().value(), 50);

        let device = hub.turn_off(LAMP).await.unwrap();
        assert!(!device.is_on());
    }

    #[tokio::test]
    async fn test_commands_on_unknown_device() {
        let server = Server::new_async().await;
        let hub = hub_for(&server);
        assert_eq!(
            hub.set_power("nope", true).await,
            Err(Error::device_not_found("nope"))
        );
        assert!(hub.set_brightness("nope", 10).await.is_err());
    }

    #[tokio::test]
    async fn test_setup_maps_rejected_key_to_cannot_connect() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/")
            .with_status(401)
            .with_body("invalid key")
            .create_async()
            .await;
        let config = HubConfig::new("bad").with_base_url(&server.url());

        assert_eq!(
            Hub::setup(config.clone()).await.err(),
            Some(Error::CannotConnect("invalid key".into()))
        );
        assert!(matches!(
            validate_api_key(&config).await,
            Err(Error::CannotConnect(_))
        ));
    }

    #[tokio::test]
    async fn test_validate_api_key_maps_invalid_config() {
        assert_eq!(
            validate_api_key(&HubConfig::new("")).await,
            Err(Error::CannotConnect(
                "invalid configuration: api key is empty".into()
            ))
        );
        assert!(matches!(
            validate_api_key(&HubConfig::new("bad\nkey")).await,
            Err(Error::CannotConnect(_))
        ));
    }

    #[tokio::test]
    async fn test_diagnostics_counts_calls() {
        let mut server = Server::new_async().await;
        mock_listing(&mut server, &[LAMP]).await;
        mock_state(&mut server, LAMP, 500, json!("oops")).await;
        let hub = hub_for(&server);
        hub.discover().await;
        hub.refresh_all().await.unwrap();

        let diag = hub.diagnostics();
        assert_eq!(diag["config"]["api_key"], "<redacted>");
        assert_eq!(diag["devices"].as_array().unwrap().len(), 1);
        assert_eq!(diag["history"]["total_entries"], 2);
        assert_eq!(diag["history"]["last_error"], "get_state: \"oops\"");
    }

    #[tokio::test]
    async fn test_history_limit_bounds_entries() {
        let mut server = Server::new_async().await;
        mock_listing(&mut server, &[LAMP]).await;
        let hub = hub_for(&server).with_history_limit(1);

        hub.discover().await;
        hub.discover().await;

        let history = hub.history();
        assert_eq!(history.len(), 1);
        assert_eq!(history.summary().calls[0].calls, 2);
    }
}
