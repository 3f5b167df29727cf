//! Thin async wrapper over the Govee developer REST API.

use log::debug;
use reqwest::StatusCode;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::de::DeserializeOwned;

use crate::device::Device;
use crate::errors::Error;
use crate::payload::{
    Command, ControlRequest, DeviceListing, DeviceProperties, ListResponse, StateResponse,
};
use crate::types::{Brightness, PowerState};

type Result<T> = std::result::Result<T, Error>;

/// Issues the four API operations the hub needs.
///
/// The client holds no device state. It keeps one `reqwest::Client`, so the
/// connection pool is reused across calls; cloning the client shares it.
/// Each call is a single round trip: no retries, and no timeout beyond the
/// transport default. A status other than 200 becomes [`Error::Status`]
/// carrying the response body.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub const DEFAULT_BASE_URL: &'static str = "https://developer-api.govee.com/v1/devices/";
    pub const API_KEY_HEADER: &'static str = "govee-api-key";

    pub fn new(api_key: &str) -> Result<Self> {
        Self::with_base_url(api_key, Self::DEFAULT_BASE_URL)
    }

    /// Builds a client against another base URL, e.g. a local mock server.
    pub fn with_base_url(api_key: &str, base_url: &str) -> Result<Self> {
        let mut key = HeaderValue::from_str(api_key).map_err(|_| Error::InvalidApiKey)?;
        key.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(HeaderName::from_static(Self::API_KEY_HEADER), key);

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(Error::Http)?;

        let mut base_url = base_url.to_string();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }

        Ok(ApiClient { http, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /` - every device on the account.
    pub async fn list_devices(&self) -> Result<Vec<DeviceListing>> {
        let url = self.url("");
        debug!("GET {}", url);

        let response = self.http.get(&url).send().await.map_err(Error::Http)?;
        let parsed: ListResponse = Self::read_json(response).await?;
        Ok(parsed.data.devices)
    }

    /// `GET /state` - current properties of one device.
    pub async fn get_device_state(&self, device: &Device) -> Result<DeviceProperties> {
        let url = self.url("state");
        debug!("GET {} device={} model={}", url, device.id(), device.model());

        let response = self
            .http
            .get(&url)
            .query(&[("device", device.id()), ("model", device.model())])
            .send()
            .await
            .map_err(Error::Http)?;
        let parsed: StateResponse = Self::read_json(response).await?;
        Ok(DeviceProperties::from_properties(parsed.data.properties))
    }

    pub async fn set_power(&self, device: &Device, on: bool) -> Result<()> {
        self.control(device, Command::Turn(PowerState::from(on)))
            .await
    }

    /// Sends a 0-255 host level, rescaled to the API range.
    ///
    /// Returns the brightness that was actually sent.
    pub async fn set_brightness(&self, device: &Device, level: u8) -> Result<Brightness> {
        let brightness = Brightness::from_level(level);
        self.control(device, Command::Brightness(brightness)).await?;
        Ok(brightness)
    }

    async fn control(&self, device: &Device, cmd: Command) -> Result<()> {
        let url = self.url("control/");
        debug!("PUT {} device={} cmd={:?}", url, device.id(), cmd);

        let body = ControlRequest {
            device: device.id(),
            model: device.model(),
            cmd,
        };
        let response = self
            .http
            .put(&url)
            .json(&body)
            .send()
            .await
            .map_err(Error::Http)?;
        Self::read_body(response).await?;
        Ok(())
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let body = Self::read_body(response).await?;
        serde_json::from_str(&body).map_err(Error::JsonLoad)
    }

    async fn read_body(response: reqwest::Response) -> Result<String> {
        let status = response.status();
        let body = response.text().await.map_err(Error::Http)?;
        if status != StatusCode::OK {
            debug!("API answered {}: {}", status, body);
            return Err(Error::status(status.as_u16(), &body));
        }
        Ok(body)
    }
}
