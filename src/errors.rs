/// All error types that can occur when talking to the Govee cloud API.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The HTTP request could not be sent or its body could not be read.
    #[error("http request failed: {0}")]
    Http(reqwest::Error),

    /// The API answered with a status other than 200.
    ///
    /// Displays as the raw response body, which is what ends up in a
    /// device's error field.
    #[error("{body}")]
    Status { status: u16, body: String },

    /// Failed to deserialize a response body.
    #[error("failed to load json: {0:?}")]
    JsonLoad(serde_json::Error),

    /// The API key cannot be used as an HTTP header value.
    #[error("api key contains characters not allowed in a header")]
    InvalidApiKey,

    /// The hub configuration was rejected before any request was made.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The API rejected the configured key or could not be reached during setup.
    #[error("cannot connect: {0}")]
    CannotConnect(String),

    /// No device with this identifier has been discovered.
    #[error("device {0} not found")]
    DeviceNotFound(String),

    /// Another `refresh_all` is still running on this hub.
    #[error("a refresh is already in progress")]
    RefreshInProgress,
}

impl Error {
    /// Create a new non-200 status error
    pub fn status(status: u16, body: &str) -> Self {
        Error::Status {
            status,
            body: body.to_string(),
        }
    }

    /// Create a new invalid configuration error
    pub fn invalid_config(reason: &str) -> Self {
        Error::InvalidConfig(reason.to_string())
    }

    /// Create a new device not found error
    pub fn device_not_found(id: &str) -> Self {
        Error::DeviceNotFound(id.to_string())
    }

    /// Returns true for failures of a single round trip to the API.
    ///
    /// These are recorded on the affected device and never abort a poll.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Http(_) | Error::Status { .. } | Error::JsonLoad(_)
        )
    }
}

/// Hacky implementation of PartialEq for testing
#[cfg(test)]
impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}
