use serde::de::DeserializeOwned;
use serde_json::{Value, Error as SerdeJsonError};
use reqwest::{Client, StatusCode, Url, header, Error as ReqwestError};
use std::fmt::{self, Display, Formatter};
use std::future::Future;
use std::time::Duration;

use crate::deutils::decode_config_value;
use crate::model::{LayoutConfig, QueueConfig, QueueSnapshot};
use crate::store::{PresetSummary, StoredPreset};

/// Custom error type for QueueServerClient operations.
#[derive(Debug)]
pub enum QueueServerError {
    /// Error during HTTP request (e.g., network issues, invalid URL, timeout).
    HttpRequestError(ReqwestError),
    /// The server answered with a non-success status code.
    Status { status: StatusCode, url: String },
    /// Error deserializing the response payload from JSON.
    DeserializationError(SerdeJsonError),
    /// Error serializing a request payload to JSON.
    SerializationError(SerdeJsonError),
    /// The configured base url cannot carry request paths.
    InvalidUrl(String),
}

impl QueueServerError {
    /// The requested device or preset does not exist
    pub fn is_not_found(&self) -> bool {
        match self {
            QueueServerError::Status { status, .. } => *status == StatusCode::NOT_FOUND,
            QueueServerError::HttpRequestError(e) => e.status() == Some(StatusCode::NOT_FOUND),
            _ => false,
        }
    }

    /// Failure to reach the server at all, as opposed to a bad answer
    pub fn is_transport(&self) -> bool {
        match self {
            QueueServerError::HttpRequestError(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            QueueServerError::Status { status, .. } => status.is_server_error(),
            _ => false,
        }
    }
}

impl Display for QueueServerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            QueueServerError::HttpRequestError(e) => write!(f, "HTTP request error: {}", e),
            QueueServerError::Status { status, url } => write!(f, "Queue server returned {} for {}", status, url),
            QueueServerError::DeserializationError(e) => write!(f, "JSON deserialization error: {}", e),
            QueueServerError::SerializationError(e) => write!(f, "JSON serialization error: {}", e),
            QueueServerError::InvalidUrl(url) => write!(f, "Invalid queue server url: {}", url),
        }
    }
}

impl std::error::Error for QueueServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            QueueServerError::HttpRequestError(e) => Some(e),
            QueueServerError::DeserializationError(e) | QueueServerError::SerializationError(e) => Some(e),
            QueueServerError::Status { .. } | QueueServerError::InvalidUrl(_) => None,
        }
    }
}

impl From<ReqwestError> for QueueServerError {
    fn from(err: ReqwestError) -> Self {
        QueueServerError::HttpRequestError(err)
    }
}

impl From<SerdeJsonError> for QueueServerError {
    fn from(err: SerdeJsonError) -> Self {
        QueueServerError::DeserializationError(err)
    }
}

/// Remote operations a terminal needs from the queue server.
///
/// The sync loop and the preset store only ever talk to this trait, so tests
/// can substitute a scripted server.
pub trait QueueServer: Send + Sync {
    /// Cheap liveness probe
    fn health(&self) -> impl Future<Output = Result<(), QueueServerError>> + Send;

    /// Full configuration bound to a device; `None` when the device is unknown
    fn get_device_config(
        &self,
        device_id: &str,
    ) -> impl Future<Output = Result<Option<QueueConfig>, QueueServerError>> + Send;

    /// Layout currently bound to a device
    fn get_device_layout(
        &self,
        device_id: &str,
    ) -> impl Future<Output = Result<LayoutConfig, QueueServerError>> + Send;

    /// Live queue, optionally scoped to one window number
    fn get_queue_snapshot(
        &self,
        window: Option<&str>,
    ) -> impl Future<Output = Result<QueueSnapshot, QueueServerError>> + Send;

    fn list_presets(&self) -> impl Future<Output = Result<Vec<PresetSummary>, QueueServerError>> + Send;

    fn get_preset(&self, id: &str) -> impl Future<Output = Result<StoredPreset, QueueServerError>> + Send;

    fn save_preset(&self, preset: &StoredPreset) -> impl Future<Output = Result<(), QueueServerError>> + Send;

    fn delete_preset(&self, id: &str) -> impl Future<Output = Result<(), QueueServerError>> + Send;
}

/// A client for the queue server's JSON HTTP API.
#[derive(Debug, Clone)]
pub struct QueueServerClient {
    base_url: Url,
    client: Client,
}

impl QueueServerClient {
    /// Creates a new `QueueServerClient` with populated headers and timeouts.
    pub fn new(base_url: &str, connect_timeout: Duration, timeout: Duration) -> Result<Self, QueueServerError> {
        const VERSION: &str = concat!("QuMonS ", env!("CARGO_PKG_NAME"), " v", env!("CARGO_PKG_VERSION"));

        let mut headers = header::HeaderMap::new();
        headers.insert("User-Agent", header::HeaderValue::from_static(VERSION));
        headers.insert("Accept", header::HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        let base_url = Url::parse(base_url).map_err(|e| QueueServerError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(QueueServerError::InvalidUrl(base_url.to_string()));
        }

        Ok(QueueServerClient { base_url, client })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// Endpoint below the base url. Each segment is percent-encoded, so opaque
    /// ids cannot add path components or a query.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, QueueServerError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| QueueServerError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Sends a GET and returns the raw JSON body after checking the status.
    async fn get_value(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<Value, QueueServerError> {
        let url = self.endpoint(segments)?;
        let response = self.client.get(url.clone()).query(query).send().await?;
        if !response.status().is_success() {
            return Err(QueueServerError::Status { status: response.status(), url: url.to_string() });
        }
        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<T, QueueServerError> {
        let value = self.get_value(segments, query).await?;
        Ok(serde_json::from_value(value)?)
    }
}

impl QueueServer for QueueServerClient {
    async fn health(&self) -> Result<(), QueueServerError> {
        let url = self.endpoint(&["api", "health"])?;
        let response = self.client.get(url.clone()).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(QueueServerError::Status { status: response.status(), url: url.to_string() })
        }
    }

    async fn get_device_config(&self, device_id: &str) -> Result<Option<QueueConfig>, QueueServerError> {
        match self.get_value(&["api", "devices", device_id, "config"], &[]).await {
            Ok(value) => Ok(Some(decode_config_value(&value)?)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn get_device_layout(&self, device_id: &str) -> Result<LayoutConfig, QueueServerError> {
        self.get_json(&["api", "devices", device_id, "layout"], &[]).await
    }

    async fn get_queue_snapshot(&self, window: Option<&str>) -> Result<QueueSnapshot, QueueServerError> {
        match window {
            Some(w) => self.get_json(&["api", "queue", "snapshot"], &[("window", w)]).await,
            None => self.get_json(&["api", "queue", "snapshot"], &[]).await,
        }
    }

    async fn list_presets(&self) -> Result<Vec<PresetSummary>, QueueServerError> {
        self.get_json(&["api", "presets"], &[]).await
    }

    async fn get_preset(&self, id: &str) -> Result<StoredPreset, QueueServerError> {
        self.get_json(&["api", "presets", id], &[]).await
    }

    async fn save_preset(&self, preset: &StoredPreset) -> Result<(), QueueServerError> {
        let url = self.endpoint(&["api", "presets", &preset.id])?;
        let body = serde_json::to_string(preset).map_err(QueueServerError::SerializationError)?;
        let response = self
            .client
            .put(url.clone())
            .header(header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(QueueServerError::Status { status: response.status(), url: url.to_string() });
        }
        Ok(())
    }

    async fn delete_preset(&self, id: &str) -> Result<(), QueueServerError> {
        let url = self.endpoint(&["api", "presets", id])?;
        let response = self.client.delete(url.clone()).send().await?;
        if !response.status().is_success() {
            return Err(QueueServerError::Status { status: response.status(), url: url.to_string() });
        }
        Ok(())
    }
}
