//! WebIOPi REST client
//!
//! Talks to the device service over basic-auth HTTP and feeds every reply
//! back into the [`StateStore`]. Single-pin calls are skipped for pins the
//! last snapshot did not report.

use reqwest::{Method, Url};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, trace};

use crate::config::DeviceConfig;
use crate::state::{PinField, PinMap, Snapshot, StateStore};

/// Failure talking to the device service
#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("invalid device URL: {0}")]
    InvalidUrl(String),

    /// Connection refused, timeout, broken body
    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    #[error("device returned {status} for {path}")]
    Status {
        status: reqwest::StatusCode,
        path: String,
    },

    #[error("invalid GPIO snapshot: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Client for the WebIOPi GPIO resources
#[derive(Clone)]
pub struct RemoteClient {
    http: reqwest::Client,
    base_url: Url,
    username: String,
    password: String,
    store: Arc<StateStore>,
}

impl RemoteClient {
    /// Create a client for the configured device
    pub fn new(device: &DeviceConfig, store: Arc<StateStore>) -> Result<Self, RemoteError> {
        Self::with_base_url(&device.base_url(), device, store)
    }

    /// Create a client for an explicit base URL, taking credentials from `device`
    pub fn with_base_url(
        base_url: &str,
        device: &DeviceConfig,
        store: Arc<StateStore>,
    ) -> Result<Self, RemoteError> {
        let base_url =
            Url::parse(base_url).map_err(|e| RemoteError::InvalidUrl(format!("{base_url}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(RemoteError::InvalidUrl(base_url.to_string()));
        }

        // The device sits on the local network
        let mut builder = reqwest::Client::builder().no_proxy();
        if let Some(timeout) = device.request_timeout() {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build()?,
            base_url,
            username: device.username.clone(),
            password: device.password.clone(),
            store,
        })
    }

    pub fn store(&self) -> &Arc<StateStore> {
        &self.store
    }

    /// GET /GPIO/* - full snapshot of every pin the device exposes
    pub async fn fetch_all(&self) -> Result<Snapshot, RemoteError> {
        let body = self.request(Method::GET, &["GPIO", "*"]).await?;
        let pins: PinMap = serde_json::from_str(&body)?;
        Ok(Snapshot::new(pins))
    }

    /// GET /GPIO/{id}/function
    pub async fn fetch_function(&self, bcm: &str) -> Result<Option<String>, RemoteError> {
        self.fetch_field(bcm, PinField::Function).await
    }

    /// GET /GPIO/{id}/value
    pub async fn fetch_value(&self, bcm: &str) -> Result<Option<String>, RemoteError> {
        self.fetch_field(bcm, PinField::Value).await
    }

    /// POST /GPIO/{id}/function/{function}
    ///
    /// Returns the function echoed by the device, `None` if the pin is unknown.
    pub async fn set_function(
        &self,
        bcm: &str,
        function: &str,
    ) -> Result<Option<String>, RemoteError> {
        self.set_field(bcm, PinField::Function, function).await
    }

    /// POST /GPIO/{id}/value/{value}
    ///
    /// Returns the value echoed by the device, `None` if the pin is unknown.
    pub async fn set_value(&self, bcm: &str, value: &str) -> Result<Option<String>, RemoteError> {
        self.set_field(bcm, PinField::Value, value).await
    }

    async fn fetch_field(&self, bcm: &str, field: PinField) -> Result<Option<String>, RemoteError> {
        if !self.store.contains(bcm) {
            trace!("Skipping GET for unreported pin {}", bcm);
            return Ok(None);
        }

        let body = self
            .request(Method::GET, &["GPIO", bcm, field.segment()])
            .await?;
        let current = body.trim().to_string();
        self.store.patch_field(bcm, field, current.clone());
        Ok(Some(current))
    }

    async fn set_field(
        &self,
        bcm: &str,
        field: PinField,
        requested: &str,
    ) -> Result<Option<String>, RemoteError> {
        if !self.store.contains(bcm) {
            trace!("Skipping POST for unreported pin {}", bcm);
            return Ok(None);
        }

        let body = self
            .request(Method::POST, &["GPIO", bcm, field.segment(), requested])
            .await?;
        // The device reply wins over what was asked for
        let applied = body.trim().to_string();
        self.store.patch_field(bcm, field, applied.clone());
        Ok(Some(applied))
    }

    fn url(&self, segments: &[&str]) -> Result<Url, RemoteError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| RemoteError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn request(&self, method: Method, segments: &[&str]) -> Result<String, RemoteError> {
        let url = self.url(segments)?;
        debug!("{} WebIOPi: {}", method, url.path());

        let response = self
            .http
            .request(method, url.clone())
            .basic_auth(&self.username, Some(&self.password))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoteError::Status {
                status,
                path: url.path().to_string(),
            });
        }

        let body = response.text().await?;
        debug!("WebIOPi response: {}", body);
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pins::Revision;
    use crate::state::PinState;
    use mockito::{Matcher, Server};

    // base64("webiopi:raspberry")
    const AUTH: &str = "Basic d2ViaW9waTpyYXNwYmVycnk=";

    const SNAPSHOT: &str = r#"{
        "17": {"function": "OUT", "value": 1},
        "18": {"function": "IN", "value": 0},
        "27": {"function": "IN", "value": 1}
    }"#;

    fn client(base_url: &str) -> RemoteClient {
        let store = Arc::new(StateStore::new(Revision::Rev2));
        RemoteClient::with_base_url(base_url, &DeviceConfig::default(), store).unwrap()
    }

    fn seed(client: &RemoteClient, pins: &[(&str, &str, &str)]) {
        let pins: PinMap = pins
            .iter()
            .map(|(bcm, function, value)| (bcm.to_string(), PinState::new(*function, *value)))
            .collect();
        assert!(client.store().try_begin_refresh());
        client.store().complete_refresh::<String>(Ok(pins.into()));
    }

    #[tokio::test]
    async fn test_fetch_all_parses_snapshot() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/GPIO/*")
            .match_header("authorization", AUTH)
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(SNAPSHOT)
            .create_async()
            .await;

        let snapshot = client(&server.url()).fetch_all().await.unwrap();

        mock.assert_async().await;
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot.get("17"), Some(&PinState::new("OUT", "1")));
        assert_eq!(snapshot.get("18").unwrap().value, "0");
    }

    #[tokio::test]
    async fn test_fetch_all_non_success_status() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/GPIO/*")
            .with_status(401)
            .create_async()
            .await;

        let err = client(&server.url()).fetch_all().await.unwrap_err();

        assert!(matches!(err, RemoteError::Status { .. }));
        assert!(err.to_string().contains("401"));
    }

    #[tokio::test]
    async fn test_fetch_all_malformed_body() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/GPIO/*")
            .with_status(200)
            .with_body("<html>not json</html>")
            .create_async()
            .await;

        let err = client(&server.url()).fetch_all().await.unwrap_err();

        assert!(matches!(err, RemoteError::Decode(_)));
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let err = client("http://127.0.0.1:1").fetch_all().await.unwrap_err();
        assert!(matches!(err, RemoteError::Transport(_)));
    }

    #[test]
    fn test_invalid_base_url() {
        let store = Arc::new(StateStore::new(Revision::Rev2));
        let result = RemoteClient::with_base_url("not a url", &DeviceConfig::default(), store);
        assert!(matches!(result, Err(RemoteError::InvalidUrl(_))));
    }

    #[tokio::test]
    async fn test_set_value_patches_with_device_echo() {
        let mut server = Server::new_async().await;
        // Device refuses to drive the pin and reports the level it kept
        let mock = server
            .mock("POST", "/GPIO/17/value/1")
            .match_header("authorization", AUTH)
            .with_status(200)
            .with_body("0")
            .create_async()
            .await;

        let client = client(&server.url());
        seed(&client, &[("17", "IN", "0")]);

        let applied = client.set_value("17", "1").await.unwrap();

        mock.assert_async().await;
        assert_eq!(applied.as_deref(), Some("0"));
        assert_eq!(client.store().snapshot().get("17").unwrap().value, "0");
    }

    #[tokio::test]
    async fn test_set_function_patches_function() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/GPIO/4/function/out")
            .with_status(200)
            .with_body("OUT\n")
            .create_async()
            .await;

        let client = client(&server.url());
        seed(&client, &[("4", "IN", "0")]);

        let applied = client.set_function("4", "out").await.unwrap();

        assert_eq!(applied.as_deref(), Some("OUT"));
        assert_eq!(client.store().snapshot().get("4"), Some(&PinState::new("OUT", "0")));
    }

    #[tokio::test]
    async fn test_unreported_pin_issues_no_request() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", Matcher::Any)
            .expect(0)
            .create_async()
            .await;
        let get_mock = server
            .mock("GET", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let client = client(&server.url());
        seed(&client, &[("17", "IN", "0")]);

        assert_eq!(client.set_value("27", "1").await.unwrap(), None);
        assert_eq!(client.set_function("27", "out").await.unwrap(), None);
        assert_eq!(client.fetch_value("27").await.unwrap(), None);

        mock.assert_async().await;
        get_mock.assert_async().await;
        assert!(!client.store().contains("27"));
    }

    #[tokio::test]
    async fn test_fetch_single_fields() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/GPIO/18/function")
            .with_status(200)
            .with_body("PWM")
            .create_async()
            .await;
        server
            .mock("GET", "/GPIO/18/value")
            .with_status(200)
            .with_body("1")
            .create_async()
            .await;

        let client = client(&server.url());
        seed(&client, &[("18", "IN", "0")]);

        assert_eq!(client.fetch_function("18").await.unwrap().as_deref(), Some("PWM"));
        assert_eq!(client.fetch_value("18").await.unwrap().as_deref(), Some("1"));
        assert_eq!(client.store().snapshot().get("18"), Some(&PinState::new("PWM", "1")));
    }

    #[tokio::test]
    async fn test_failed_set_leaves_state_untouched() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/GPIO/17/value/1")
            .with_status(500)
            .create_async()
            .await;

        let client = client(&server.url());
        seed(&client, &[("17", "IN", "0")]);

        assert!(client.set_value("17", "1").await.is_err());
        assert_eq!(client.store().snapshot().get("17").unwrap().value, "0");
    }
}
