//! Configuration management for GPIO GW
//!
//! Handles loading, parsing and validation of the YAML configuration file.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tokio::fs;

use crate::pins::Revision;

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Port Scratch connects to (must match the extension descriptor)
    #[serde(default = "default_port")]
    pub port: u16,
    /// Verbose request/response logging
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub device: DeviceConfig,
}

/// WebIOPi device connection
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    #[serde(default = "default_device_host")]
    pub host: String,
    #[serde(default = "default_device_port")]
    pub port: u16,
    #[serde(default = "default_username")]
    pub username: String,
    #[serde(default = "default_password")]
    pub password: String,
    #[serde(default)]
    pub revision: Revision,
    /// Per-request timeout; unset leaves the HTTP client default
    pub request_timeout_ms: Option<u64>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            debug: false,
            device: DeviceConfig::default(),
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            host: default_device_host(),
            port: default_device_port(),
            username: default_username(),
            password: default_password(),
            revision: Revision::default(),
            request_timeout_ms: None,
        }
    }
}

impl DeviceConfig {
    /// Base URL of the WebIOPi REST service
    pub fn base_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_ms.map(Duration::from_millis)
    }
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: AppConfig = serde_yaml::from_str(&contents)
            .with_context(|| format!("Failed to parse YAML config: {}", path))?;

        config.validate()?;

        Ok(config)
    }

    /// Load the file if it exists, otherwise fall back to defaults
    pub async fn load_or_default(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            Self::load(path).await
        } else {
            Ok(Self::default())
        }
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            anyhow::bail!("port cannot be 0");
        }
        if self.device.host.trim().is_empty() {
            anyhow::bail!("device.host cannot be empty");
        }
        if self.device.port == 0 {
            anyhow::bail!("device.port cannot be 0");
        }
        if self.device.username.is_empty() {
            anyhow::bail!("device.username cannot be empty");
        }
        if self.device.request_timeout_ms == Some(0) {
            anyhow::bail!("device.request_timeout_ms must be greater than 0");
        }
        Ok(())
    }
}

// Default value functions
fn default_port() -> u16 { crate::api::DEFAULT_API_PORT }
fn default_device_host() -> String { "raspberrypi".to_string() }
fn default_device_port() -> u16 { 8000 }
fn default_username() -> String { "webiopi".to_string() }
fn default_password() -> String { "raspberry".to_string() }
