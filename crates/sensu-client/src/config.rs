//! Sensu client configuration file.
//!
//! ```json
//! {
//!   "client": {"name": "check-bridge", "subscriptions": [], "keepalive": {...}, ...},
//!   "api": {"url": "http://sensu-api:4567", "timeout_secs": 10},
//!   "defaults": {"handlers": ["default"]}
//! }
//! ```
//!
//! Unknown `client` fields are kept and published with every keepalive.
//! `defaults` are merged into every check declaration.

use crate::error::SensuError;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::Path;

fn default_api_url() -> String {
    "http://localhost:4567".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

/// Whole config file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SensuConfig {
    #[serde(default)]
    pub client: ClientConfig,

    #[serde(default)]
    pub api: ApiConfig,

    /// Fields merged into every check declaration
    #[serde(default)]
    pub defaults: Map<String, Value>,
}

/// The process's own client identity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub address: String,

    #[serde(default)]
    pub subscriptions: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deregister: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deregistration: Option<Registration>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration: Option<Registration>,

    #[serde(default)]
    pub keepalive: KeepaliveConfig,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// (De)registration handler
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Registration {
    #[serde(default)]
    pub handler: String,
}

/// Keepalive settings published with each heartbeat
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KeepaliveConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handler: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handlers: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thresholds: Option<Thresholds>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Keepalive age thresholds in seconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub critical: Option<u64>,
}

/// Sensu API used by [`HttpTransport`](crate::HttpTransport)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_api_url")]
    pub url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: default_api_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl SensuConfig {
    /// Reads and decodes a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SensuError> {
        let path = path.as_ref();
        let buf = std::fs::read_to_string(path).map_err(|source| SensuError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&buf)
    }

    /// Decodes a config document
    pub fn from_json(json: &str) -> Result<Self, SensuError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Handler used for deregistration events
    pub fn deregistration_handler(&self) -> &str {
        self.client
            .deregistration
            .as_ref()
            .map(|r| r.handler.as_str())
            .filter(|h| !h.is_empty())
            .unwrap_or("deregistration")
    }
}
