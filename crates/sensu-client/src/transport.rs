//! Message transport to Sensu.
//!
//! Payloads are published to a named exchange ([`RESULTS_EXCHANGE`],
//! [`KEEPALIVES_EXCHANGE`]) in the shape Sensu servers consume from the
//! transport: a result is a `{client, check}` envelope, a keepalive is the
//! client definition.
//!
//! [`HttpTransport`] goes through the Sensu API instead:
//!
//! | exchange     | request          | body                          |
//! |--------------|------------------|-------------------------------|
//! | `results`    | `POST /results`  | the envelope's `check` object |
//! | `keepalives` | `POST /clients`  | the client definition         |
//!
//! The API treats clients it registers as proxy clients, so the server does
//! not raise keepalive alerts for them. The registry entry stays current.

use crate::config::ApiConfig;
use crate::error::SensuError;
use reqwest::Client;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// Exchange carrying check results
pub const RESULTS_EXCHANGE: &str = "results";

/// Exchange carrying client keepalives
pub const KEEPALIVES_EXCHANGE: &str = "keepalives";

/// Transport abstraction so the client can be tested without a server
#[async_trait::async_trait]
pub trait Transport: Send + Sync + std::fmt::Debug {
    /// Establish (or verify) the connection
    async fn connect(&self) -> Result<(), SensuError>;

    /// Whether the last connect or publish succeeded
    fn is_connected(&self) -> bool;

    /// Publish a payload on an exchange
    async fn publish(&self, exchange: &str, payload: Vec<u8>) -> Result<(), SensuError>;

    /// Drop the connection
    async fn close(&self);
}

/// API route and request body for a message published on `exchange`
fn api_request(exchange: &str, payload: Vec<u8>) -> Result<(&'static str, Vec<u8>), SensuError> {
    match exchange {
        RESULTS_EXCHANGE => {
            let mut envelope: Value = serde_json::from_slice(&payload)?;
            let check = envelope
                .get_mut("check")
                .map(Value::take)
                .filter(Value::is_object)
                .ok_or_else(|| SensuError::Api("result message without a check object".to_string()))?;
            Ok(("/results", serde_json::to_vec(&check)?))
        }
        KEEPALIVES_EXCHANGE => Ok(("/clients", payload)),
        other => Err(SensuError::Api(format!("no Sensu API route for exchange {}", other))),
    }
}

/// HTTP transport against the Sensu API
#[derive(Debug)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
    connected: AtomicBool,
}

impl HttpTransport {
    /// Create a new transport from the API config
    pub fn new(api: &ApiConfig) -> Result<Self, SensuError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(api.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: api.url.trim_end_matches('/').to_string(),
            connected: AtomicBool::new(false),
        })
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn connect(&self) -> Result<(), SensuError> {
        let url = format!("{}/info", self.base_url);
        let result = match self.client.get(&url).send().await {
            Ok(resp) if resp.status().is_success() => Ok(()),
            Ok(resp) => Err(SensuError::Api(format!("GET {} returned {}", url, resp.status()))),
            Err(e) => Err(SensuError::Http(e)),
        };
        self.connected.store(result.is_ok(), Ordering::SeqCst);
        result
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn publish(&self, exchange: &str, payload: Vec<u8>) -> Result<(), SensuError> {
        if !self.is_connected() {
            return Err(SensuError::NotConnected);
        }

        let (route, body) = api_request(exchange, payload)?;
        let url = format!("{}{}", self.base_url, route);
        debug!("POST {} ({} bytes)", url, body.len());
        let resp = match self
            .client
            .post(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                warn!("Lost connection to Sensu API: {}", e);
                self.connected.store(false, Ordering::SeqCst);
                return Err(SensuError::Http(e));
            }
        };

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(SensuError::Api(format!("POST {} returned {}: {}", url, status, body)));
        }
        Ok(())
    }

    async fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }
}
