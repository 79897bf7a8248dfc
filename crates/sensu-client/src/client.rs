//! Sensu client
//!
//! Publishes check results, heartbeats the process's own client entry and
//! deregisters check sources that went away.

use crate::backoff::FibonacciBackoff;
use crate::config::SensuConfig;
use crate::error::SensuError;
use crate::monitoring_trait::MonitoringClient;
use crate::transport::{HttpTransport, Transport, KEEPALIVES_EXCHANGE, RESULTS_EXCHANGE};
use checks::{CheckConfig, CheckResult, CheckStatus};
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

/// Interval between keepalive heartbeats
pub const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(20);

/// Interval between connection checks once connected
pub const CONNECTION_CHECK_INTERVAL: Duration = Duration::from_secs(5);

/// Sensu version reported in keepalives
pub const SENSU_VERSION: &str = "0.28.4";

/// Sensu client
#[derive(Debug, Clone)]
pub struct SensuClient {
    config: Arc<SensuConfig>,
    transport: Arc<dyn Transport>,
}

impl SensuClient {
    /// Create a client over an existing transport
    pub fn new(config: SensuConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config: Arc::new(config),
            transport,
        }
    }

    /// Load the config file and create a client with an HTTP transport
    pub fn from_config_file(path: impl AsRef<Path>) -> Result<Self, SensuError> {
        let config = SensuConfig::load(path)?;
        let transport = HttpTransport::new(&config.api)?;
        Ok(Self::new(config, Arc::new(transport)))
    }

    /// The loaded config
    pub fn config(&self) -> &SensuConfig {
        &self.config
    }

    /// Whether the transport is currently connected
    pub fn is_connected(&self) -> bool {
        self.transport.is_connected()
    }

    /// Keep the transport connected until shutdown.
    ///
    /// Failed connects are retried with a Fibonacci backoff. Once
    /// connected the connection is re-verified whenever a publish marked it
    /// as lost.
    pub async fn start(&self, mut shutdown: broadcast::Receiver<()>) {
        info!("Starting Sensu client");
        let mut backoff = FibonacciBackoff::new(1, CONNECTION_CHECK_INTERVAL.as_secs());

        loop {
            let delay = if self.transport.is_connected() {
                CONNECTION_CHECK_INTERVAL
            } else {
                match self.transport.connect().await {
                    Ok(()) => {
                        info!("Connected to Sensu");
                        backoff.reset();
                        CONNECTION_CHECK_INTERVAL
                    }
                    Err(e) => {
                        let delay = backoff.next_backoff();
                        warn!("Failed to connect to Sensu, retrying in {:?}: {}", delay, e);
                        delay
                    }
                }
            };

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = shutdown.recv() => {
                    info!("Stopping Sensu client");
                    self.transport.close().await;
                    return;
                }
            }
        }
    }

    /// Wait until the transport is connected, up to `max`
    pub async fn wait_connected(&self, max: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + max;
        while !self.transport.is_connected() {
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        true
    }

    /// Heartbeat the process's own client entry every [`KEEPALIVE_INTERVAL`]
    pub async fn start_keepalive(&self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = tokio::time::interval(KEEPALIVE_INTERVAL);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.post_keepalive().await {
                        warn!("Failed to post keepalive: {}", e);
                    }
                }
                _ = shutdown.recv() => return,
            }
        }
    }

    /// Keepalive payload: client info and extras, keepalive settings,
    /// timestamp and version.
    pub fn keepalive_payload(&self) -> Result<Vec<u8>, SensuError> {
        let mut payload = Map::new();
        if let Value::Object(client) = serde_json::to_value(&self.config.client)? {
            payload.extend(client);
        }
        payload.remove("keepalive");
        if let Value::Object(keepalive) = serde_json::to_value(&self.config.client.keepalive)? {
            payload.extend(keepalive);
        }
        payload.insert("timestamp".to_string(), Value::from(chrono::Utc::now().timestamp()));
        payload.insert("version".to_string(), Value::from(SENSU_VERSION));

        Ok(serde_json::to_vec(&payload)?)
    }

    /// Publish one keepalive
    pub async fn post_keepalive(&self) -> Result<(), SensuError> {
        let buf = self.keepalive_payload()?;
        debug!("postKeepalive: {}", String::from_utf8_lossy(&buf));
        self.transport.publish(KEEPALIVES_EXCHANGE, buf).await
    }

    fn deregistration_result(&self, source: &str) -> CheckResult {
        let mut result = CheckResult::new(CheckConfig {
            name: "deregistration".to_string(),
            handler: Some(self.config.deregistration_handler().to_string()),
            source: Some(source.to_string()),
            ..Default::default()
        });
        result.status = CheckStatus::Warn;
        result.output = "client initiated deregistration".to_string();
        result
    }
}

#[async_trait::async_trait]
impl MonitoringClient for SensuClient {
    async fn post_check_result(&self, result: &CheckResult) -> Result<(), SensuError> {
        let buf = result.to_json(&self.config.client.name)?;
        debug!("postCheckResult: {}", String::from_utf8_lossy(&buf));
        self.transport.publish(RESULTS_EXCHANGE, buf).await
    }

    async fn deregister(&self, source: &str) -> Result<(), SensuError> {
        debug!("Deregistering client {}", source);
        let result = self.deregistration_result(source);
        self.post_check_result(&result).await
    }
}
