//! Sensu Client
//!
//! Publishes check results to Sensu, heartbeats the process's own client
//! entry and deregisters check sources that no longer exist.
//!
//! # Example
//!
//! ```no_run
//! use sensu_client::{MonitoringClient, SensuClient};
//! use tokio::sync::broadcast;
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = SensuClient::from_config_file("/etc/sensu/conf.json")?;
//! let (shutdown_tx, _) = broadcast::channel::<()>(1);
//!
//! tokio::spawn({
//!     let client = client.clone();
//!     let shutdown = shutdown_tx.subscribe();
//!     async move { client.start(shutdown).await }
//! });
//! client.wait_connected(Duration::from_secs(5)).await;
//!
//! client.deregister("web-1.pod.default").await?;
//! # Ok(())
//! # }
//! ```

pub mod backoff;
pub mod client;
pub mod config;
pub mod error;
#[path = "trait.rs"]
pub mod monitoring_trait;
pub mod transport;
#[cfg(feature = "test-util")]
pub mod mock;

pub use client::SensuClient;
pub use config::{ApiConfig, ClientConfig, KeepaliveConfig, Registration, SensuConfig, Thresholds};
pub use error::SensuError;
pub use monitoring_trait::MonitoringClient;
pub use transport::{HttpTransport, Transport, KEEPALIVES_EXCHANGE, RESULTS_EXCHANGE};
#[cfg(feature = "test-util")]
pub use mock::MockSensuClient;
