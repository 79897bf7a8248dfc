//! MonitoringClient trait for mocking
//!
//! The check registry and controllers only depend on this trait. The
//! concrete [`crate::SensuClient`] implements it, and tests use
//! `MockSensuClient` (feature `test-util`).

use crate::error::SensuError;
use checks::CheckResult;

/// Operations the rest of the process needs from the monitoring system.
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait MonitoringClient: Send + Sync {
    /// Publish one check result
    async fn post_check_result(&self, result: &CheckResult) -> Result<(), SensuError>;

    /// Remove a check source (proxy client) from the monitoring system
    async fn deregister(&self, source: &str) -> Result<(), SensuError>;
}
