//! Controller-specific error types.
//!
//! Only process-level failures surface here. Per-check parse, execution and
//! transmission errors are logged where they happen.

use thiserror::Error;
use kube::Error as KubeError;
use sensu_client::SensuError;

/// Errors that can occur in the check bridge.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Sensu client setup error
    #[error("Sensu error: {0}")]
    Sensu(#[from] SensuError),

    /// Metrics registration error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),
}
