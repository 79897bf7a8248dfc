//! Sensu client errors

use thiserror::Error;

/// Errors that can occur when talking to Sensu
#[derive(Debug, Error)]
pub enum SensuError {
    /// HTTP request/response error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The Sensu API answered with an error status
    #[error("Sensu API error: {0}")]
    Api(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Config file could not be read
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Publish attempted while the transport is down
    #[error("Transport is not connected")]
    NotConnected,
}
