//! Check errors
//!
//! Parse-time errors are scoped to a single check declaration and are
//! collected by the parser. Execution errors end one execution attempt.

use thiserror::Error;

/// Errors that can occur while parsing, building or executing checks
#[derive(Debug, Error)]
pub enum CheckError {
    /// The annotation payload is not a JSON array of objects
    #[error("invalid check declarations: {0}")]
    InvalidJson(#[source] serde_json::Error),

    /// A declaration could not be decoded into a check config
    #[error("error parsing check {name}: {source}")]
    Decode {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    /// A required field is missing or invalid
    #[error("check {field} {reason}")]
    InvalidField {
        field: &'static str,
        reason: &'static str,
    },

    /// The command string could not be tokenized
    #[error("error parsing command {name}: {reason}")]
    Command { name: String, reason: String },

    /// No factory is registered for the check id
    #[error("check (or check factory) does not exist for {0}")]
    UnknownCheck(String),

    /// The check type exists but does not support the resource kind
    #[error("{id} type is not compatible with {kind}")]
    IncompatibleResource { id: String, kind: String },

    /// A factory with the same id was registered earlier
    #[error("check factory {0} already registered, ignoring")]
    AlreadyRegistered(String),

    /// The check's own flags were rejected by its constructor
    #[error("error creating check {name}: {reason}")]
    InvalidArgs { name: String, reason: String },

    /// The check was handed a resource variant it cannot read
    #[error("resource type {0} is not supported by this check")]
    UnsupportedResource(String),

    /// The check was executed before any resource snapshot was applied
    #[error("no resource snapshot available")]
    NoResource,

    /// HTTP request error from an HTTP based check
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl CheckError {
    pub(crate) fn invalid_field(field: &'static str, reason: &'static str) -> Self {
        Self::InvalidField { field, reason }
    }
}
