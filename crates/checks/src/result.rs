//! Check results and the wire envelope sent to the monitoring system.

use crate::config::CheckConfig;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Instant;

/// Maximum size of a result's output in bytes
pub const MAX_OUTPUT_BYTES: usize = 4096;

/// Check status as understood by the monitoring system
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum CheckStatus {
    #[default]
    Ok,
    Warn,
    Critical,
}

impl From<CheckStatus> for u8 {
    fn from(status: CheckStatus) -> Self {
        match status {
            CheckStatus::Ok => 0,
            CheckStatus::Warn => 1,
            CheckStatus::Critical => 2,
        }
    }
}

impl TryFrom<u8> for CheckStatus {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(CheckStatus::Ok),
            1 => Ok(CheckStatus::Warn),
            2 => Ok(CheckStatus::Critical),
            other => Err(format!("unknown check status {}", other)),
        }
    }
}

/// Result of one check execution
#[derive(Debug, Clone, PartialEq)]
pub struct CheckResult {
    pub config: CheckConfig,
    pub status: CheckStatus,
    pub output: String,
    /// Execution time in seconds
    pub duration: f64,
    /// Unix timestamp the execution was issued
    pub issued: i64,
    /// Unix timestamp the execution ran
    pub executed: i64,
}

/// Result fields layered on top of the config in the envelope
#[derive(Serialize)]
struct ResultFields<'a> {
    status: CheckStatus,
    output: &'a str,
    #[serde(skip_serializing_if = "is_zero")]
    duration: f64,
    #[serde(skip_serializing_if = "is_zero_ts")]
    issued: i64,
    #[serde(skip_serializing_if = "is_zero_ts")]
    executed: i64,
}

fn is_zero(v: &f64) -> bool {
    *v == 0.0
}

fn is_zero_ts(v: &i64) -> bool {
    *v == 0
}

/// `{client, check}` message published for every result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckEnvelope {
    pub client: String,
    pub check: Map<String, Value>,
}

impl CheckResult {
    /// Creates an OK result for the config, stamped with the current time
    pub fn new(config: CheckConfig) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            config,
            status: CheckStatus::Ok,
            output: String::new(),
            duration: 0.0,
            issued: now,
            executed: now,
        }
    }

    /// Appends to the output, keeping it within [`MAX_OUTPUT_BYTES`]
    pub fn push_output(&mut self, text: &str) {
        self.output.push_str(text);
        truncate_utf8(&mut self.output, MAX_OUTPUT_BYTES);
    }

    /// Records the time elapsed since `start`
    pub fn finish(&mut self, start: Instant) {
        self.duration = start.elapsed().as_secs_f64();
    }

    /// Builds the envelope: extra declaration fields first, then config
    /// and result fields on top.
    pub fn to_envelope(&self, client: &str) -> Result<CheckEnvelope, serde_json::Error> {
        let mut check = self.config.extra_fields.clone();

        for value in [
            serde_json::to_value(&self.config)?,
            serde_json::to_value(ResultFields {
                status: self.status,
                output: &self.output,
                duration: self.duration,
                issued: self.issued,
                executed: self.executed,
            })?,
        ] {
            if let Value::Object(fields) = value {
                check.extend(fields);
            }
        }

        Ok(CheckEnvelope {
            client: client.to_string(),
            check,
        })
    }

    /// Serialized envelope
    pub fn to_json(&self, client: &str) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(&self.to_envelope(client)?)
    }
}

/// Truncates `s` to at most `max` bytes on a char boundary
pub fn truncate_utf8(s: &mut String, max: usize) {
    if s.len() <= max {
        return;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s.truncate(end);
}
