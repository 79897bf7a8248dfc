//! Mock Sensu client for unit testing
//!
//! Records every published result and deregistration in memory so tests
//! can assert on them without a Sensu API.

use crate::error::SensuError;
use crate::monitoring_trait::MonitoringClient;
use checks::CheckResult;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Mock MonitoringClient for testing
#[derive(Debug, Clone, Default)]
pub struct MockSensuClient {
    results: Arc<Mutex<Vec<CheckResult>>>,
    deregistrations: Arc<Mutex<Vec<String>>>,
    disconnected: Arc<AtomicBool>,
}

impl MockSensuClient {
    /// Create a new mock client
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call fail with [`SensuError::NotConnected`]
    pub fn set_disconnected(&self, disconnected: bool) {
        self.disconnected.store(disconnected, Ordering::SeqCst);
    }

    /// Results posted so far
    pub fn results(&self) -> Vec<CheckResult> {
        self.results.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Sources deregistered so far
    pub fn deregistrations(&self) -> Vec<String> {
        self.deregistrations.lock().map(|d| d.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl MonitoringClient for MockSensuClient {
    async fn post_check_result(&self, result: &CheckResult) -> Result<(), SensuError> {
        if self.disconnected.load(Ordering::SeqCst) {
            return Err(SensuError::NotConnected);
        }
        if let Ok(mut results) = self.results.lock() {
            results.push(result.clone());
        }
        Ok(())
    }

    async fn deregister(&self, source: &str) -> Result<(), SensuError> {
        if self.disconnected.load(Ordering::SeqCst) {
            return Err(SensuError::NotConnected);
        }
        if let Ok(mut deregistrations) = self.deregistrations.lock() {
            deregistrations.push(source.to_string());
        }
        Ok(())
    }
}
