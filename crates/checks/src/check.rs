//! The check instance contract.

use crate::config::CheckConfig;
use crate::error::CheckError;
use crate::resource::Resource;
use crate::result::CheckResult;
use std::fmt;
use std::sync::Arc;

/// Self-described usage of a check type
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckUsage {
    pub description: String,
    pub flags: String,
}

/// A runnable check built from a [`CheckConfig`].
///
/// Instances are owned by their execution loop. The loop applies resource
/// snapshots with [`Check::update`] and calls [`Check::execute`] on every
/// interval tick.
#[async_trait::async_trait]
pub trait Check: Send + Sync + fmt::Debug {
    /// The resolved config the check was built from
    fn config(&self) -> &CheckConfig;

    /// Identity of the check within its resource's check set
    fn hash(&self) -> u64 {
        self.config().hash
    }

    /// Applies the latest snapshot of the watched resource
    fn update(&mut self, resource: Arc<Resource>);

    /// Runs the check once
    async fn execute(&mut self) -> Result<CheckResult, CheckError>;

    /// Help text for the check's flags
    fn usage(&self) -> CheckUsage;
}
