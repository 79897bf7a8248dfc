//! `deployment_health`: single-threshold deployment availability.
//!
//! Kept for declarations written before `deployment_status` existed.

use super::{check_ratio, parse_args, usage_for};
use crate::check::{Check, CheckUsage};
use crate::config::CheckConfig;
use crate::error::CheckError;
use crate::resource::Resource;
use crate::result::{CheckResult, CheckStatus};
use clap::Parser;
use std::sync::Arc;

const DESCRIPTION: &str = "Checks deployment availability against a single tolerance. \
Critical below the tolerance, warning while any pod is unavailable. \
Superseded by deployment_status.\n\
Example: `deployment_health --tolerance 0.7`";

#[derive(Debug, Parser)]
#[command(name = "deployment_health")]
struct Args {
    /// health tolerance
    #[arg(long, default_value_t = 0.8)]
    tolerance: f32,
}

/// Deployment health check
#[derive(Debug)]
pub struct DeploymentHealth {
    config: CheckConfig,
    args: Args,
    resource: Option<Arc<Resource>>,
}

impl DeploymentHealth {
    /// Builds the check from its config
    pub fn new(config: CheckConfig) -> Result<Box<dyn Check>, CheckError> {
        let args: Args = parse_args(&config.name, &config.argv)?;
        check_ratio(&config.name, "tolerance", args.tolerance)?;

        Ok(Box::new(Self {
            config,
            args,
            resource: None,
        }))
    }

    /// Usage without an instance
    pub fn static_usage() -> CheckUsage {
        usage_for::<Args>(DESCRIPTION)
    }
}

#[async_trait::async_trait]
impl Check for DeploymentHealth {
    fn config(&self) -> &CheckConfig {
        &self.config
    }

    fn update(&mut self, resource: Arc<Resource>) {
        self.resource = Some(resource);
    }

    async fn execute(&mut self) -> Result<CheckResult, CheckError> {
        let resource = self.resource.as_deref().ok_or(CheckError::NoResource)?;
        let Resource::Deployment(deployment) = resource else {
            return Err(CheckError::UnsupportedResource(resource.kind().to_string()));
        };

        let mut res = CheckResult::new(self.config.clone());
        let status = deployment.status.clone().unwrap_or_default();
        let replicas = status.replicas.unwrap_or(0);
        let available = status.available_replicas.unwrap_or(0);

        let level = if replicas > 0 {
            available as f32 / replicas as f32
        } else {
            1.0
        };
        res.status = if level < self.args.tolerance {
            CheckStatus::Critical
        } else if available != replicas {
            CheckStatus::Warn
        } else {
            CheckStatus::Ok
        };

        res.push_output(&serde_json::to_string_pretty(&status)?);
        Ok(res)
    }

    fn usage(&self) -> CheckUsage {
        Self::static_usage()
    }
}
