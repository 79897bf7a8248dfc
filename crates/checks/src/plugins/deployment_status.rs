//! `deployment_status`: pod availability of a deployment.

use super::{check_ratio, parse_args, usage_for};
use crate::check::{Check, CheckUsage};
use crate::config::CheckConfig;
use crate::error::CheckError;
use crate::resource::Resource;
use crate::result::{CheckResult, CheckStatus};
use clap::Parser;
use std::sync::Arc;

const DESCRIPTION: &str = "Checks deployment pod levels via status obj given by Kubernetes. \
Provides full deployment status object in result output\n\
Example: `deployment_status -w 0.8 -c 0.6`";

#[derive(Debug, Parser)]
#[command(name = "deployment_status")]
struct Args {
    /// Percent of healthy (available) pods to warn at
    #[arg(short, long, default_value_t = 0.9)]
    warn: f32,

    /// Percent of healthy (available) pods to alert critical at
    #[arg(short, long, default_value_t = 0.8)]
    crit: f32,

    /// Alert if a deployment gets configured with a replica count below X.
    /// Often users 'suspend' a service by setting 'replicas: 0'.
    #[arg(short, long = "min-configured-replicas", default_value_t = 0)]
    min_configured_replicas: i32,
}

/// Deployment availability check
#[derive(Debug)]
pub struct DeploymentStatus {
    config: CheckConfig,
    args: Args,
    resource: Option<Arc<Resource>>,
}

impl DeploymentStatus {
    /// Builds the check from its config
    pub fn new(config: CheckConfig) -> Result<Box<dyn Check>, CheckError> {
        let args: Args = parse_args(&config.name, &config.argv)?;
        check_ratio(&config.name, "warn", args.warn)?;
        check_ratio(&config.name, "crit", args.crit)?;

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
impl Check for DeploymentStatus {
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
        // nothing scheduled means nothing unhealthy
        let level = if replicas > 0 {
            available as f32 / replicas as f32
        } else {
            1.0
        };

        res.status = if level < self.args.crit {
            CheckStatus::Critical
        } else if level < self.args.warn {
            CheckStatus::Warn
        } else {
            CheckStatus::Ok
        };

        let configured = deployment
            .spec
            .as_ref()
            .and_then(|s| s.replicas)
            .unwrap_or(1);
        let min = self.args.min_configured_replicas;
        if min > 0 && min > configured {
            res.status = CheckStatus::Critical;
            res.push_output(&format!("Replicas configured to {}\n", configured));
        }

        res.push_output(&serde_json::to_string_pretty(&status)?);
        Ok(res)
    }

    fn usage(&self) -> CheckUsage {
        Self::static_usage()
    }
}
