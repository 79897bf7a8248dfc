//! `daemonset_status`: pod availability of a daemonset.

use super::{check_ratio, parse_args, usage_for};
use crate::check::{Check, CheckUsage};
use crate::config::CheckConfig;
use crate::error::CheckError;
use crate::resource::Resource;
use crate::result::{CheckResult, CheckStatus};
use clap::Parser;
use std::sync::Arc;

const DESCRIPTION: &str = "Checks daemonSet pod levels via status obj given by Kubernetes. \
Provides full daemonSet status object in result output\n\
Example: `daemonset_status -w 1.0 -c 0.9`";

#[derive(Debug, Parser)]
#[command(name = "daemonset_status")]
struct Args {
    /// Percent of healthy (available) pods to warn at
    #[arg(short, long, default_value_t = 1.0)]
    warn: f32,

    /// Percent of healthy (available) pods to alert critical at
    #[arg(short, long, default_value_t = 0.9)]
    crit: f32,
}

/// DaemonSet availability check
#[derive(Debug)]
pub struct DaemonSetStatus {
    config: CheckConfig,
    args: Args,
    resource: Option<Arc<Resource>>,
}

impl DaemonSetStatus {
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
impl Check for DaemonSetStatus {
    fn config(&self) -> &CheckConfig {
        &self.config
    }

    fn update(&mut self, resource: Arc<Resource>) {
        self.resource = Some(resource);
    }

    async fn execute(&mut self) -> Result<CheckResult, CheckError> {
        let resource = self.resource.as_deref().ok_or(CheckError::NoResource)?;
        let Resource::DaemonSet(daemon_set) = resource else {
            return Err(CheckError::UnsupportedResource(resource.kind().to_string()));
        };

        let mut res = CheckResult::new(self.config.clone());
        let status = daemon_set.status.clone().unwrap_or_default();

        let desired = status.desired_number_scheduled;
        let available = status.number_available.unwrap_or(0);
        let level = if desired > 0 {
            available as f32 / desired as f32
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

        res.push_output(&serde_json::to_string_pretty(&status)?);
        Ok(res)
    }

    fn usage(&self) -> CheckUsage {
        Self::static_usage()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::apps::v1::{DaemonSet, DaemonSetStatus as Status};

    fn config(command: &str) -> CheckConfig {
        CheckConfig {
            name: "ds".to_string(),
            command: command.to_string(),
            interval: 10,
            id: "daemonset_status".to_string(),
            argv: shell_words::split(command).unwrap(),
            ..Default::default()
        }
    }

    fn daemon_set(desired: i32, available: i32) -> Arc<Resource> {
        Arc::new(Resource::DaemonSet(DaemonSet {
            status: Some(Status {
                desired_number_scheduled: desired,
                number_available: Some(available),
                ..Default::default()
            }),
            ..Default::default()
        }))
    }

    #[tokio::test]
    async fn test_levels() {
        let cases = [
            (10, 10, CheckStatus::Ok),
            (10, 9, CheckStatus::Warn),
            (10, 8, CheckStatus::Critical),
            (0, 0, CheckStatus::Ok),
        ];
        for (desired, available, expected) in cases {
            let mut check = DaemonSetStatus::new(config("daemonset_status")).unwrap();
            check.update(daemon_set(desired, available));
            let res = check.execute().await.unwrap();
            assert_eq!(res.status, expected, "{}/{}", available, desired);
            assert!(res.output.contains("desiredNumberScheduled"));
        }
    }

    #[tokio::test]
    async fn test_execute_wrong_resource() {
        let mut check = DaemonSetStatus::new(config("daemonset_status")).unwrap();
        check.update(Arc::new(Resource::Service(Default::default())));
        assert!(matches!(check.execute().await, Err(CheckError::UnsupportedResource(k)) if k == "service"));
    }

    #[test]
    fn test_invalid_threshold() {
        let err = DaemonSetStatus::new(config("daemonset_status --warn 2")).unwrap_err();
        assert!(err.to_string().contains("--warn must be > 0 and <= 1"));
    }
}
