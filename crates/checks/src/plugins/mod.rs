//! Built-in check plugins.

pub mod daemonset_status;
pub mod deployment_health;
pub mod deployment_status;
pub mod hs_healthcheck;
pub mod http;

use crate::check::CheckUsage;
use crate::error::CheckError;
use crate::plugin::CheckPluginRegistry;
use crate::resource::{Resource, ResourceKind};
use clap::CommandFactory;
use std::time::Duration;
use tracing::warn;

pub use daemonset_status::DaemonSetStatus;
pub use deployment_health::DeploymentHealth;
pub use deployment_status::DeploymentStatus;
pub use hs_healthcheck::{ApiVersion, HsHealthCheck};
pub use http::Http;

/// Registers every built-in check
pub fn register_builtin_checks(registry: &mut CheckPluginRegistry) {
    let results = [
        registry.register(
            "deployment_status",
            DeploymentStatus::new,
            DeploymentStatus::static_usage,
            &[ResourceKind::Deployment],
        ),
        registry.register(
            "daemonset_status",
            DaemonSetStatus::new,
            DaemonSetStatus::static_usage,
            &[ResourceKind::DaemonSet],
        ),
        registry.register(
            "http",
            Http::new,
            Http::static_usage,
            &[ResourceKind::Pod, ResourceKind::Service],
        ),
        registry.register(
            "hs_healthcheck_v2",
            HsHealthCheck::new_v2,
            HsHealthCheck::static_usage_v2,
            &[ResourceKind::Pod, ResourceKind::Service],
        ),
        registry.register(
            "deployment_health",
            DeploymentHealth::new,
            DeploymentHealth::static_usage,
            &[ResourceKind::Deployment],
        ),
        registry.register(
            "hs_healthcheck",
            HsHealthCheck::new_v1,
            HsHealthCheck::static_usage_v1,
            &[ResourceKind::Pod, ResourceKind::Service],
        ),
    ];
    for err in results.into_iter().filter_map(Result::err) {
        warn!("{}", err);
    }
}

/// Parses check flags; `argv[0]` is the check id
pub(crate) fn parse_args<A: clap::Parser>(name: &str, argv: &[String]) -> Result<A, CheckError> {
    A::try_parse_from(argv).map_err(|e| CheckError::InvalidArgs {
        name: name.to_string(),
        reason: e.to_string().trim().to_string(),
    })
}

/// Usage built from a check's flag definitions
pub(crate) fn usage_for<A: CommandFactory>(description: &str) -> CheckUsage {
    let mut cmd = A::command();
    CheckUsage {
        description: description.to_string(),
        flags: cmd.render_help().to_string(),
    }
}

/// Validates a ratio flag: must be in (0, 1]
pub(crate) fn check_ratio(name: &str, flag: &str, value: f32) -> Result<(), CheckError> {
    if value <= 0.0 || value > 1.0 {
        return Err(CheckError::InvalidArgs {
            name: name.to_string(),
            reason: format!("--{} must be > 0 and <= 1", flag),
        });
    }
    Ok(())
}

/// Substitutes `:::POD_IP:::`, `:::HOST_IP:::` and `:::CLUSTER_IP:::` from
/// the resource snapshot.
pub(crate) fn resolve_url(template: &str, resource: &Resource) -> Result<String, CheckError> {
    match resource {
        Resource::Pod(pod) => {
            let status = pod.status.as_ref();
            let pod_ip = status.and_then(|s| s.pod_ip.as_deref()).unwrap_or_default();
            let host_ip = status.and_then(|s| s.host_ip.as_deref()).unwrap_or_default();
            Ok(template
                .replace(":::POD_IP:::", pod_ip)
                .replace(":::HOST_IP:::", host_ip))
        }
        Resource::Service(service) => {
            let cluster_ip = service
                .spec
                .as_ref()
                .and_then(|s| s.cluster_ip.as_deref())
                .unwrap_or_default();
            Ok(template.replace(":::CLUSTER_IP:::", cluster_ip))
        }
        other => Err(CheckError::UnsupportedResource(other.kind().to_string())),
    }
}

/// HTTP client for probe checks
pub(crate) fn http_client(timeout: Duration, insecure: bool, user_agent: &str) -> Result<reqwest::Client, CheckError> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .danger_accept_invalid_certs(insecure)
        .user_agent(user_agent)
        .build()?;
    Ok(client)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use k8s_openapi::api::core::v1::{Pod, PodStatus, Service, ServiceSpec};

    pub fn pod_with_ips(pod_ip: &str, host_ip: &str) -> Pod {
        Pod {
            status: Some(PodStatus {
                pod_ip: Some(pod_ip.to_string()),
                host_ip: Some(host_ip.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    pub fn service_with_cluster_ip(cluster_ip: &str) -> Service {
        Service {
            spec: Some(ServiceSpec {
                cluster_ip: Some(cluster_ip.to_string()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }
}
