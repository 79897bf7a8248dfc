//! Resource snapshots handed to checks.
//!
//! A [`Resource`] is the orchestrator object at a point in time. Checks
//! pattern-match on the variant they understand and reject the others with
//! [`CheckError::UnsupportedResource`].

use crate::error::CheckError;
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use k8s_openapi::api::core::v1::{Pod, Service};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Kubernetes resource kinds that can carry check declarations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceKind {
    /// apps/v1 Deployment
    Deployment,
    /// core/v1 Pod
    Pod,
    /// apps/v1 DaemonSet
    DaemonSet,
    /// core/v1 Service
    Service,
}

impl ResourceKind {
    /// All kinds, in the order controllers are started
    pub const ALL: [ResourceKind; 4] = [
        ResourceKind::Deployment,
        ResourceKind::Pod,
        ResourceKind::DaemonSet,
        ResourceKind::Service,
    ];

    /// Lowercase name used in check sources and plugin compatibility lists
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Deployment => "deployment",
            ResourceKind::Pod => "pod",
            ResourceKind::DaemonSet => "daemonset",
            ResourceKind::Service => "service",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceKind {
    type Err = CheckError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deployment" => Ok(ResourceKind::Deployment),
            "pod" => Ok(ResourceKind::Pod),
            "daemonset" => Ok(ResourceKind::DaemonSet),
            "service" => Ok(ResourceKind::Service),
            other => Err(CheckError::UnsupportedResource(other.to_string())),
        }
    }
}

/// Snapshot of a watched Kubernetes object
#[derive(Debug, Clone)]
pub enum Resource {
    Deployment(Deployment),
    Pod(Pod),
    DaemonSet(DaemonSet),
    Service(Service),
}

impl Resource {
    /// Kind of the wrapped object
    pub fn kind(&self) -> ResourceKind {
        match self {
            Resource::Deployment(_) => ResourceKind::Deployment,
            Resource::Pod(_) => ResourceKind::Pod,
            Resource::DaemonSet(_) => ResourceKind::DaemonSet,
            Resource::Service(_) => ResourceKind::Service,
        }
    }
}

impl From<Deployment> for Resource {
    fn from(value: Deployment) -> Self {
        Resource::Deployment(value)
    }
}

impl From<Pod> for Resource {
    fn from(value: Pod) -> Self {
        Resource::Pod(value)
    }
}

impl From<DaemonSet> for Resource {
    fn from(value: DaemonSet) -> Self {
        Resource::DaemonSet(value)
    }
}

impl From<Service> for Resource {
    fn from(value: Service) -> Self {
        Resource::Service(value)
    }
}
