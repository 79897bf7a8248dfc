//! Resource adapters.
//!
//! An adapter tells a controller how to watch one Kubernetes kind, where its
//! check declarations live and whether a vanished check source should be
//! deregistered from Sensu.

use checks::{Resource, ResourceKind, CHECKS_ANNOTATION};
use k8s_openapi::api::apps::v1::{DaemonSet, Deployment};
use k8s_openapi::api::core::v1::{Pod, Service};
use k8s_openapi::NamespaceResourceScope;
use kube::{Api, Client, ResourceExt};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::sync::Arc;

/// Per-kind behaviour of a resource controller
pub trait ResourceAdapter: Debug + Send + Sync + 'static {
    /// Watched Kubernetes object
    type Object: kube::Resource<DynamicType = (), Scope = NamespaceResourceScope>
        + Clone
        + DeserializeOwned
        + Debug
        + Send
        + Sync
        + Into<Resource>
        + 'static;

    fn kind(&self) -> ResourceKind;

    /// Whether a source whose checks all vanished, without an explicit
    /// override, is deregistered
    fn deregister_default(&self) -> bool {
        false
    }

    /// `<name>.<kind>.<namespace>`
    fn check_source(&self, obj: &Self::Object) -> String {
        format!(
            "{}.{}.{}",
            obj.name_any(),
            self.kind(),
            obj.namespace().unwrap_or_default()
        )
    }

    /// Raw check declarations, `None` when the annotation is absent
    fn check_configs<'a>(&self, obj: &'a Self::Object) -> Option<&'a str> {
        obj.annotations().get(CHECKS_ANNOTATION).map(String::as_str)
    }

    /// Snapshot handed to checks
    fn snapshot(&self, obj: &Self::Object) -> Arc<Resource> {
        Arc::new(obj.clone().into())
    }

    /// Watch handle, cluster wide unless a namespace is given
    fn api(&self, client: Client, namespace: Option<&str>) -> Api<Self::Object> {
        match namespace {
            Some(ns) => Api::namespaced(client, ns),
            None => Api::all(client),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DeploymentAdapter;

impl ResourceAdapter for DeploymentAdapter {
    type Object = Deployment;

    fn kind(&self) -> ResourceKind {
        ResourceKind::Deployment
    }
}

/// Pods are short lived; their sources are deregistered by default.
#[derive(Debug, Clone, Copy, Default)]
pub struct PodAdapter;

impl ResourceAdapter for PodAdapter {
    type Object = Pod;

    fn kind(&self) -> ResourceKind {
        ResourceKind::Pod
    }

    fn deregister_default(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DaemonSetAdapter;

impl ResourceAdapter for DaemonSetAdapter {
    type Object = DaemonSet;

    fn kind(&self) -> ResourceKind {
        ResourceKind::DaemonSet
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ServiceAdapter;

impl ResourceAdapter for ServiceAdapter {
    type Object = Service;

    fn kind(&self) -> ResourceKind {
        ResourceKind::Service
    }
}
