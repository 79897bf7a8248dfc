//! Test utilities for the registry and controllers
//!
//! Provides an instrumented check type and Kubernetes object builders.

use checks::{
    Check, CheckConfig, CheckError, CheckParser, CheckPluginRegistry, CheckResult, CheckUsage, Resource,
    ResourceKind, CHECKS_ANNOTATION,
};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::core::v1::Pod;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Default)]
struct ProbeState {
    executions: AtomicUsize,
    updates: AtomicUsize,
    dropped: AtomicUsize,
    fail_next: AtomicUsize,
    hang: AtomicBool,
    last_pod: Mutex<Option<String>>,
}

/// Shared view into what a [`TestCheck`] has been asked to do
#[derive(Debug, Clone, Default)]
pub struct Probe(Arc<ProbeState>);

impl Probe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn executions(&self) -> usize {
        self.0.executions.load(Ordering::SeqCst)
    }

    pub fn updates(&self) -> usize {
        self.0.updates.load(Ordering::SeqCst)
    }

    /// How many check instances sharing this probe were dropped
    pub fn dropped(&self) -> usize {
        self.0.dropped.load(Ordering::SeqCst)
    }

    /// Name of the last pod snapshot applied
    pub fn last_pod_name(&self) -> Option<String> {
        self.0.last_pod.lock().unwrap().clone()
    }

    /// Fail the next `n` executions
    pub fn fail_next(&self, n: usize) {
        self.0.fail_next.store(n, Ordering::SeqCst);
    }

    /// Make executions never complete
    pub fn hang(&self, hang: bool) {
        self.0.hang.store(hang, Ordering::SeqCst);
    }
}

/// Check type whose behaviour is driven by a [`Probe`]
#[derive(Debug)]
pub struct TestCheck {
    config: CheckConfig,
    probe: Probe,
}

impl TestCheck {
    pub fn new(config: CheckConfig, probe: Probe) -> Self {
        Self { config, probe }
    }
}

impl Drop for TestCheck {
    fn drop(&mut self) {
        self.probe.0.dropped.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl Check for TestCheck {
    fn config(&self) -> &CheckConfig {
        &self.config
    }

    fn update(&mut self, resource: Arc<Resource>) {
        self.probe.0.updates.fetch_add(1, Ordering::SeqCst);
        if let Resource::Pod(pod) = resource.as_ref() {
            *self.probe.0.last_pod.lock().unwrap() = pod.metadata.name.clone();
        }
    }

    async fn execute(&mut self) -> Result<CheckResult, CheckError> {
        self.probe.0.executions.fetch_add(1, Ordering::SeqCst);
        if self.probe.0.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let failing = self.probe.0.fail_next.load(Ordering::SeqCst);
        if failing > 0 {
            self.probe.0.fail_next.store(failing - 1, Ordering::SeqCst);
            return Err(CheckError::NoResource);
        }

        let mut result = CheckResult::new(self.config.clone());
        result.push_output("ok");
        Ok(result)
    }

    fn usage(&self) -> CheckUsage {
        test_usage()
    }
}

pub fn test_usage() -> CheckUsage {
    CheckUsage {
        description: "test check".to_string(),
        flags: String::new(),
    }
}

/// A test check with a fixed identity
pub fn test_check(name: &str, hash: u64, interval: i64, probe: &Probe) -> Box<dyn Check> {
    let config = CheckConfig {
        name: name.to_string(),
        command: "test_check".to_string(),
        interval,
        source: Some("test".to_string()),
        id: "test_check".to_string(),
        hash,
        argv: vec!["test_check".to_string()],
        ..Default::default()
    };
    Box::new(TestCheck::new(config, probe.clone()))
}

/// Parser whose only check type is `test_check`, valid for every kind
pub fn test_parser(probe: &Probe) -> Arc<CheckParser> {
    let mut plugins = CheckPluginRegistry::new();
    let probe = probe.clone();
    plugins
        .register(
            "test_check",
            move |config| Ok(Box::new(TestCheck::new(config, probe.clone())) as Box<dyn Check>),
            test_usage,
            &ResourceKind::ALL,
        )
        .unwrap();
    Arc::new(CheckParser::new(Arc::new(plugins)))
}

fn meta(name: &str, namespace: &str, checks: Option<&str>) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        annotations: checks.map(|c| BTreeMap::from([(CHECKS_ANNOTATION.to_string(), c.to_string())])),
        ..Default::default()
    }
}

/// Pod with an optional check annotation
pub fn test_pod(name: &str, namespace: &str, checks: Option<&str>) -> Pod {
    Pod {
        metadata: meta(name, namespace, checks),
        ..Default::default()
    }
}

/// Deployment with an optional check annotation
pub fn test_deployment(name: &str, namespace: &str, checks: Option<&str>) -> Deployment {
    Deployment {
        metadata: meta(name, namespace, checks),
        ..Default::default()
    }
}

/// Pod snapshot as handed to checks
pub fn pod_snapshot(name: &str, namespace: &str) -> Arc<Resource> {
    Arc::new(Resource::Pod(test_pod(name, namespace, None)))
}
