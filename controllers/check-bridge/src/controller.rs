//! Resource check controllers.
//!
//! One controller runs per watched kind. It turns watch events into check
//! registry operations and decides when a check source is deregistered.

use crate::adapter::{DaemonSetAdapter, DeploymentAdapter, PodAdapter, ResourceAdapter, ServiceAdapter};
use crate::error::ControllerError;
use crate::metrics::Metrics;
use crate::probe::Readiness;
use crate::registry::CheckRegistry;
use crate::watcher;
use checks::{Check, CheckParser, ResourceKind};
use kube::Client;
use sensu_client::MonitoringClient;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Shared collaborators of every controller
#[derive(Clone)]
pub struct ControllerContext {
    pub parser: Arc<CheckParser>,
    pub registry: Arc<CheckRegistry>,
    pub client: Arc<dyn MonitoringClient>,
    pub metrics: Arc<Metrics>,
}

/// Reconciles the checks declared on one resource kind
pub struct ResourceCheckController<A: ResourceAdapter> {
    adapter: A,
    ctx: ControllerContext,
}

impl<A: ResourceAdapter> ResourceCheckController<A> {
    pub fn new(adapter: A, ctx: ControllerContext) -> Self {
        Self { adapter, ctx }
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn metrics(&self) -> &Metrics {
        &self.ctx.metrics
    }

    /// Handles a resource that appeared
    pub fn add_resource(&self, obj: &A::Object) {
        debug!("{}.add_resource", self.adapter.kind());
        let source = self.adapter.check_source(obj);

        let checks = self.get_checks(obj, &source);
        if checks.is_empty() {
            return;
        }
        self.ctx.registry.add(checks, self.adapter.snapshot(obj), &source);
    }

    /// Handles a resource that changed.
    ///
    /// Both versions are parsed since the annotation itself may have changed.
    pub async fn update_resource(&self, old: &A::Object, new: &A::Object) {
        debug!("{}.update_resource", self.adapter.kind());
        let source = self.adapter.check_source(new);

        let old_checks = self.get_checks(old, &source);
        let new_checks = self.get_checks(new, &source);
        if old_checks.is_empty() && new_checks.is_empty() {
            return;
        }

        let emptied = new_checks.is_empty();
        self.ctx
            .registry
            .update(&old_checks, new_checks, self.adapter.snapshot(new), &source)
            .await;

        if emptied {
            self.deregister(&old_checks, &source).await;
        }
    }

    /// Handles a resource that went away
    pub async fn delete_resource(&self, obj: &A::Object) {
        debug!("{}.delete_resource", self.adapter.kind());
        let source = self.adapter.check_source(obj);

        let checks = self.get_checks(obj, &source);
        if checks.is_empty() {
            return;
        }
        self.ctx.registry.delete(&checks, &source);

        self.deregister(&checks, &source).await;
    }

    /// Deregisters the source from Sensu unless a check or the kind says to
    /// keep it. Failures are logged only.
    async fn deregister(&self, checks: &[Box<dyn Check>], source: &str) {
        if !should_deregister(checks, self.adapter.deregister_default()) {
            return;
        }

        info!("Deregistering client {} in sensu", source);
        match self.ctx.client.deregister(source).await {
            Ok(()) => self.ctx.metrics.deregistrations.with_label_values(&["ok"]).inc(),
            Err(e) => {
                self.ctx.metrics.deregistrations.with_label_values(&["error"]).inc();
                error!("Error deregistering client {} in sensu: {}", source, e);
            }
        }
    }

    /// Checks declared on a resource; rejected declarations are logged
    fn get_checks(&self, obj: &A::Object, source: &str) -> Vec<Box<dyn Check>> {
        let Some(raw) = self.adapter.check_configs(obj) else {
            return Vec::new();
        };

        let kind = self.adapter.kind();
        let (checks, errors) = self.ctx.parser.parse(raw, source, kind);
        for e in &errors {
            self.ctx.metrics.parse_errors.with_label_values(&[kind.as_str()]).inc();
            error!("{}: {}", source, e);
        }
        checks
    }
}

/// Deregistration policy for a set of vanished checks.
///
/// Any `deregister: false` keeps the source. Any explicit override disables
/// the kind default.
pub fn should_deregister(checks: &[Box<dyn Check>], kind_default: bool) -> bool {
    let mut keep = false;
    let mut use_default = true;
    for check in checks {
        if let Some(deregister) = check.config().deregister {
            keep = keep || !deregister;
            use_default = false;
        }
    }
    if use_default {
        keep = !kind_default;
    }
    !keep
}

/// Spawns the controller for one kind
pub fn spawn_controller(
    kind: ResourceKind,
    client: Client,
    namespace: Option<String>,
    ctx: ControllerContext,
    readiness: Readiness,
    shutdown: broadcast::Sender<()>,
) -> JoinHandle<Result<(), ControllerError>> {
    match kind {
        ResourceKind::Deployment => spawn_with(DeploymentAdapter, client, namespace, ctx, readiness, shutdown),
        ResourceKind::Pod => spawn_with(PodAdapter, client, namespace, ctx, readiness, shutdown),
        ResourceKind::DaemonSet => spawn_with(DaemonSetAdapter, client, namespace, ctx, readiness, shutdown),
        ResourceKind::Service => spawn_with(ServiceAdapter, client, namespace, ctx, readiness, shutdown),
    }
}

fn spawn_with<A: ResourceAdapter>(
    adapter: A,
    client: Client,
    namespace: Option<String>,
    ctx: ControllerContext,
    readiness: Readiness,
    shutdown: broadcast::Sender<()>,
) -> JoinHandle<Result<(), ControllerError>> {
    let api = adapter.api(client, namespace.as_deref());
    let controller = ResourceCheckController::new(adapter, ctx);
    let shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        info!("Starting {} controller", controller.adapter().kind());
        let result = watcher::watch_resources(&controller, api, readiness, shutdown).await;
        info!("Shutting down {} controller", controller.adapter().kind());
        result
    })
}

/// Running controllers, one per kind
#[derive(Default)]
pub struct Controllers {
    watchers: Vec<(ResourceKind, JoinHandle<Result<(), ControllerError>>)>,
}

impl Controllers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: ResourceKind, handle: JoinHandle<Result<(), ControllerError>>) {
        self.watchers.push((kind, handle));
    }

    /// Waits for the first controller to exit and returns its outcome
    pub async fn wait_any(&mut self) -> Result<(), ControllerError> {
        if self.watchers.is_empty() {
            return std::future::pending().await;
        }

        let handles = self.watchers.iter_mut().map(|(_, handle)| handle);
        let (result, index, _) = futures::future::select_all(handles).await;
        let kind = self.watchers[index].0;
        self.watchers.remove(index);

        result
            .map_err(|e| ControllerError::Watch(format!("{} controller panicked: {}", kind, e)))?
            .map_err(|e| ControllerError::Watch(format!("{} controller error: {}", kind, e)))
    }

    /// Waits for every controller to exit
    pub async fn join(self) {
        for (kind, handle) in self.watchers {
            match handle.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => error!("{} controller error: {}", kind, e),
                Err(e) => error!("{} controller panicked: {}", kind, e),
            }
        }
    }
}
